/// Specifies the direction for sorting documents and index keys.
///
/// Used by the pipeline `Sort` stage and by compound index descriptors
/// to record the intended traversal direction of each key field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    /// Sort in ascending order (smallest to largest, A-Z, oldest to newest)
    Ascending,
    /// Sort in descending order (largest to smallest, Z-A, newest to oldest)
    Descending,
}
