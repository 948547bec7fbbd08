//! Environment-backed configuration with hardcoded fallbacks.

use std::env;
use std::net::SocketAddr;

pub const DEFAULT_STORE_ROOT: &str = "memory://shopstage";
pub const DEFAULT_LISTEN: &str = "127.0.0.1:3000";
pub const DEFAULT_DOC_COUNT: usize = 100;

/// Process configuration shared by the `seed` and `serve` binaries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Root under which each stage derives its isolated target.
    pub store_root: String,
    /// Address the HTTP surface binds to.
    pub listen: SocketAddr,
    /// Base entity count for dataset generation.
    pub doc_count: usize,
}

impl Config {
    /// Reads `SHOPSTAGE_STORE`, `SHOPSTAGE_LISTEN`, and `SHOPSTAGE_DOCS`
    /// from the environment. Unset or unparsable values fall back to the
    /// defaults, with a warning for the unparsable ones.
    pub fn from_env() -> Config {
        Config::from_values(
            env::var("SHOPSTAGE_STORE").ok(),
            env::var("SHOPSTAGE_LISTEN").ok(),
            env::var("SHOPSTAGE_DOCS").ok(),
        )
    }

    fn from_values(
        store: Option<String>,
        listen: Option<String>,
        docs: Option<String>,
    ) -> Config {
        let store_root = store.unwrap_or_else(|| DEFAULT_STORE_ROOT.to_string());
        let listen = match listen {
            Some(raw) => match raw.parse() {
                Ok(addr) => addr,
                Err(_) => {
                    log::warn!(
                        "SHOPSTAGE_LISTEN '{}' is not an address, using {}",
                        raw,
                        DEFAULT_LISTEN
                    );
                    default_listen()
                }
            },
            None => default_listen(),
        };
        let doc_count = match docs {
            Some(raw) => match raw.parse() {
                Ok(count) => count,
                Err(_) => {
                    log::warn!(
                        "SHOPSTAGE_DOCS '{}' is not a count, using {}",
                        raw,
                        DEFAULT_DOC_COUNT
                    );
                    DEFAULT_DOC_COUNT
                }
            },
            None => DEFAULT_DOC_COUNT,
        };
        Config {
            store_root,
            listen,
            doc_count,
        }
    }
}

fn default_listen() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 3000))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::from_values(None, None, None);
        assert_eq!(config.store_root, DEFAULT_STORE_ROOT);
        assert_eq!(config.listen, "127.0.0.1:3000".parse().unwrap());
        assert_eq!(config.doc_count, 100);
    }

    #[test]
    fn test_explicit_values() {
        let config = Config::from_values(
            Some("memory://prod".to_string()),
            Some("0.0.0.0:8080".to_string()),
            Some("500".to_string()),
        );
        assert_eq!(config.store_root, "memory://prod");
        assert_eq!(config.listen, "0.0.0.0:8080".parse().unwrap());
        assert_eq!(config.doc_count, 500);
    }

    #[test]
    fn test_unparsable_values_fall_back() {
        let config = Config::from_values(
            None,
            Some("not-an-address".to_string()),
            Some("many".to_string()),
        );
        assert_eq!(config.listen, "127.0.0.1:3000".parse().unwrap());
        assert_eq!(config.doc_count, 100);
    }
}
