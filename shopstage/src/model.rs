//! Entity types for the synthetic e-commerce schema and their document
//! codecs.
//!
//! Entities are immutable once generated. Documents use snake_case
//! field names; identifiers travel as [Value::Id].

use chrono::{DateTime, Utc};
use stagedb::{doc, DocId, Document, ErrorKind, StoreError, StoreResult, Value};

pub const CUSTOMERS: &str = "customers";
pub const PRODUCTS: &str = "products";
pub const SHIPPING_ADDRESSES: &str = "shipping_addresses";
pub const PAYMENT_TRANSACTIONS: &str = "payment_transactions";
pub const ORDERS: &str = "orders";
pub const ORDER_ITEMS: &str = "order_items";
pub const ORDERS_SUMMARY: &str = "orders_summary";

#[derive(Debug, Clone, PartialEq)]
pub struct Customer {
    pub id: DocId,
    pub name: String,
    pub email: String,
    pub phone: String,
}

impl Customer {
    pub fn to_document(&self) -> Document {
        doc! {
            "_id": (self.id),
            "name": (self.name.clone()),
            "email": (self.email.clone()),
            "phone": (self.phone.clone())
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Product {
    pub id: DocId,
    pub name: String,
    /// Non-negative unit price.
    pub price: f64,
    pub category: String,
}

impl Product {
    pub fn to_document(&self) -> Document {
        doc! {
            "_id": (self.id),
            "name": (self.name.clone()),
            "price": (self.price),
            "category": (self.category.clone())
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ShippingAddress {
    pub id: DocId,
    pub street: String,
    pub city: String,
    pub country: String,
    pub postal_code: String,
}

impl ShippingAddress {
    pub fn to_document(&self) -> Document {
        doc! {
            "_id": (self.id),
            "street": (self.street.clone()),
            "city": (self.city.clone()),
            "country": (self.country.clone()),
            "postal_code": (self.postal_code.clone())
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Completed => "completed",
            PaymentStatus::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> StoreResult<PaymentStatus> {
        match value {
            "pending" => Ok(PaymentStatus::Pending),
            "completed" => Ok(PaymentStatus::Completed),
            "failed" => Ok(PaymentStatus::Failed),
            other => Err(StoreError::new(
                &format!("unknown payment status '{}'", other),
                ErrorKind::InvalidOperation,
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentMethod {
    CreditCard,
    Paypal,
    BankTransfer,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::CreditCard => "credit_card",
            PaymentMethod::Paypal => "paypal",
            PaymentMethod::BankTransfer => "bank_transfer",
        }
    }

    pub fn parse(value: &str) -> StoreResult<PaymentMethod> {
        match value {
            "credit_card" => Ok(PaymentMethod::CreditCard),
            "paypal" => Ok(PaymentMethod::Paypal),
            "bank_transfer" => Ok(PaymentMethod::BankTransfer),
            other => Err(StoreError::new(
                &format!("unknown payment method '{}'", other),
                ErrorKind::InvalidOperation,
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PaymentTransaction {
    pub id: DocId,
    pub status: PaymentStatus,
    pub amount: f64,
    pub method: PaymentMethod,
    pub timestamp: DateTime<Utc>,
}

impl PaymentTransaction {
    pub fn to_document(&self) -> Document {
        doc! {
            "_id": (self.id),
            "status": (self.status.as_str()),
            "amount": (self.amount),
            "method": (self.method.as_str()),
            "timestamp": (self.timestamp)
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub id: DocId,
    pub customer_id: DocId,
    pub shipping_address_id: DocId,
    pub payment_transaction_id: DocId,
    pub order_date: DateTime<Utc>,
}

impl Order {
    pub fn to_document(&self) -> Document {
        doc! {
            "_id": (self.id),
            "customer_id": (self.customer_id),
            "shipping_address_id": (self.shipping_address_id),
            "payment_transaction_id": (self.payment_transaction_id),
            "order_date": (self.order_date)
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderItem {
    pub id: DocId,
    pub order_id: DocId,
    pub product_id: DocId,
    /// Integer in [1, 10].
    pub quantity: i64,
    /// Copied from the product's price at generation time; never
    /// reconciled afterwards.
    pub unit_price: f64,
}

impl OrderItem {
    pub fn to_document(&self) -> Document {
        doc! {
            "_id": (self.id),
            "order_id": (self.order_id),
            "product_id": (self.product_id),
            "quantity": (self.quantity),
            "unit_price": (self.unit_price)
        }
    }
}

/// One row of the denormalized summary relation.
///
/// Keyed by the (customer name, product name) pair, not by id. Two
/// customers sharing a generated name therefore collapse into one row;
/// this mirrors the summary's grouping key and is intentional.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderSummary {
    pub customer_id: DocId,
    pub customer_name: String,
    pub product_name: String,
    pub total_quantity: i64,
    pub total_revenue: f64,
}

impl OrderSummary {
    pub fn to_document(&self) -> Document {
        doc! {
            "customer_id": (self.customer_id),
            "customer_name": (self.customer_name.clone()),
            "product_name": (self.product_name.clone()),
            "total_quantity": (self.total_quantity),
            "total_revenue": (self.total_revenue)
        }
    }
}

/// The full generated dataset, produced once and shared read-only with
/// every stage load.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    pub customers: Vec<Customer>,
    pub products: Vec<Product>,
    pub shipping_addresses: Vec<ShippingAddress>,
    pub payment_transactions: Vec<PaymentTransaction>,
    pub orders: Vec<Order>,
    pub order_items: Vec<OrderItem>,
}

impl Dataset {
    /// Total number of documents across all six collections.
    pub fn total_documents(&self) -> usize {
        self.customers.len()
            + self.products.len()
            + self.shipping_addresses.len()
            + self.payment_transactions.len()
            + self.orders.len()
            + self.order_items.len()
    }
}

/// Reads a required string field out of a document.
pub(crate) fn doc_string(document: &Document, field: &str) -> StoreResult<String> {
    match document.get(field)? {
        Value::String(value) => Ok(value),
        other => Err(StoreError::new(
            &format!("field '{}' is not a string: {:?}", field, other),
            ErrorKind::InternalError,
        )),
    }
}

/// Reads a required numeric field out of a document as a float.
pub(crate) fn doc_number(document: &Document, field: &str) -> StoreResult<f64> {
    document.get(field)?.as_number().ok_or_else(|| {
        StoreError::new(
            &format!("field '{}' is not numeric", field),
            ErrorKind::InternalError,
        )
    })
}

/// Reads a required integer field out of a document.
pub(crate) fn doc_i64(document: &Document, field: &str) -> StoreResult<i64> {
    match document.get(field)? {
        Value::I64(value) => Ok(value),
        other => Err(StoreError::new(
            &format!("field '{}' is not an integer: {:?}", field, other),
            ErrorKind::InternalError,
        )),
    }
}
