use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CheckoutError {
    #[error("No order found")]
    NoOrder,
    #[error("No payment method selected")]
    NoPaymentMethod,
    #[error("Form validation failed for: {}", fields.join(", "))]
    ValidationFailed { fields: Vec<String> },
    #[error("Unsupported payment method: {0}")]
    UnsupportedMethod(String),
    #[error("Payment already in progress")]
    ProcessingInProgress,
    #[error("Payment was interrupted. Please try again.")]
    Interrupted,
    #[error("A product reference is required to start a purchase")]
    MissingProduct,
    #[error("Price must not be negative: {0}")]
    InvalidPrice(Decimal),
    #[error("Unknown validation rule: {0}")]
    UnknownRule(String),
    #[error("Invalid parameter '{param}' for rule '{rule}'")]
    InvalidRuleParameter { rule: String, param: String },
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[cfg(feature = "storage-rocksdb")]
    #[error("RocksDB error: {0}")]
    RocksDb(#[from] rocksdb::Error),
}

pub type Result<T> = std::result::Result<T, CheckoutError>;
