use super::payment::{PaymentRecord, PaymentRequest};
use super::validation::FormReport;
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// String key-value persistence, the shape of a browser's local storage.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, value: String) -> Result<()>;
    async fn remove(&self, key: &str) -> Result<()>;
    async fn keys(&self) -> Result<Vec<String>>;
}

pub type KeyValueStoreBox = Box<dyn KeyValueStore>;

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Settles one payment request for a single method.
#[async_trait]
pub trait PaymentProcessor: Send + Sync {
    fn method(&self) -> &'static str;
    async fn process(&self, request: &PaymentRequest) -> Result<PaymentRecord>;
}

pub type PaymentProcessorBox = Box<dyn PaymentProcessor>;

/// The UI surface the checkout drives: the payment dialog, the submit
/// button's busy state and per-field decoration.
pub trait CheckoutView: Send + Sync {
    fn show_modal(&self);
    fn hide_modal(&self);
    fn is_modal_open(&self) -> bool;
    fn set_busy(&self, busy: bool);
    fn decorate_fields(&self, report: &FormReport);
    fn clear_validation(&self);
}
