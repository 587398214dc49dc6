use crate::error::Result;
use serde::Deserialize;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::time::Duration;

/// Tunables for the checkout flow.
///
/// Every field has a default, so an empty JSON object is a valid config file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CheckoutConfig {
    pub card_delay_ms: u64,
    pub paypal_delay_ms: u64,
    pub bank_transfer_delay_ms: u64,
    pub notification_duration_ms: u64,
    pub confirmation_email_delay_ms: u64,
    /// Quiet period after the last keystroke before a field is validated.
    pub validation_delay_ms: u64,
    pub storage_prefix: String,
    pub payment_records_key: String,
}

impl Default for CheckoutConfig {
    fn default() -> Self {
        Self {
            card_delay_ms: 2000,
            paypal_delay_ms: 1000,
            bank_transfer_delay_ms: 500,
            notification_duration_ms: 5000,
            confirmation_email_delay_ms: 1000,
            validation_delay_ms: 300,
            storage_prefix: "neosafi_".to_string(),
            payment_records_key: "neosafi-payments".to_string(),
        }
    }
}

impl CheckoutConfig {
    /// Reads a JSON config file. Missing keys fall back to their defaults.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }

    /// The namespaced key the payment log is persisted under.
    pub fn storage_key(&self) -> String {
        format!("{}{}", self.storage_prefix, self.payment_records_key)
    }

    pub fn notification_duration(&self) -> Duration {
        Duration::from_millis(self.notification_duration_ms)
    }

    pub fn confirmation_email_delay(&self) -> Duration {
        Duration::from_millis(self.confirmation_email_delay_ms)
    }

    pub fn validation_delay(&self) -> Duration {
        Duration::from_millis(self.validation_delay_ms)
    }
}
