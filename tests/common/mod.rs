#![allow(dead_code)]

use checkout_flow::application::checkout::CheckoutService;
use checkout_flow::config::CheckoutConfig;
use checkout_flow::domain::order::{Price, ProductRef};
use checkout_flow::domain::ports::{Clock, KeyValueStoreBox};
use checkout_flow::domain::validation::FormData;
use checkout_flow::infrastructure::clock::FixedClock;
use checkout_flow::infrastructure::headless_view::HeadlessView;
use chrono::{TimeZone, Utc};
use rust_decimal_macros::dec;
use std::io::{Error, Write};
use std::sync::Arc;
use tempfile::NamedTempFile;

pub fn clock() -> Arc<dyn Clock> {
    Arc::new(FixedClock::new(
        Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap(),
    ))
}

pub fn service(store: KeyValueStoreBox, view: Arc<HeadlessView>) -> CheckoutService {
    CheckoutService::new(&CheckoutConfig::default(), store, clock(), view).unwrap()
}

pub fn template() -> ProductRef {
    ProductRef::new(
        "P1",
        "Professional Business Website Template",
        Price::new(dec!(299)).unwrap(),
    )
}

pub fn customer() -> FormData {
    FormData::new()
        .with("firstName", "Jane")
        .with("lastName", "Doe")
        .with("email", "jane@example.com")
        .with("phone", "+1 555 123 4567")
}

pub fn card(cvv: &str) -> FormData {
    let mut form = customer();
    form.merge(
        FormData::new()
            .with("cardNumber", "4111 1111 1111 1111")
            .with("expiryDate", "12/27")
            .with("cvv", cvv)
            .with("cardName", "Jane Doe"),
    );
    form
}

pub fn write_file(contents: &str) -> Result<NamedTempFile, Error> {
    let mut file = NamedTempFile::new()?;
    file.write_all(contents.as_bytes())?;
    file.flush()?;
    Ok(file)
}

/// A config file with every simulated delay set to zero.
pub fn instant_config() -> Result<NamedTempFile, Error> {
    write_file(
        r#"{"card_delay_ms": 0, "paypal_delay_ms": 0, "bank_transfer_delay_ms": 0, "confirmation_email_delay_ms": 0}"#,
    )
}
