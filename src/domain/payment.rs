use super::order::{Order, Price};
use crate::error::CheckoutError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PaymentMethod {
    CreditCard,
    Paypal,
    BankTransfer,
}

impl PaymentMethod {
    pub const ALL: [PaymentMethod; 3] = [
        PaymentMethod::CreditCard,
        PaymentMethod::Paypal,
        PaymentMethod::BankTransfer,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::CreditCard => "credit-card",
            PaymentMethod::Paypal => "paypal",
            PaymentMethod::BankTransfer => "bank-transfer",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentMethod {
    type Err = CheckoutError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PaymentMethod::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| CheckoutError::UnsupportedMethod(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
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
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
}

/// Everything a processor needs to settle one order.
///
/// Card data never travels past this point except as the last four digits.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentRequest {
    pub order: Order,
    pub method: String,
    pub customer: Customer,
    pub card_last4: Option<String>,
}

/// An entry of the append-only payment log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRecord {
    pub order_id: String,
    pub product_id: String,
    pub product_name: String,
    pub price: Price,
    pub customer: Customer,
    pub payment_method: PaymentMethod,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub card_last4: Option<String>,
    pub status: PaymentStatus,
    pub processed_at: DateTime<Utc>,
}

impl PaymentRecord {
    pub fn new(
        request: &PaymentRequest,
        payment_method: PaymentMethod,
        status: PaymentStatus,
        processed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            order_id: request.order.order_id.clone(),
            product_id: request.order.product_id.clone(),
            product_name: request.order.product_name.clone(),
            price: request.order.price,
            customer: request.customer.clone(),
            payment_method,
            card_last4: request.card_last4.clone(),
            status,
            processed_at,
        }
    }
}

/// Last four digits of a (possibly formatted) card number.
pub fn card_last4(card_number: &str) -> Option<String> {
    let digits: Vec<char> = card_number.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() < 4 {
        return None;
    }
    Some(digits[digits.len() - 4..].iter().collect())
}
