use crate::error::{CheckoutError, Result};
use chrono::{DateTime, Utc};
use rand::Rng;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A non-negative product price.
///
/// Wraps `rust_decimal::Decimal` so prices never go through floating point.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Price(Decimal);

impl Price {
    pub const ZERO: Self = Self(Decimal::ZERO);

    pub fn new(value: Decimal) -> Result<Self> {
        if value >= Decimal::ZERO {
            Ok(Self(value))
        } else {
            Err(CheckoutError::InvalidPrice(value))
        }
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl TryFrom<Decimal> for Price {
    type Error = CheckoutError;

    fn try_from(value: Decimal) -> std::result::Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Price> for Decimal {
    fn from(price: Price) -> Self {
        price.0
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.normalize())
    }
}

/// What a purchase action carries: the product being bought.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRef {
    pub id: String,
    pub name: String,
    pub price: Price,
}

impl ProductRef {
    pub fn new(id: impl Into<String>, name: impl Into<String>, price: Price) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            price,
        }
    }
}

/// The single in-flight purchase awaiting payment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub product_id: String,
    pub product_name: String,
    pub price: Price,
    pub order_id: String,
    pub created_at: DateTime<Utc>,
}

impl Order {
    /// Builds an order for `product` with a freshly generated order id.
    pub fn for_product(product: ProductRef, now: DateTime<Utc>) -> Result<Self> {
        if product.id.trim().is_empty() {
            return Err(CheckoutError::MissingProduct);
        }
        Ok(Self {
            order_id: generate_order_id(now),
            product_id: product.id,
            product_name: product.name,
            price: product.price,
            created_at: now,
        })
    }
}

/// `ORDER-<unix millis>-<0..10000>`.
pub fn generate_order_id(now: DateTime<Utc>) -> String {
    let random: u32 = rand::thread_rng().gen_range(0..10_000);
    format!("ORDER-{}-{}", now.timestamp_millis(), random)
}

/// Holds at most one current order.
///
/// `begin` replaces whatever was there; `clear` empties the slot. An empty
/// slot is a normal state and callers must check it before processing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderContext {
    current: Option<Order>,
}

impl OrderContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&mut self, product: ProductRef, now: DateTime<Utc>) -> Result<&Order> {
        let order = Order::for_product(product, now)?;
        Ok(self.current.insert(order))
    }

    pub fn current(&self) -> Option<&Order> {
        self.current.as_ref()
    }

    pub fn clear(&mut self) -> Option<Order> {
        self.current.take()
    }

    pub fn is_empty(&self) -> bool {
        self.current.is_none()
    }
}
