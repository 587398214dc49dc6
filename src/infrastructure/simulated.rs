//! Stand-ins for the external payment providers.
//!
//! Each processor waits for its configured latency and then settles the
//! request. Card and PayPal payments complete immediately; bank transfers stay
//! pending until the funds arrive.

use crate::config::CheckoutConfig;
use crate::domain::payment::{PaymentMethod, PaymentRecord, PaymentRequest, PaymentStatus};
use crate::domain::ports::{Clock, PaymentProcessor, PaymentProcessorBox};
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

pub struct SimulatedProcessor {
    method: PaymentMethod,
    status: PaymentStatus,
    latency: Duration,
    clock: Arc<dyn Clock>,
}

impl SimulatedProcessor {
    pub fn new(
        method: PaymentMethod,
        status: PaymentStatus,
        latency: Duration,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            method,
            status,
            latency,
            clock,
        }
    }

    pub fn credit_card(latency: Duration, clock: Arc<dyn Clock>) -> Self {
        Self::new(PaymentMethod::CreditCard, PaymentStatus::Completed, latency, clock)
    }

    pub fn paypal(latency: Duration, clock: Arc<dyn Clock>) -> Self {
        Self::new(PaymentMethod::Paypal, PaymentStatus::Completed, latency, clock)
    }

    pub fn bank_transfer(latency: Duration, clock: Arc<dyn Clock>) -> Self {
        Self::new(PaymentMethod::BankTransfer, PaymentStatus::Pending, latency, clock)
    }
}

#[async_trait]
impl PaymentProcessor for SimulatedProcessor {
    fn method(&self) -> &'static str {
        self.method.as_str()
    }

    async fn process(&self, request: &PaymentRequest) -> Result<PaymentRecord> {
        info!(method = %self.method, order_id = %request.order.order_id, "Contacting payment provider");
        tokio::time::sleep(self.latency).await;

        let card_last4 = match self.method {
            PaymentMethod::CreditCard => request.card_last4.clone(),
            _ => None,
        };
        let record = PaymentRecord {
            card_last4,
            ..PaymentRecord::new(request, self.method, self.status, self.clock.now())
        };
        Ok(record)
    }
}

/// One simulated processor per supported method, with the configured delays.
pub fn simulated_processors(
    config: &CheckoutConfig,
    clock: Arc<dyn Clock>,
) -> Vec<PaymentProcessorBox> {
    vec![
        Box::new(SimulatedProcessor::credit_card(
            Duration::from_millis(config.card_delay_ms),
            clock.clone(),
        )),
        Box::new(SimulatedProcessor::paypal(
            Duration::from_millis(config.paypal_delay_ms),
            clock.clone(),
        )),
        Box::new(SimulatedProcessor::bank_transfer(
            Duration::from_millis(config.bank_transfer_delay_ms),
            clock,
        )),
    ]
}
