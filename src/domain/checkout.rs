//! The checkout state machine.
//!
//! [`CheckoutMachine::step`] is a pure function of the current state and an
//! incoming event. It never performs I/O or waits; instead it returns the
//! [`Effect`]s the caller must carry out (show the dialog, run a processor,
//! persist a record, notify the user).

use super::notification::Notice;
use super::order::{OrderContext, ProductRef};
use super::payment::{Customer, PaymentMethod, PaymentRecord, PaymentRequest, PaymentStatus, card_last4};
use super::ports::Clock;
use super::validation::{FieldSpec, FormData, FormReport, Validator};
use crate::error::{CheckoutError, Result};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Rules for the payment form, split by when the fields are shown.
#[derive(Debug, Clone)]
pub struct PaymentFormSchema {
    /// Customer fields, visible for every method.
    pub common: Vec<FieldSpec>,
    /// Card fields, visible only when paying by credit card.
    pub card: Vec<FieldSpec>,
}

impl PaymentFormSchema {
    pub fn standard() -> Result<Self> {
        Ok(Self {
            common: vec![
                FieldSpec::parse("firstName", &["required", "minLength:2", "alpha"])?,
                FieldSpec::parse("lastName", &["required", "minLength:2", "alpha"])?,
                FieldSpec::parse("email", &["required", "email"])?,
                FieldSpec::parse("phone", &["phone"])?,
            ],
            card: vec![
                FieldSpec::parse("cardNumber", &["required", "cardNumber"])?,
                FieldSpec::parse("expiryDate", &["required", "expiryDate"])?,
                FieldSpec::parse("cvv", &["required", "cvv"])?,
                FieldSpec::parse("cardName", &["required", "alpha"])?,
            ],
        })
    }

    /// The fields that take part in a submit for `method`. Hidden card fields
    /// are left out for every other method, including unknown ones.
    pub fn fields_for<'a>(&'a self, method: &str) -> impl Iterator<Item = &'a FieldSpec> + 'a {
        let card: &[FieldSpec] = if method == PaymentMethod::CreditCard.as_str() {
            &self.card
        } else {
            &[]
        };
        self.common.iter().chain(card.iter())
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.common.iter().chain(self.card.iter()).find(|f| f.name == name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Phase {
    Idle,
    AwaitingMethodSelection,
    Validating,
    Processing { method: String },
    Completed { record: PaymentRecord },
    Failed { reason: String },
}

impl Phase {
    pub fn name(&self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::AwaitingMethodSelection => "awaiting-method-selection",
            Phase::Validating => "validating",
            Phase::Processing { .. } => "processing",
            Phase::Completed { .. } => "completed",
            Phase::Failed { .. } => "failed",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutState {
    phase: Phase,
    order: OrderContext,
}

impl Default for CheckoutState {
    fn default() -> Self {
        Self {
            phase: Phase::Idle,
            order: OrderContext::new(),
        }
    }
}

impl CheckoutState {
    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn order(&self) -> &OrderContext {
        &self.order
    }

    pub fn is_processing(&self) -> bool {
        matches!(self.phase, Phase::Processing { .. })
    }

    fn enter(&mut self, phase: Phase) {
        debug!(from = %self.phase, to = %phase, "Checkout transition");
        self.phase = phase;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Purchase(ProductRef),
    Submit {
        method: Option<String>,
        form: FormData,
    },
    /// Outcome of a [`Effect::StartProcessing`]; errors carry the reason.
    ProcessingFinished(std::result::Result<PaymentRecord, String>),
    Dismiss,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    ShowModal,
    HideModal,
    SetBusy(bool),
    DecorateFields(FormReport),
    ClearValidation,
    Notify(Notice),
    StartProcessing(PaymentRequest),
    PersistRecord(PaymentRecord),
}

pub struct CheckoutMachine {
    validator: Validator,
    schema: PaymentFormSchema,
    clock: Arc<dyn Clock>,
    confirmation_email_delay: Duration,
}

impl CheckoutMachine {
    pub fn new(
        validator: Validator,
        schema: PaymentFormSchema,
        clock: Arc<dyn Clock>,
        confirmation_email_delay: Duration,
    ) -> Self {
        Self {
            validator,
            schema,
            clock,
            confirmation_email_delay,
        }
    }

    pub fn schema(&self) -> &PaymentFormSchema {
        &self.schema
    }

    /// Advances `state` by one event and returns the effects to run.
    pub fn step(&self, mut state: CheckoutState, event: Event) -> (CheckoutState, Vec<Effect>) {
        let effects = match event {
            Event::Purchase(product) => self.on_purchase(&mut state, product),
            Event::Submit { method, form } => self.on_submit(&mut state, method, &form),
            Event::ProcessingFinished(outcome) => self.on_finished(&mut state, outcome),
            Event::Dismiss => self.on_dismiss(&mut state),
        };
        (state, effects)
    }

    fn on_purchase(&self, state: &mut CheckoutState, product: ProductRef) -> Vec<Effect> {
        if state.is_processing() {
            warn!("Purchase ignored while a payment is in progress");
            return Vec::new();
        }
        match state.order.begin(product, self.clock.now()) {
            Ok(order) => {
                info!(order_id = %order.order_id, product_id = %order.product_id, "Purchase initiated");
                state.enter(Phase::AwaitingMethodSelection);
                vec![Effect::ClearValidation, Effect::ShowModal]
            }
            Err(e) => {
                warn!("Failed to handle purchase: {}", e);
                vec![Effect::Notify(Notice::error(
                    "Failed to initiate purchase. Please try again.",
                ))]
            }
        }
    }

    fn on_submit(
        &self,
        state: &mut CheckoutState,
        method: Option<String>,
        form: &FormData,
    ) -> Vec<Effect> {
        match state.phase {
            Phase::Processing { .. } => {
                warn!("Submit dropped: {}", CheckoutError::ProcessingInProgress);
                return Vec::new();
            }
            Phase::Completed { .. } => {
                warn!("Submit ignored: order already paid");
                return Vec::new();
            }
            _ => {}
        }

        let Some(order) = state.order.current().cloned() else {
            return vec![Effect::Notify(Notice::error(CheckoutError::NoOrder.to_string()))];
        };
        if !matches!(state.phase, Phase::Idle) {
            state.enter(Phase::AwaitingMethodSelection);
        }
        let Some(method) = method.filter(|m| !m.trim().is_empty()) else {
            return vec![Effect::Notify(Notice::error(
                CheckoutError::NoPaymentMethod.to_string(),
            ))];
        };

        state.enter(Phase::Validating);
        let report = self
            .validator
            .validate_fields(form, self.schema.fields_for(&method));
        if !report.is_valid() {
            let failed = CheckoutError::ValidationFailed {
                fields: report.invalid_fields(),
            };
            warn!("{}", failed);
            state.enter(Phase::AwaitingMethodSelection);
            return vec![
                Effect::DecorateFields(report),
                Effect::Notify(Notice::error("Please correct the errors in the form.")),
            ];
        }

        let card_last4 = if method == PaymentMethod::CreditCard.as_str() {
            card_last4(form.get("cardNumber"))
        } else {
            None
        };
        let request = PaymentRequest {
            order,
            method: method.clone(),
            customer: customer_from(form),
            card_last4,
        };
        info!(method = %method, order_id = %request.order.order_id, "Processing payment");
        state.enter(Phase::Processing { method });
        vec![
            Effect::DecorateFields(report),
            Effect::SetBusy(true),
            Effect::StartProcessing(request),
        ]
    }

    fn on_finished(
        &self,
        state: &mut CheckoutState,
        outcome: std::result::Result<PaymentRecord, String>,
    ) -> Vec<Effect> {
        if !state.is_processing() {
            warn!(phase = %state.phase, "Stale processing result ignored");
            return Vec::new();
        }
        match outcome {
            Ok(record) => {
                info!(order_id = %record.order_id, status = record.status.as_str(), "Payment processed successfully");
                let headline = match record.status {
                    PaymentStatus::Pending => Notice::info(format!(
                        "Bank transfer details provided. Please complete the transfer using the reference number {}.",
                        record.order_id
                    )),
                    _ => Notice::success(format!(
                        "Payment successful! Order {} has been processed.",
                        record.order_id
                    )),
                };
                let email = Notice::info(format!(
                    "Confirmation email sent to {}",
                    record.customer.email
                ))
                .after(self.confirmation_email_delay);
                state.enter(Phase::Completed {
                    record: record.clone(),
                });
                vec![
                    Effect::SetBusy(false),
                    Effect::PersistRecord(record),
                    Effect::Notify(headline),
                    Effect::HideModal,
                    Effect::Notify(email),
                ]
            }
            Err(reason) => {
                warn!(reason = %reason, "Payment processing failed");
                state.enter(Phase::Failed {
                    reason: reason.clone(),
                });
                vec![Effect::SetBusy(false), Effect::Notify(Notice::error(reason))]
            }
        }
    }

    fn on_dismiss(&self, state: &mut CheckoutState) -> Vec<Effect> {
        if state.is_processing() {
            warn!("Dismiss ignored while a payment is in progress");
            return Vec::new();
        }
        if let Some(order) = state.order.clear() {
            debug!(order_id = %order.order_id, "Order context cleared");
        }
        state.enter(Phase::Idle);
        vec![Effect::ClearValidation, Effect::HideModal]
    }
}

fn customer_from(form: &FormData) -> Customer {
    Customer {
        first_name: form.get("firstName").to_string(),
        last_name: form.get("lastName").to_string(),
        email: form.get("email").to_string(),
        phone: form.get("phone").to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::notification::Severity;
    use crate::domain::order::Price;
    use crate::infrastructure::clock::FixedClock;
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;

    fn machine() -> CheckoutMachine {
        let clock: Arc<dyn Clock> = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap(),
        ));
        CheckoutMachine::new(
            Validator::new(clock.clone()),
            PaymentFormSchema::standard().unwrap(),
            clock,
            Duration::from_millis(1000),
        )
    }

    fn product() -> ProductRef {
        ProductRef::new("P1", "Website Template", Price::new(dec!(299)).unwrap())
    }

    fn customer_form() -> FormData {
        FormData::new()
            .with("firstName", "Jane")
            .with("lastName", "Doe")
            .with("email", "jane@example.com")
    }

    fn card_form(cvv: &str) -> FormData {
        customer_form()
            .with("cardNumber", "4111 1111 1111 1111")
            .with("expiryDate", "12/27")
            .with("cvv", cvv)
            .with("cardName", "Jane Doe")
    }

    fn errors(effects: &[Effect]) -> Vec<&Notice> {
        effects
            .iter()
            .filter_map(|e| match e {
                Effect::Notify(n) if n.severity == Severity::Error => Some(n),
                _ => None,
            })
            .collect()
    }

    fn purchased(m: &CheckoutMachine) -> CheckoutState {
        let (state, effects) = m.step(CheckoutState::default(), Event::Purchase(product()));
        assert_eq!(effects, vec![Effect::ClearValidation, Effect::ShowModal]);
        state
    }

    #[test]
    fn test_purchase_opens_modal_with_order() {
        let m = machine();
        let state = purchased(&m);
        assert_eq!(state.phase(), &Phase::AwaitingMethodSelection);
        let order = state.order().current().unwrap();
        assert_eq!(order.product_id, "P1");
        assert!(order.order_id.starts_with("ORDER-"));
    }

    #[test]
    fn test_purchase_without_product_id_reports_error() {
        let m = machine();
        let bad = ProductRef::new("", "Nothing", Price::ZERO);
        let (state, effects) = m.step(CheckoutState::default(), Event::Purchase(bad));
        assert_eq!(state.phase(), &Phase::Idle);
        assert_eq!(errors(&effects).len(), 1);
    }

    #[test]
    fn test_submit_without_method_stays_awaiting() {
        let m = machine();
        let state = purchased(&m);
        let (state, effects) = m.step(
            state,
            Event::Submit {
                method: None,
                form: customer_form(),
            },
        );
        assert_eq!(state.phase(), &Phase::AwaitingMethodSelection);
        let errs = errors(&effects);
        assert_eq!(errs.len(), 1);
        assert_eq!(errs[0].message, "No payment method selected");
    }

    #[test]
    fn test_submit_without_order_fails_fast() {
        let m = machine();
        let (state, effects) = m.step(
            CheckoutState::default(),
            Event::Submit {
                method: Some("paypal".into()),
                form: customer_form(),
            },
        );
        assert_eq!(state.phase(), &Phase::Idle);
        assert_eq!(errors(&effects)[0].message, "No order found");
    }

    #[test]
    fn test_invalid_cvv_blocks_processing() {
        let m = machine();
        let state = purchased(&m);
        let (state, effects) = m.step(
            state,
            Event::Submit {
                method: Some("credit-card".into()),
                form: card_form("12"),
            },
        );
        assert_eq!(state.phase(), &Phase::AwaitingMethodSelection);
        assert!(!effects.iter().any(|e| matches!(e, Effect::StartProcessing(_))));
        let report = effects
            .iter()
            .find_map(|e| match e {
                Effect::DecorateFields(r) => Some(r),
                _ => None,
            })
            .unwrap();
        assert_eq!(
            report.field("cvv").unwrap().first_error(),
            Some("Please enter a valid CVV (3-4 digits)")
        );
    }

    #[test]
    fn test_hidden_card_fields_ignored_for_bank_transfer() {
        let m = machine();
        let state = purchased(&m);
        let form = customer_form().with("cvv", "1");
        let (state, effects) = m.step(
            state,
            Event::Submit {
                method: Some("bank-transfer".into()),
                form,
            },
        );
        assert!(state.is_processing());
        let request = effects
            .iter()
            .find_map(|e| match e {
                Effect::StartProcessing(r) => Some(r),
                _ => None,
            })
            .unwrap();
        assert_eq!(request.method, "bank-transfer");
        assert_eq!(request.card_last4, None);
    }

    #[test]
    fn test_card_request_keeps_only_last4() {
        let m = machine();
        let state = purchased(&m);
        let (_, effects) = m.step(
            state,
            Event::Submit {
                method: Some("credit-card".into()),
                form: card_form("123"),
            },
        );
        assert!(effects.contains(&Effect::SetBusy(true)));
        let request = effects
            .iter()
            .find_map(|e| match e {
                Effect::StartProcessing(r) => Some(r),
                _ => None,
            })
            .unwrap();
        assert_eq!(request.card_last4.as_deref(), Some("1111"));
    }

    #[test]
    fn test_second_submit_while_processing_is_ignored() {
        let m = machine();
        let state = purchased(&m);
        let submit = Event::Submit {
            method: Some("paypal".into()),
            form: customer_form(),
        };
        let (state, _) = m.step(state, submit.clone());
        let (state, effects) = m.step(state, submit);
        assert!(state.is_processing());
        assert!(effects.is_empty());
    }

    #[test]
    fn test_failure_keeps_order_for_retry() {
        let m = machine();
        let state = purchased(&m);
        let order_id = state.order().current().unwrap().order_id.clone();
        let (state, _) = m.step(
            state,
            Event::Submit {
                method: Some("crypto".into()),
                form: customer_form(),
            },
        );
        let (state, effects) = m.step(
            state,
            Event::ProcessingFinished(Err("Unsupported payment method: crypto".into())),
        );
        assert!(matches!(state.phase(), Phase::Failed { .. }));
        assert_eq!(state.order().current().unwrap().order_id, order_id);
        assert!(effects.contains(&Effect::SetBusy(false)));
        assert_eq!(errors(&effects).len(), 1);

        let (state, effects) = m.step(
            state,
            Event::Submit {
                method: Some("paypal".into()),
                form: customer_form(),
            },
        );
        assert!(state.is_processing());
        assert!(effects.iter().any(|e| matches!(e, Effect::StartProcessing(_))));
    }

    #[test]
    fn test_completion_then_dismiss_clears_order() {
        let m = machine();
        let state = purchased(&m);
        let (state, effects) = m.step(
            state,
            Event::Submit {
                method: Some("paypal".into()),
                form: customer_form(),
            },
        );
        let Some(Effect::StartProcessing(request)) = effects.last().cloned() else {
            panic!("expected processing to start");
        };
        let record = PaymentRecord::new(
            &request,
            PaymentMethod::Paypal,
            PaymentStatus::Completed,
            Utc::now(),
        );
        let (state, effects) = m.step(state, Event::ProcessingFinished(Ok(record.clone())));

        assert!(matches!(state.phase(), Phase::Completed { .. }));
        assert!(!state.order().is_empty());
        assert!(effects.contains(&Effect::PersistRecord(record)));
        assert!(effects.contains(&Effect::HideModal));
        let notices: Vec<&Notice> = effects
            .iter()
            .filter_map(|e| match e {
                Effect::Notify(n) => Some(n),
                _ => None,
            })
            .collect();
        assert_eq!(notices[0].severity, Severity::Success);
        assert_eq!(notices[1].message, "Confirmation email sent to jane@example.com");
        assert_eq!(notices[1].delay, Some(Duration::from_millis(1000)));

        let (state, effects) = m.step(state, Event::Dismiss);
        assert_eq!(state.phase(), &Phase::Idle);
        assert!(state.order().is_empty());
        assert_eq!(effects, vec![Effect::ClearValidation, Effect::HideModal]);
    }

    #[test]
    fn test_schema_visibility() {
        let schema = PaymentFormSchema::standard().unwrap();
        let card: Vec<&str> = schema
            .fields_for("credit-card")
            .map(|f| f.name.as_str())
            .collect();
        assert!(card.contains(&"cvv"));
        let bank: Vec<&str> = schema
            .fields_for("bank-transfer")
            .map(|f| f.name.as_str())
            .collect();
        assert_eq!(bank, vec!["firstName", "lastName", "email", "phone"]);
    }
}
