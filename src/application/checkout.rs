use super::live_validation::LiveValidation;
use super::notifier::NotificationCenter;
use super::payment_log::PaymentLog;
use crate::config::CheckoutConfig;
use crate::domain::checkout::{CheckoutMachine, CheckoutState, Effect, Event, PaymentFormSchema, Phase};
use crate::domain::format::format_field;
use crate::domain::notification::Notice;
use crate::domain::order::{Order, ProductRef};
use crate::domain::payment::{PaymentRecord, PaymentRequest};
use crate::domain::ports::{CheckoutView, Clock, KeyValueStoreBox, PaymentProcessorBox};
use crate::domain::validation::{FieldResult, FormData, Validator};
use crate::error::{CheckoutError, Result};
use crate::infrastructure::simulated::simulated_processors;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{error, info, warn};

/// Drives the checkout state machine and carries out its effects.
///
/// The machine state sits behind a mutex that is only held while a single
/// event is applied, never across an await. A submit that arrives while a
/// payment is being processed therefore sees the `Processing` phase and is
/// dropped.
///
/// If a submit is abandoned mid-payment (its future dropped, or the processor
/// panicking), the attempt is recorded as failed so the session can retry.
pub struct CheckoutService {
    machine: CheckoutMachine,
    state: Mutex<CheckoutState>,
    processors: HashMap<&'static str, PaymentProcessorBox>,
    payment_log: PaymentLog,
    notifier: NotificationCenter,
    live: LiveValidation,
    view: Arc<dyn CheckoutView>,
}

impl CheckoutService {
    /// Creates a service backed by the simulated payment providers.
    pub fn new(
        config: &CheckoutConfig,
        store: KeyValueStoreBox,
        clock: Arc<dyn Clock>,
        view: Arc<dyn CheckoutView>,
    ) -> Result<Self> {
        let processors = simulated_processors(config, clock.clone());
        Self::with_processors(config, store, clock, view, processors)
    }

    pub fn with_processors(
        config: &CheckoutConfig,
        store: KeyValueStoreBox,
        clock: Arc<dyn Clock>,
        view: Arc<dyn CheckoutView>,
        processors: Vec<PaymentProcessorBox>,
    ) -> Result<Self> {
        let validator = Validator::new(clock.clone());
        let live = LiveValidation::new(validator.clone(), view.clone(), config.validation_delay());
        let machine = CheckoutMachine::new(
            validator,
            PaymentFormSchema::standard()?,
            clock,
            config.confirmation_email_delay(),
        );
        let processors = processors.into_iter().map(|p| (p.method(), p)).collect();
        Ok(Self {
            machine,
            state: Mutex::new(CheckoutState::default()),
            processors,
            payment_log: PaymentLog::new(store, config.storage_key()),
            notifier: NotificationCenter::new(config.notification_duration()),
            live,
            view,
        })
    }

    fn state(&self) -> MutexGuard<'_, CheckoutState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn phase(&self) -> Phase {
        self.state().phase().clone()
    }

    pub fn current_order(&self) -> Option<Order> {
        self.state().order().current().cloned()
    }

    pub fn notifier(&self) -> &NotificationCenter {
        &self.notifier
    }

    pub fn payment_log(&self) -> &PaymentLog {
        &self.payment_log
    }

    pub fn view(&self) -> &dyn CheckoutView {
        self.view.as_ref()
    }

    pub async fn purchase(&self, product: ProductRef) -> Phase {
        self.dispatch(Event::Purchase(product)).await
    }

    /// Submits the payment form. Resolves once processing has finished, or
    /// immediately when the submit is rejected.
    pub async fn submit(&self, method: Option<&str>, form: FormData) -> Phase {
        self.dispatch(Event::Submit {
            method: method.map(str::to_string),
            form,
        })
        .await
    }

    pub async fn dismiss(&self) -> Phase {
        self.dispatch(Event::Dismiss).await
    }

    /// Handles one keystroke in `field`: returns the masked value and
    /// schedules a debounced validation of it.
    pub fn on_input(&self, field: &str, raw: &str) -> String {
        let value = format_field(field, raw).unwrap_or_else(|| raw.to_string());
        if let Some(spec) = self.machine.schema().field(field) {
            self.live.schedule(spec, value.clone());
        }
        value
    }

    /// Handles the user leaving `field`: validates `value` immediately.
    /// Returns `None` for fields without rules.
    pub fn on_blur(&self, field: &str, value: &str) -> Option<FieldResult> {
        let spec = self.machine.schema().field(field)?;
        Some(self.live.validate_now(spec, value))
    }

    async fn dispatch(&self, event: Event) -> Phase {
        let mut next = Some(event);
        while let Some(event) = next.take() {
            for effect in self.apply(event) {
                if let Some(follow_up) = self.run(effect).await {
                    next = Some(follow_up);
                }
            }
        }
        self.phase()
    }

    fn apply(&self, event: Event) -> Vec<Effect> {
        let mut state = self.state();
        let current = std::mem::take(&mut *state);
        let (updated, effects) = self.machine.step(current, event);
        *state = updated;
        effects
    }

    async fn run(&self, effect: Effect) -> Option<Event> {
        match effect {
            Effect::PersistRecord(record) => self.persist(record).await,
            Effect::StartProcessing(request) => {
                let guard = ProcessingGuard::arm(self, &request.order.order_id);
                let outcome = self.process(&request).await.map_err(|e| e.to_string());
                guard.disarm();
                return Some(Event::ProcessingFinished(outcome));
            }
            other => self.run_now(other),
        }
        None
    }

    /// Carries out an effect that needs no waiting.
    fn run_now(&self, effect: Effect) {
        match effect {
            Effect::ShowModal => self.view.show_modal(),
            Effect::HideModal => self.view.hide_modal(),
            Effect::SetBusy(busy) => self.view.set_busy(busy),
            Effect::DecorateFields(report) => self.view.decorate_fields(&report),
            Effect::ClearValidation => {
                self.live.cancel_all();
                self.view.clear_validation();
            }
            Effect::Notify(notice) => self.notifier.present(notice),
            Effect::PersistRecord(_) | Effect::StartProcessing(_) => {
                error!(?effect, "Effect cannot run outside the dispatch loop");
            }
        }
    }

    async fn process(&self, request: &PaymentRequest) -> Result<PaymentRecord> {
        let processor = self
            .processors
            .get(request.method.as_str())
            .ok_or_else(|| CheckoutError::UnsupportedMethod(request.method.clone()))?;
        processor.process(request).await
    }

    // The provider already accepted the payment, so a failed write only
    // warns; the user still sees the payment as successful.
    async fn persist(&self, record: PaymentRecord) {
        let order_id = record.order_id.clone();
        match self.payment_log.append(record).await {
            Ok(()) => info!(order_id = %order_id, "Payment record stored"),
            Err(e) => {
                error!(order_id = %order_id, "Failed to store payment record: {}", e);
                warn!("Payment log is out of sync with processed payments");
                self.notifier.present(Notice::info(format!(
                    "Your payment went through, but the receipt for order {order_id} could not be saved on this device."
                )));
            }
        }
    }
}

/// Fails the in-flight payment if it is dropped while still armed.
///
/// Dropping happens when the submit future is cancelled at the processor's
/// await point, or while unwinding from a panicking processor.
struct ProcessingGuard<'a> {
    service: &'a CheckoutService,
    order_id: String,
    armed: bool,
}

impl<'a> ProcessingGuard<'a> {
    fn arm(service: &'a CheckoutService, order_id: &str) -> Self {
        Self {
            service,
            order_id: order_id.to_string(),
            armed: true,
        }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for ProcessingGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        warn!(order_id = %self.order_id, "Payment processing abandoned before completion");
        let outcome = Err(CheckoutError::Interrupted.to_string());
        for effect in self.service.apply(Event::ProcessingFinished(outcome)) {
            self.service.run_now(effect);
        }
    }
}
