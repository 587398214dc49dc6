use crate::domain::ports::CheckoutView;
use crate::domain::validation::{FieldResult, FieldSpec, FormReport, Validator};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::debug;

type Pending = HashMap<String, (u64, JoinHandle<()>)>;

/// Validates fields while the user types.
///
/// Keystrokes are debounced per field: each one restarts that field's timer,
/// and only the value left when the timer runs out is checked. Leaving the
/// field validates at once. Must be used from within a Tokio runtime.
pub struct LiveValidation {
    validator: Validator,
    view: Arc<dyn CheckoutView>,
    delay: Duration,
    pending: Arc<Mutex<Pending>>,
    generation: AtomicU64,
}

impl LiveValidation {
    pub fn new(validator: Validator, view: Arc<dyn CheckoutView>, delay: Duration) -> Self {
        Self {
            validator,
            view,
            delay,
            pending: Arc::new(Mutex::new(HashMap::new())),
            generation: AtomicU64::new(0),
        }
    }

    fn lock(pending: &Mutex<Pending>) -> MutexGuard<'_, Pending> {
        pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Schedules validation of `value`, replacing any check still waiting for
    /// the same field.
    pub fn schedule(&self, spec: &FieldSpec, value: String) {
        let spec = spec.clone();
        let validator = self.validator.clone();
        let view = Arc::clone(&self.view);
        let shared = Arc::clone(&self.pending);
        let delay = self.delay;
        let field = spec.name.clone();
        let generation = self.generation.fetch_add(1, Ordering::Relaxed);

        let mut pending = Self::lock(&self.pending);
        if let Some((_, previous)) = pending.remove(&field) {
            previous.abort();
        }
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            {
                let mut pending = Self::lock(&shared);
                // A newer keystroke won the race against this timer.
                if pending.get(&spec.name).is_none_or(|(g, _)| *g != generation) {
                    return;
                }
                pending.remove(&spec.name);
            }
            let result = validator.validate(&value, &spec.rules);
            debug!(field = %spec.name, valid = result.is_valid, "Field validated");
            view.decorate_fields(&FormReport {
                fields: vec![(spec.name, result)],
            });
        });
        pending.insert(field, (generation, handle));
    }

    /// Validates `value` now, dropping any debounced check for the field.
    pub fn validate_now(&self, spec: &FieldSpec, value: &str) -> FieldResult {
        if let Some((_, previous)) = Self::lock(&self.pending).remove(&spec.name) {
            previous.abort();
        }
        let result = self.validator.validate(value, &spec.rules);
        self.view.decorate_fields(&FormReport {
            fields: vec![(spec.name.clone(), result.clone())],
        });
        result
    }

    /// Drops every check still waiting on its timer.
    pub fn cancel_all(&self) {
        for (_, (_, handle)) in Self::lock(&self.pending).drain() {
            handle.abort();
        }
    }

    pub fn is_pending(&self, field: &str) -> bool {
        Self::lock(&self.pending).contains_key(field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::clock::SystemClock;
    use std::sync::atomic::AtomicUsize;

    #[derive(Default)]
    struct CountingView {
        decorations: AtomicUsize,
        last: Mutex<Option<(String, FieldResult)>>,
    }

    impl CheckoutView for CountingView {
        fn show_modal(&self) {}
        fn hide_modal(&self) {}
        fn is_modal_open(&self) -> bool {
            false
        }
        fn set_busy(&self, _busy: bool) {}
        fn decorate_fields(&self, report: &FormReport) {
            self.decorations.fetch_add(1, Ordering::SeqCst);
            *self.last.lock().unwrap() = report.fields.last().cloned();
        }
        fn clear_validation(&self) {}
    }

    fn live(view: Arc<CountingView>) -> LiveValidation {
        LiveValidation::new(
            Validator::new(Arc::new(SystemClock)),
            view,
            Duration::from_millis(300),
        )
    }

    fn cvv() -> FieldSpec {
        FieldSpec::parse("cvv", &["required", "cvv"]).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_keystroke_burst_validates_once() {
        let view = Arc::new(CountingView::default());
        let live = live(view.clone());

        for value in ["1", "12", "123"] {
            live.schedule(&cvv(), value.to_string());
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        assert_eq!(view.decorations.load(Ordering::SeqCst), 0);
        assert!(live.is_pending("cvv"));

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(view.decorations.load(Ordering::SeqCst), 1);
        assert!(!live.is_pending("cvv"));
        let (field, result) = view.last.lock().unwrap().clone().unwrap();
        assert_eq!(field, "cvv");
        assert!(result.is_valid);
    }

    #[tokio::test(start_paused = true)]
    async fn test_validate_now_replaces_pending_check() {
        let view = Arc::new(CountingView::default());
        let live = live(view.clone());

        live.schedule(&cvv(), "1".to_string());
        let result = live.validate_now(&cvv(), "12");
        assert_eq!(result.first_error(), Some("Please enter a valid CVV (3-4 digits)"));

        tokio::time::sleep(Duration::from_millis(1000)).await;
        assert_eq!(view.decorations.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_all() {
        let view = Arc::new(CountingView::default());
        let live = live(view.clone());

        live.schedule(&cvv(), "123".to_string());
        live.cancel_all();
        tokio::time::sleep(Duration::from_millis(1000)).await;
        assert_eq!(view.decorations.load(Ordering::SeqCst), 0);
    }
}
