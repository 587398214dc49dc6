use crate::domain::ports::CheckoutView;
use crate::domain::validation::FormReport;
use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

/// How a field is currently decorated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldDecoration {
    Valid,
    Invalid(String),
}

/// A `CheckoutView` without a screen. It remembers what a real dialog would
/// display, which is all the CLI and the tests need.
#[derive(Debug, Default)]
pub struct HeadlessView {
    modal_open: AtomicBool,
    busy: AtomicBool,
    decorations: Mutex<BTreeMap<String, FieldDecoration>>,
}

impl HeadlessView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    pub fn decoration(&self, field: &str) -> Option<FieldDecoration> {
        self.decorations
            .lock()
            .map(|d| d.get(field).cloned())
            .unwrap_or_default()
    }

    pub fn decorated_fields(&self) -> usize {
        self.decorations.lock().map(|d| d.len()).unwrap_or_default()
    }
}

impl CheckoutView for HeadlessView {
    fn show_modal(&self) {
        self.modal_open.store(true, Ordering::SeqCst);
        debug!("Payment dialog shown");
    }

    fn hide_modal(&self) {
        self.modal_open.store(false, Ordering::SeqCst);
        debug!("Payment dialog hidden");
    }

    fn is_modal_open(&self) -> bool {
        self.modal_open.load(Ordering::SeqCst)
    }

    fn set_busy(&self, busy: bool) {
        self.busy.store(busy, Ordering::SeqCst);
    }

    fn decorate_fields(&self, report: &FormReport) {
        if let Ok(mut decorations) = self.decorations.lock() {
            for (field, result) in &report.fields {
                let decoration = match result.first_error() {
                    Some(message) => FieldDecoration::Invalid(message.to_string()),
                    None => FieldDecoration::Valid,
                };
                decorations.insert(field.clone(), decoration);
            }
        }
    }

    fn clear_validation(&self) {
        if let Ok(mut decorations) = self.decorations.lock() {
            decorations.clear();
        }
    }
}
