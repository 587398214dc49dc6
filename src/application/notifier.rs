use crate::domain::notification::{Notice, Severity};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, info};

pub type NoticeId = u64;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShownNotice {
    pub id: NoticeId,
    pub message: String,
    pub severity: Severity,
}

#[derive(Default)]
struct Inner {
    next_id: NoticeId,
    active: Vec<ShownNotice>,
    history: Vec<ShownNotice>,
    timers: HashMap<NoticeId, JoinHandle<()>>,
    delayed: Vec<JoinHandle<()>>,
}

/// Stacked, self-dismissing user notices.
///
/// Every notice gets its own timer task; dismissing a notice early aborts
/// only that timer. Outside a Tokio runtime notices are shown without a
/// timer and stay active until dismissed.
#[derive(Clone)]
pub struct NotificationCenter {
    inner: Arc<Mutex<Inner>>,
    display: Duration,
}

impl NotificationCenter {
    pub fn new(display: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner::default())),
            display,
        }
    }

    fn lock(inner: &Mutex<Inner>) -> MutexGuard<'_, Inner> {
        inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Shows `notice` now, or after its delay if it carries one.
    pub fn present(&self, notice: Notice) {
        match (notice.delay, Handle::try_current()) {
            (Some(delay), Ok(runtime)) => {
                let this = self.clone();
                let handle = runtime.spawn(async move {
                    tokio::time::sleep(delay).await;
                    this.notify(notice.message, notice.severity);
                });
                let mut inner = Self::lock(&self.inner);
                inner.delayed.retain(|pending| !pending.is_finished());
                inner.delayed.push(handle);
            }
            _ => {
                self.notify(notice.message, notice.severity);
            }
        }
    }

    pub fn notify(&self, message: impl Into<String>, severity: Severity) -> NoticeId {
        let message = message.into();
        info!(severity = %severity, "{}", message);

        let mut inner = Self::lock(&self.inner);
        inner.next_id += 1;
        let id = inner.next_id;
        let shown = ShownNotice {
            id,
            message,
            severity,
        };
        inner.active.push(shown.clone());
        inner.history.push(shown);

        let Ok(runtime) = Handle::try_current() else {
            debug!(id, "No runtime for the expiry timer");
            return id;
        };
        let shared = Arc::clone(&self.inner);
        let display = self.display;
        let timer = runtime.spawn(async move {
            tokio::time::sleep(display).await;
            let mut inner = Self::lock(&shared);
            inner.active.retain(|n| n.id != id);
            inner.timers.remove(&id);
            debug!(id, "Notice expired");
        });
        inner.timers.insert(id, timer);
        id
    }

    /// Removes a notice before its timer runs out. Returns whether it was
    /// still showing.
    pub fn dismiss(&self, id: NoticeId) -> bool {
        let mut inner = Self::lock(&self.inner);
        if let Some(timer) = inner.timers.remove(&id) {
            timer.abort();
        }
        let before = inner.active.len();
        inner.active.retain(|n| n.id != id);
        before != inner.active.len()
    }

    pub fn active(&self) -> Vec<ShownNotice> {
        Self::lock(&self.inner).active.clone()
    }

    /// Every notice shown so far, oldest first.
    pub fn history(&self) -> Vec<ShownNotice> {
        Self::lock(&self.inner).history.clone()
    }

    /// Delayed notices that have not been shown yet.
    pub fn pending(&self) -> usize {
        Self::lock(&self.inner)
            .delayed
            .iter()
            .filter(|handle| !handle.is_finished())
            .count()
    }

    /// Waits until every delayed notice has been shown.
    pub async fn settle(&self) {
        loop {
            let pending = std::mem::take(&mut Self::lock(&self.inner).delayed);
            if pending.is_empty() {
                return;
            }
            for handle in pending {
                let _ = handle.await;
            }
        }
    }
}
