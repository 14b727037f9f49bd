use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

/// How long a notice stays visible before it is dismissed automatically.
pub const AUTO_DISMISS: Duration = Duration::from_millis(4000);

/// Notice
///
/// A short-lived user-facing message (toast). At most one notice is visible at
/// a time across the whole process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct Notice {
    /// Unique id; pushing a notice with the id of the current one replaces it
    /// in place instead of evicting it.
    pub id: String,
    pub title: Option<String>,
    pub description: Option<String>,
}

impl Notice {
    /// Creates a notice with a freshly generated id.
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            title: Some(title.into()),
            description: Some(description.into()),
        }
    }

    pub fn with_id(
        id: impl Into<String>,
        title: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            title: Some(title.into()),
            description: Some(description.into()),
        }
    }
}

struct HubInner {
    /// The single visible slot. Latest push wins; there is no backlog.
    current: Option<Notice>,
    /// Bumped on every eviction or dismissal. An auto-dismiss timer captures
    /// the epoch of the item it was scheduled for and becomes a no-op once the
    /// epoch moves on, so a stale timer can never dismiss a newer notice.
    epoch: u64,
    next_key: u64,
    listeners: HashMap<u64, mpsc::UnboundedSender<Option<Notice>>>,
}

/// NoticeHub
///
/// The process-wide notification channel: a capacity-1, latest-wins register
/// with a broadcast subscription mechanism. Despite the toast "queue" naming
/// in the UI, nothing is queued: pushing replaces whatever is visible.
///
/// Constructed once at startup and passed around through the application
/// state; all operations are lock-serialized and safe from any task.
#[derive(Clone)]
pub struct NoticeHub {
    inner: Arc<Mutex<HubInner>>,
    auto_dismiss: Option<Duration>,
}

impl Default for NoticeHub {
    fn default() -> Self {
        Self::new()
    }
}

impl NoticeHub {
    /// A hub with the standard 4-second auto-dismiss.
    pub fn new() -> Self {
        Self::with_auto_dismiss(Some(AUTO_DISMISS))
    }

    /// A hub with a custom (or disabled) auto-dismiss delay.
    pub fn with_auto_dismiss(auto_dismiss: Option<Duration>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(HubInner {
                current: None,
                epoch: 0,
                next_key: 0,
                listeners: HashMap::new(),
            })),
            auto_dismiss,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HubInner> {
        // A poisoned lock only means a panicking listener; the hub state
        // itself is still coherent.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// push
    ///
    /// Makes `notice` the sole visible item and synchronously notifies every
    /// subscriber. Pushing the id of the current item replaces it in place
    /// without restarting its timer; any other id evicts the current item and
    /// schedules a fresh auto-dismiss for the newcomer.
    pub fn push(&self, mut notice: Notice) {
        if notice.id.is_empty() {
            notice.id = Uuid::new_v4().to_string();
        }

        let scheduled_epoch = {
            let mut inner = self.lock();
            let in_place = inner
                .current
                .as_ref()
                .is_some_and(|current| current.id == notice.id);
            inner.current = Some(notice.clone());
            if in_place {
                broadcast(&mut inner);
                None
            } else {
                inner.epoch += 1;
                broadcast(&mut inner);
                Some(inner.epoch)
            }
        };

        if let (Some(epoch), Some(delay)) = (scheduled_epoch, self.auto_dismiss) {
            // Timers need a runtime; synchronous callers without one simply
            // get no auto-dismiss.
            if let Ok(handle) = tokio::runtime::Handle::try_current() {
                let hub = self.clone();
                handle.spawn(async move {
                    tokio::time::sleep(delay).await;
                    hub.dismiss_if_current(epoch);
                });
            }
        }
    }

    /// dismiss
    ///
    /// Clears the visible slot and notifies all subscribers of the cleared
    /// state. Also invalidates any pending auto-dismiss timer.
    pub fn dismiss(&self) {
        let mut inner = self.lock();
        inner.current = None;
        inner.epoch += 1;
        broadcast(&mut inner);
    }

    /// Epoch-guarded dismissal used by auto-dismiss timers: a no-op unless the
    /// item the timer was scheduled for is still the visible one.
    fn dismiss_if_current(&self, epoch: u64) {
        let mut inner = self.lock();
        if inner.epoch != epoch || inner.current.is_none() {
            return;
        }
        inner.current = None;
        inner.epoch += 1;
        broadcast(&mut inner);
    }

    /// subscribe
    ///
    /// Registers a display listener. The subscription immediately receives the
    /// current state, then every subsequent change, until it is dropped;
    /// after which no further delivery can occur.
    pub fn subscribe(&self) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let key = {
            let mut inner = self.lock();
            let key = inner.next_key;
            inner.next_key += 1;
            // Deliver the current state synchronously on registration.
            let _ = tx.send(inner.current.clone());
            inner.listeners.insert(key, tx);
            key
        };
        Subscription {
            key,
            rx,
            hub: self.clone(),
        }
    }

    /// The currently visible notice, if any.
    pub fn current(&self) -> Option<Notice> {
        self.lock().current.clone()
    }

    /// Number of live subscriptions.
    pub fn listener_count(&self) -> usize {
        self.lock().listeners.len()
    }
}

/// Sends the current state to every listener, dropping the ones whose
/// receiving side is gone.
fn broadcast(inner: &mut HubInner) {
    let current = inner.current.clone();
    inner
        .listeners
        .retain(|_, tx| tx.send(current.clone()).is_ok());
}

/// Subscription
///
/// A live listener registration. Each received value is the full visible
/// state: `Some(notice)` when something is showing, `None` once cleared.
/// Dropping the subscription unregisters the listener.
pub struct Subscription {
    key: u64,
    rx: mpsc::UnboundedReceiver<Option<Notice>>,
    hub: NoticeHub,
}

impl Subscription {
    /// Waits for the next state change. Returns `None` only if the hub was
    /// torn down.
    pub async fn recv(&mut self) -> Option<Option<Notice>> {
        self.rx.recv().await
    }

    /// Non-blocking variant for tests and polling callers.
    pub fn try_recv(&mut self) -> Option<Option<Notice>> {
        self.rx.try_recv().ok()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.hub.lock().listeners.remove(&self.key);
    }
}
