//! Lifecycle notifier: fire-and-forget publication of state changes.
//!
//! Observers register a callback and receive every event published after
//! registration. There is no acknowledgement: with no observers attached,
//! events are dropped.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use labman_protocol::{NotificationName, Notifications};
use parking_lot::RwLock;
use serde_json::{Value, json};
use tracing::debug;

use crate::config::LabConfig;

/// Callback for emitting notifications to observers.
pub type NotifySender = Arc<dyn Fn(&str, Value) + Send + Sync>;

/// A state change worth telling the UI about.
#[derive(Debug, Clone, PartialEq)]
pub enum LifecycleEvent {
    LabsChanged(Vec<String>),
    ConfigChanged(LabConfig),
    NotebookStateChanged(bool),
}

impl LifecycleEvent {
    pub fn name(&self) -> NotificationName {
        match self {
            Self::LabsChanged(_) => Notifications::LAB_DID_CHANGE_LIST,
            Self::ConfigChanged(_) => Notifications::CONFIG_DID_CHANGE,
            Self::NotebookStateChanged(_) => Notifications::NOTEBOOK_DID_CHANGE_STATE,
        }
    }

    pub fn params(&self) -> Value {
        match self {
            Self::LabsChanged(labs) => json!({ "labs": labs }),
            Self::ConfigChanged(config) => json!({ "config": config }),
            Self::NotebookStateChanged(running) => json!({ "running": running }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Cheap to clone; clones share the observer list.
#[derive(Clone, Default)]
pub struct Notifier {
    inner: Arc<NotifierInner>,
}

#[derive(Default)]
struct NotifierInner {
    next_id: AtomicU64,
    observers: RwLock<Vec<(SubscriptionId, NotifySender)>>,
}

impl Notifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, sender: NotifySender) -> SubscriptionId {
        let id = SubscriptionId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        self.inner.observers.write().push((id, sender));
        id
    }

    /// Returns false if `id` was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut observers = self.inner.observers.write();
        let before = observers.len();
        observers.retain(|(sid, _)| *sid != id);
        observers.len() != before
    }

    pub fn observer_count(&self) -> usize {
        self.inner.observers.read().len()
    }

    pub fn publish(&self, event: LifecycleEvent) {
        // Snapshot so callbacks may subscribe or unsubscribe without deadlocking.
        let observers: Vec<NotifySender> = self
            .inner
            .observers
            .read()
            .iter()
            .map(|(_, tx)| tx.clone())
            .collect();
        if observers.is_empty() {
            debug!("No observers for {}", event.name());
            return;
        }
        let params = event.params();
        for tx in observers {
            tx(event.name(), params.clone());
        }
    }
}
