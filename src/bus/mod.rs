//! Event bus for change notification
//!
//! Keeps a registry of live session mailboxes. Publishing a subsystem marks
//! it pending in every mailbox and wakes any session idling on it. Pending
//! subsystems are a set, so repeated publishes coalesce until collected.

mod events;

pub use events::{ParseSubsystemError, Subsystem};

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use tokio::sync::Notify;

/// Identifies one connected session in the registry
pub type SessionId = u64;

/// Per-session event mailbox
#[derive(Debug, Default)]
pub struct Mailbox {
    pending: Mutex<BTreeSet<Subsystem>>,
    notify: Notify,
}

impl Mailbox {
    fn pending(&self) -> MutexGuard<'_, BTreeSet<Subsystem>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn post(&self, subsystem: Subsystem) {
        self.pending().insert(subsystem);
        self.notify.notify_one();
    }

    /// Remove and return the pending subsystems that are in `subscriptions`.
    ///
    /// Pending events outside the subscription set stay pending.
    pub fn take_matching(&self, subscriptions: &BTreeSet<Subsystem>) -> Vec<Subsystem> {
        let mut pending = self.pending();
        let matched: Vec<Subsystem> = pending.intersection(subscriptions).copied().collect();
        for subsystem in &matched {
            pending.remove(subsystem);
        }
        matched
    }

    /// Snapshot of pending subsystems
    pub fn pending_snapshot(&self) -> BTreeSet<Subsystem> {
        self.pending().clone()
    }

    /// Wait until something is posted to this mailbox.
    ///
    /// A post that happened before the call completes the wait immediately.
    pub async fn notified(&self) {
        self.notify.notified().await;
    }
}

/// Event bus handle for publishing subsystem changes
#[derive(Default)]
pub struct EventBus {
    sessions: RwLock<HashMap<SessionId, Arc<Mailbox>>>,
    next_id: AtomicU64,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new session and return its id and mailbox
    pub fn register(&self) -> (SessionId, Arc<Mailbox>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let mailbox = Arc::new(Mailbox::default());
        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, mailbox.clone());
        tracing::debug!("Session {} registered on event bus", id);
        (id, mailbox)
    }

    /// Remove a session; it receives no further events
    pub fn unregister(&self, id: SessionId) {
        let removed = self
            .sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);
        if removed.is_some() {
            tracing::debug!("Session {} removed from event bus", id);
        }
    }

    /// Publish a change to every live session
    pub fn publish(&self, subsystem: Subsystem) {
        let sessions = self.sessions.read().unwrap_or_else(PoisonError::into_inner);
        tracing::trace!("Publishing {} to {} sessions", subsystem, sessions.len());
        for mailbox in sessions.values() {
            mailbox.post(subsystem);
        }
    }

    /// Get the number of live sessions
    pub fn subscriber_count(&self) -> usize {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// Shared event bus wrapped in Arc for thread-safe sharing
pub type SharedBus = Arc<EventBus>;

/// Create a new shared event bus
pub fn create_bus() -> SharedBus {
    Arc::new(EventBus::new())
}
