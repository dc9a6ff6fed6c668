//! Thread-safe holder of the tracked intent.
//!
//! Every change goes through [`IntentStore::dispatch`], which runs the
//! reducer under the write lock, publishes the new snapshot to watchers
//! and records status transitions.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tokio::sync::watch;

use crate::intent::{IntentStatus, PaymentIntent};
use crate::store::action::StoreAction;
use crate::store::mvi::{Reducer, StoreState};
use crate::store::reducer::IntentReducer;

/// Observable view of the tracked intent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IntentState {
    /// Last accepted record, if any.
    pub record: Option<PaymentIntent>,
    /// An operation is in flight.
    pub loading: bool,
    /// Message of the last failed operation.
    pub error: Option<String>,
}

impl StoreState for IntentState {}

impl IntentState {
    pub fn status(&self) -> Option<IntentStatus> {
        self.record.as_ref().map(|r| r.status)
    }

    pub fn intent_id(&self) -> Option<&str> {
        self.record.as_ref().map(|r| r.id.as_str())
    }
}

/// Log entry for a status transition of the held record.
#[derive(Debug, Clone)]
pub struct TransitionLogEntry {
    pub timestamp: DateTime<Utc>,
    pub intent_id: String,
    /// Previous status of the same intent (None when a record was first held).
    pub from: Option<IntentStatus>,
    pub to: IntentStatus,
}

/// Outcome of a single dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dispatch {
    /// The state differs from before the dispatch.
    pub changed: bool,
    pub previous_status: Option<IntentStatus>,
    pub status: Option<IntentStatus>,
}

impl Dispatch {
    pub fn status_changed(&self) -> bool {
        self.previous_status != self.status
    }
}

#[derive(Clone)]
pub struct IntentStore {
    inner: Arc<RwLock<IntentStoreInner>>,
}

struct IntentStoreInner {
    state: IntentState,
    watch: watch::Sender<IntentState>,
    transitions: Vec<TransitionLogEntry>,
}

impl IntentStore {
    pub fn new() -> Self {
        let (watch, _) = watch::channel(IntentState::default());
        Self {
            inner: Arc::new(RwLock::new(IntentStoreInner {
                state: IntentState::default(),
                watch,
                transitions: Vec::new(),
            })),
        }
    }

    /// Apply an action and publish the result.
    pub fn dispatch(&self, action: StoreAction) -> Dispatch {
        let mut inner = self.inner.write();
        let previous = inner.state.clone();
        let next = IntentReducer::reduce(previous.clone(), action);

        let outcome = Dispatch {
            changed: next != previous,
            previous_status: previous.status(),
            status: next.status(),
        };
        if !outcome.changed {
            return outcome;
        }

        if let Some(record) = &next.record {
            let same_intent = previous.intent_id() == Some(record.id.as_str());
            let from = if same_intent { previous.status() } else { None };
            if from != Some(record.status) {
                tracing::info!(
                    intent_id = %record.id,
                    from = from.map(IntentStatus::as_str).unwrap_or("-"),
                    to = %record.status,
                    "Intent status changed"
                );
                inner.transitions.push(TransitionLogEntry {
                    timestamp: Utc::now(),
                    intent_id: record.id.clone(),
                    from,
                    to: record.status,
                });
            }
        }

        inner.state = next.clone();
        inner.watch.send_replace(next);
        outcome
    }

    pub fn snapshot(&self) -> IntentState {
        self.inner.read().state.clone()
    }

    pub fn record(&self) -> Option<PaymentIntent> {
        self.inner.read().state.record.clone()
    }

    /// Receive every published snapshot.
    pub fn subscribe(&self) -> watch::Receiver<IntentState> {
        self.inner.read().watch.subscribe()
    }

    /// History of status transitions, oldest first.
    pub fn transitions(&self) -> Vec<TransitionLogEntry> {
        self.inner.read().transitions.clone()
    }
}

impl Default for IntentStore {
    fn default() -> Self {
        Self::new()
    }
}
