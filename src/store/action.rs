use crate::intent::{IntentStatus, PaymentIntent};
use crate::store::mvi::Action;

/// Everything that may change the intent store.
#[derive(Debug, Clone)]
pub enum StoreAction {
    /// An operation started.
    Begin,
    /// Make this record the current one (create, fetch).
    Replace(PaymentIntent),
    /// Operation result for an intent (submit, cancel). When a record is
    /// held, ignored unless it is for that intent and at least as fresh.
    Apply(PaymentIntent),
    /// Pushed full record. Same rule as `Apply`; loading/error untouched.
    Push(PaymentIntent),
    /// Pushed status without a record, merged onto the held record.
    PushStatus {
        intent_id: String,
        status: IntentStatus,
    },
    /// An operation failed. The held record stays.
    Fail(String),
    /// Forget everything (tracked identifier changed).
    Reset,
}

impl Action for StoreAction {}
