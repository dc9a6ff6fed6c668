//! Payment-intent lifecycle status.

use serde::{Deserialize, Serialize};

/// Server-authoritative lifecycle status of a payment intent.
///
/// The happy path is `Created → PendingSignature → Signed → Broadcasting →
/// PendingConfirmation → Confirmed`. `Failed`, `Expired` and `Cancelled`
/// are reachable from any non-terminal status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IntentStatus {
    Created,
    PendingSignature,
    Signed,
    Broadcasting,
    PendingConfirmation,
    Confirmed,
    Failed,
    Expired,
    Cancelled,
}

impl IntentStatus {
    /// No further transition is expected from a terminal status.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            IntentStatus::Confirmed
                | IntentStatus::Failed
                | IntentStatus::Expired
                | IntentStatus::Cancelled
        )
    }

    /// Whether a signed transaction may still be submitted.
    pub fn is_signable(self) -> bool {
        matches!(self, IntentStatus::Created | IntentStatus::PendingSignature)
    }

    /// Position along the happy path. Failure outcomes share the last rank.
    pub fn progress_rank(self) -> u8 {
        match self {
            IntentStatus::Created => 0,
            IntentStatus::PendingSignature => 1,
            IntentStatus::Signed => 2,
            IntentStatus::Broadcasting => 3,
            IntentStatus::PendingConfirmation => 4,
            IntentStatus::Confirmed
            | IntentStatus::Failed
            | IntentStatus::Expired
            | IntentStatus::Cancelled => 5,
        }
    }

    /// Whether `self` is a legal successor of `prev`.
    ///
    /// Used only when pushed records carry no version information.
    pub fn can_follow(self, prev: IntentStatus) -> bool {
        if self == prev {
            return true;
        }
        if prev.is_terminal() {
            return false;
        }
        match self {
            IntentStatus::Failed | IntentStatus::Expired | IntentStatus::Cancelled => true,
            _ => self.progress_rank() >= prev.progress_rank(),
        }
    }

    /// Wire name, as the server spells it.
    pub fn as_str(self) -> &'static str {
        match self {
            IntentStatus::Created => "CREATED",
            IntentStatus::PendingSignature => "PENDING_SIGNATURE",
            IntentStatus::Signed => "SIGNED",
            IntentStatus::Broadcasting => "BROADCASTING",
            IntentStatus::PendingConfirmation => "PENDING_CONFIRMATION",
            IntentStatus::Confirmed => "CONFIRMED",
            IntentStatus::Failed => "FAILED",
            IntentStatus::Expired => "EXPIRED",
            IntentStatus::Cancelled => "CANCELLED",
        }
    }
}

impl std::fmt::Display for IntentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_statuses() {
        assert!(IntentStatus::Confirmed.is_terminal());
        assert!(IntentStatus::Failed.is_terminal());
        assert!(IntentStatus::Expired.is_terminal());
        assert!(IntentStatus::Cancelled.is_terminal());
        assert!(!IntentStatus::Created.is_terminal());
        assert!(!IntentStatus::PendingConfirmation.is_terminal());
    }

    #[test]
    fn only_unsigned_statuses_accept_a_transaction() {
        assert!(IntentStatus::Created.is_signable());
        assert!(IntentStatus::PendingSignature.is_signable());
        assert!(!IntentStatus::Signed.is_signable());
        assert!(!IntentStatus::Broadcasting.is_signable());
        assert!(!IntentStatus::Expired.is_signable());
    }

    #[test]
    fn progress_is_monotonic() {
        assert!(IntentStatus::Signed.can_follow(IntentStatus::Created));
        assert!(IntentStatus::Confirmed.can_follow(IntentStatus::PendingConfirmation));
        assert!(!IntentStatus::Signed.can_follow(IntentStatus::Broadcasting));
        assert!(!IntentStatus::Created.can_follow(IntentStatus::PendingSignature));
    }

    #[test]
    fn failure_outcomes_reachable_from_any_open_status() {
        for prev in [
            IntentStatus::Created,
            IntentStatus::Signed,
            IntentStatus::PendingConfirmation,
        ] {
            assert!(IntentStatus::Cancelled.can_follow(prev));
            assert!(IntentStatus::Failed.can_follow(prev));
            assert!(IntentStatus::Expired.can_follow(prev));
        }
    }

    #[test]
    fn terminal_statuses_are_final() {
        assert!(!IntentStatus::Cancelled.can_follow(IntentStatus::Confirmed));
        assert!(!IntentStatus::PendingConfirmation.can_follow(IntentStatus::Failed));
        assert!(IntentStatus::Confirmed.can_follow(IntentStatus::Confirmed));
    }

    #[test]
    fn serde_uses_wire_names() {
        let json = serde_json::to_string(&IntentStatus::PendingConfirmation).unwrap();
        assert_eq!(json, "\"PENDING_CONFIRMATION\"");
        let parsed: IntentStatus = serde_json::from_str("\"CANCELLED\"").unwrap();
        assert_eq!(parsed, IntentStatus::Cancelled);
        assert_eq!(IntentStatus::Signed.to_string(), "SIGNED");
    }
}
