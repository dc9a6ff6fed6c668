use crate::intent::PaymentIntent;
use crate::store::action::StoreAction;
use crate::store::mvi::Reducer;
use crate::store::state::IntentState;

/// Reducer for the tracked intent.
///
/// Pure function; notifications and subscriptions are handled by the
/// caller around the dispatch.
pub struct IntentReducer;

impl Reducer for IntentReducer {
    type State = IntentState;
    type Action = StoreAction;

    fn reduce(state: Self::State, action: Self::Action) -> Self::State {
        match action {
            StoreAction::Begin => IntentState {
                loading: true,
                error: None,
                ..state
            },

            StoreAction::Replace(record) => IntentState {
                record: Some(record),
                loading: false,
                error: None,
            },

            StoreAction::Apply(record) => IntentState {
                record: accept(state.record, record),
                loading: false,
                error: None,
            },

            StoreAction::Push(record) => IntentState {
                record: accept(state.record, record),
                ..state
            },

            StoreAction::PushStatus { intent_id, status } => {
                let record = state.record.map(|mut held| {
                    if held.id == intent_id && status.can_follow(held.status) {
                        held.status = status;
                        held.is_terminal = status.is_terminal();
                    }
                    held
                });
                IntentState { record, ..state }
            }

            StoreAction::Fail(message) => IntentState {
                loading: false,
                error: Some(message),
                ..state
            },

            StoreAction::Reset => IntentState::default(),
        }
    }
}

/// Nothing held: take the record. Otherwise it must supersede the held one.
fn accept(held: Option<PaymentIntent>, incoming: PaymentIntent) -> Option<PaymentIntent> {
    match held {
        None => Some(incoming),
        Some(current) if incoming.supersedes(&current) => Some(incoming),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intent::IntentStatus;

    fn intent(id: &str, status: IntentStatus) -> PaymentIntent {
        PaymentIntent {
            id: id.to_string(),
            user_id: None,
            reference: None,
            chain: "arbitrum".to_string(),
            from_address: "0xdef".to_string(),
            to_address: "0xabc".to_string(),
            amount: "10".to_string(),
            token_address: None,
            token_symbol: Some("USDT".to_string()),
            status,
            tx_hash: None,
            confirmations: None,
            error_message: None,
            is_terminal: status.is_terminal(),
            can_retry: false,
            created_at: "2026-10-18T10:00:00Z".parse().unwrap(),
            expires_at: "2026-10-18T10:30:00Z".parse().unwrap(),
            updated_at: None,
            version: None,
        }
    }

    fn holding(record: PaymentIntent) -> IntentState {
        IntentState {
            record: Some(record),
            loading: false,
            error: None,
        }
    }

    #[test]
    fn begin_sets_loading_and_clears_error() {
        let state = IntentState {
            error: Some("old".to_string()),
            ..IntentState::default()
        };
        let new = IntentReducer::reduce(state, StoreAction::Begin);
        assert!(new.loading);
        assert!(new.error.is_none());
    }

    #[test]
    fn replace_switches_record() {
        let state = holding(intent("pi_1", IntentStatus::Confirmed));
        let new = IntentReducer::reduce(
            state,
            StoreAction::Replace(intent("pi_2", IntentStatus::Created)),
        );
        assert_eq!(new.record.unwrap().id, "pi_2");
    }

    #[test]
    fn apply_ignores_other_intents() {
        let state = IntentState {
            loading: true,
            ..holding(intent("pi_1", IntentStatus::Created))
        };
        let new = IntentReducer::reduce(
            state,
            StoreAction::Apply(intent("pi_2", IntentStatus::Cancelled)),
        );
        assert_eq!(new.record.as_ref().unwrap().id, "pi_1");
        assert!(!new.loading);
    }

    #[test]
    fn push_into_empty_store_is_adopted() {
        let new = IntentReducer::reduce(
            IntentState::default(),
            StoreAction::Push(intent("pi_1", IntentStatus::Signed)),
        );
        assert_eq!(new.status(), Some(IntentStatus::Signed));
    }

    #[test]
    fn push_keeps_loading_and_rejects_stale() {
        let mut held = intent("pi_1", IntentStatus::Broadcasting);
        held.version = Some(3);
        let state = IntentState {
            loading: true,
            ..holding(held)
        };

        let mut stale = intent("pi_1", IntentStatus::Signed);
        stale.version = Some(2);
        let new = IntentReducer::reduce(state.clone(), StoreAction::Push(stale));
        assert_eq!(new, state);

        let mut fresh = intent("pi_1", IntentStatus::PendingConfirmation);
        fresh.version = Some(4);
        let new = IntentReducer::reduce(state, StoreAction::Push(fresh));
        assert_eq!(new.record.unwrap().status, IntentStatus::PendingConfirmation);
        assert!(new.loading);
    }

    #[test]
    fn push_status_merges_onto_held_record() {
        let state = holding(intent("pi_1", IntentStatus::PendingConfirmation));
        let new = IntentReducer::reduce(
            state,
            StoreAction::PushStatus {
                intent_id: "pi_1".to_string(),
                status: IntentStatus::Confirmed,
            },
        );
        let record = new.record.unwrap();
        assert_eq!(record.status, IntentStatus::Confirmed);
        assert!(record.is_terminal);
        assert_eq!(record.amount, "10");
    }

    #[test]
    fn push_status_respects_order_and_identity() {
        let state = holding(intent("pi_1", IntentStatus::Confirmed));
        let regress = IntentReducer::reduce(
            state.clone(),
            StoreAction::PushStatus {
                intent_id: "pi_1".to_string(),
                status: IntentStatus::Broadcasting,
            },
        );
        assert_eq!(regress, state);

        let foreign = IntentReducer::reduce(
            state.clone(),
            StoreAction::PushStatus {
                intent_id: "pi_9".to_string(),
                status: IntentStatus::Failed,
            },
        );
        assert_eq!(foreign, state);
    }

    #[test]
    fn fail_keeps_record() {
        let state = IntentState {
            loading: true,
            ..holding(intent("pi_1", IntentStatus::Created))
        };
        let new = IntentReducer::reduce(state, StoreAction::Fail("Nonce too low".to_string()));
        assert_eq!(new.record.unwrap().status, IntentStatus::Created);
        assert_eq!(new.error.as_deref(), Some("Nonce too low"));
        assert!(!new.loading);
    }

    #[test]
    fn reset_clears_everything() {
        let state = holding(intent("pi_1", IntentStatus::Created));
        assert_eq!(
            IntentReducer::reduce(state, StoreAction::Reset),
            IntentState::default()
        );
    }
}
