//! Single source of truth for the tracked payment intent.

mod action;
mod mvi;
mod reducer;
mod state;

pub use action::StoreAction;
pub use mvi::{Action, Reducer, StoreState};
pub use reducer::IntentReducer;
pub use state::{Dispatch, IntentState, IntentStore, TransitionLogEntry};
