//! Unidirectional state primitives.
//!
//! ```text
//! Action ──→ Reducer ──→ State ──→ observers
//! ```
//!
//! - **State**: immutable snapshot, replaced wholesale on every change
//! - **Action**: operation results and pushed events
//! - **Reducer**: pure function `(State, Action) -> State`

/// Marker trait for store state objects.
///
/// States should be:
/// - Immutable (Clone to create new states)
/// - Self-contained (all data an observer needs)
/// - Comparable (PartialEq for detecting changes)
pub trait StoreState: Clone + PartialEq + Default + Send + Sync + 'static {}

/// Marker trait for actions fed to a reducer.
pub trait Action: Send + 'static {}

/// Reducer transforms state based on actions.
///
/// The reducer is the only place where state transitions happen.
/// It must be a pure function: (State, Action) -> State
pub trait Reducer {
    type State: StoreState;
    type Action: Action;

    fn reduce(state: Self::State, action: Self::Action) -> Self::State;
}
