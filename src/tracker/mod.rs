//! Lifecycle controller for a single payment intent.

mod controller;
mod error;

pub use controller::PaymentIntentTracker;
pub use error::TrackerError;
