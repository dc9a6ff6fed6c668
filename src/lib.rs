//! Client for a payment-intent backend.
//!
//! A [`tracker::PaymentIntentTracker`] creates, submits and cancels
//! payment intents over REST and mirrors server-pushed status changes
//! into an observable [`store::IntentStore`]. Pushed events arrive on one
//! process-wide, authenticated [`transport::EventChannel`].

pub mod api;
pub mod cancel;
pub mod config;
pub mod intent;
pub mod logging;
pub mod notify;
pub mod store;
pub mod tracker;
pub mod transport;
