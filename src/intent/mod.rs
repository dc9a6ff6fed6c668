//! Payment-intent records and lifecycle status.

mod status;
mod types;

pub use status::IntentStatus;
pub use types::{CreateIntentParams, CreateIntentRequest, PaymentIntent, PaymentType, StatusChange};
