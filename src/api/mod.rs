//! REST client for the payment backend.

mod client;
mod error;
mod intents;
mod payments;

pub use client::{ApiClient, REQUEST_ID_HEADER};
pub use error::ApiError;
pub use intents::{DataEnvelope, IntentsApi, SubmitResponse};
pub use payments::{ConfirmPayment, InitiatePayment, PaymentReceipt, PaymentsApi};
