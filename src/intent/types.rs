use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::status::IntentStatus;

/// Server-tracked record of a single requested blockchain payment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentIntent {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    pub chain: String,
    pub from_address: String,
    pub to_address: String,
    /// Decimal amount in token units, as sent by the server.
    pub amount: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_symbol: Option<String>,
    pub status: IntentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirmations: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default)]
    pub is_terminal: bool,
    #[serde(default)]
    pub can_retry: bool,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    /// Monotonic record version, when the server provides one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u64>,
}

impl PaymentIntent {
    /// True once `expires_at` has passed without the intent settling.
    pub fn is_past_deadline(&self, now: DateTime<Utc>) -> bool {
        !self.status.is_terminal() && now >= self.expires_at
    }

    /// Whether this record may replace `current` for the same intent.
    ///
    /// Versions win over timestamps; timestamps win over status ordering.
    /// Equal versions or timestamps are accepted so that re-deliveries
    /// stay idempotent.
    pub fn supersedes(&self, current: &PaymentIntent) -> bool {
        if self.id != current.id {
            return false;
        }
        if let (Some(incoming), Some(held)) = (self.version, current.version) {
            return incoming >= held;
        }
        if let (Some(incoming), Some(held)) = (self.updated_at, current.updated_at) {
            return incoming >= held;
        }
        self.status.can_follow(current.status)
    }
}

/// Whether the payment moves a token contract or the chain's native asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentType {
    Native,
    Token,
}

/// Caller-supplied parameters for a new payment intent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateIntentParams {
    pub chain: String,
    pub from_address: String,
    pub to_address: String,
    pub amount: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_symbol: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
}

impl CreateIntentParams {
    pub fn payment_type(&self) -> PaymentType {
        if self.token_address.is_some() {
            PaymentType::Token
        } else {
            PaymentType::Native
        }
    }
}

/// Body of `POST /payment-intents`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateIntentRequest {
    #[serde(flatten)]
    pub params: CreateIntentParams,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub payment_type: PaymentType,
}

impl CreateIntentRequest {
    pub fn new(params: CreateIntentParams, user_id: Option<String>) -> Self {
        let payment_type = params.payment_type();
        Self {
            params,
            user_id,
            payment_type,
        }
    }
}

/// Payload of a pushed `status.changed` event.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusChange {
    pub intent_id: String,
    pub from_status: Option<IntentStatus>,
    pub to_status: Option<IntentStatus>,
    /// Full updated record, when the server sent one.
    pub record: Option<PaymentIntent>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawStatusChange {
    #[serde(default)]
    intent_id: Option<String>,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    from_status: Option<IntentStatus>,
    #[serde(default)]
    to_status: Option<IntentStatus>,
    #[serde(default)]
    intent: Option<PaymentIntent>,
}

impl StatusChange {
    /// Decode a `status.changed` payload.
    ///
    /// The record is taken from the nested `intent` field, or from the
    /// payload itself when it is a complete record. Returns `None` when
    /// the payload names no intent.
    pub fn from_payload(payload: Value) -> Result<Option<Self>, serde_json::Error> {
        let raw: RawStatusChange = serde_json::from_value(payload.clone())?;
        let record = match raw.intent {
            Some(record) => Some(record),
            None => serde_json::from_value::<PaymentIntent>(payload).ok(),
        };

        let intent_id = raw
            .intent_id
            .or(raw.id)
            .or_else(|| record.as_ref().map(|r| r.id.clone()));

        Ok(intent_id.map(|intent_id| StatusChange {
            intent_id,
            from_status: raw.from_status,
            to_status: raw.to_status,
            record,
        }))
    }

    /// Status the intent moved to.
    pub fn status(&self) -> Option<IntentStatus> {
        self.to_status
            .or_else(|| self.record.as_ref().map(|r| r.status))
    }
}
