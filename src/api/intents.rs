//! Payment-intent REST endpoints.

use serde::{Deserialize, Serialize};

use crate::api::client::ApiClient;
use crate::api::error::ApiError;
use crate::intent::{CreateIntentRequest, PaymentIntent};

const RESOURCE: &str = "payment-intents";

/// `{ "data": ... }` response envelope.
#[derive(Debug, Deserialize)]
pub struct DataEnvelope<T> {
    pub data: T,
}

/// Response of `POST /payment-intents/{id}/submit`.
#[derive(Debug, Deserialize)]
pub struct SubmitResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub data: Option<PaymentIntent>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SubmitRequest<'a> {
    signed_tx: &'a str,
}

#[derive(Debug, Serialize)]
struct CancelRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<&'a str>,
}

/// Typed wrapper over the four payment-intent endpoints.
#[derive(Clone)]
pub struct IntentsApi {
    client: ApiClient,
}

impl IntentsApi {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    /// `GET /payment-intents/{id}`
    pub async fn fetch(&self, id: &str) -> Result<PaymentIntent, ApiError> {
        let envelope: DataEnvelope<PaymentIntent> = self.client.get(&[RESOURCE, id]).await?;
        Ok(envelope.data)
    }

    /// `POST /payment-intents`
    pub async fn create(&self, request: &CreateIntentRequest) -> Result<PaymentIntent, ApiError> {
        let envelope: DataEnvelope<PaymentIntent> = self.client.post(&[RESOURCE], request).await?;
        Ok(envelope.data)
    }

    /// `POST /payment-intents/{id}/submit`
    ///
    /// A 2xx answer with `success: false` is a server-side rejection; its
    /// `error` text is returned verbatim.
    pub async fn submit(&self, id: &str, signed_tx: &str) -> Result<PaymentIntent, ApiError> {
        let response: SubmitResponse = self
            .client
            .post(&[RESOURCE, id, "submit"], &SubmitRequest { signed_tx })
            .await?;

        match response {
            SubmitResponse {
                success: true,
                data: Some(intent),
                ..
            } => Ok(intent),
            SubmitResponse { success: true, .. } => Err(ApiError::Rejected(
                "Transaction submission returned no intent".to_string(),
            )),
            SubmitResponse { error, .. } => Err(ApiError::Rejected(
                error
                    .filter(|e| !e.is_empty())
                    .unwrap_or_else(|| "Transaction submission failed".to_string()),
            )),
        }
    }

    /// `PATCH /payment-intents/{id}/cancel`
    pub async fn cancel(&self, id: &str, reason: Option<&str>) -> Result<PaymentIntent, ApiError> {
        let envelope: DataEnvelope<PaymentIntent> = self
            .client
            .patch(&[RESOURCE, id, "cancel"], &CancelRequest { reason })
            .await?;
        Ok(envelope.data)
    }
}
