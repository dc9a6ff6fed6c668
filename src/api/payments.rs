//! Off-ramp payment initiation: crypto in, bank payout out.
//!
//! The server resolves the destination bank account and returns a
//! reference; once the on-chain escrow deposit is made, the reference is
//! confirmed together with the escrow id and transaction hash.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::api::client::ApiClient;
use crate::api::error::ApiError;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitiatePayment {
    pub account_number: String,
    pub account_bank: String,
    pub amount: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub narration: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Token symbol funding the payout.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chain: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmPayment {
    pub reference: String,
    pub onchain_escrow_id: String,
    pub tx_hash: String,
}

/// Server answer for both initiation and confirmation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentReceipt {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub reference: String,
    #[serde(default)]
    pub amount: Option<Decimal>,
    #[serde(default)]
    pub message: String,
}

#[derive(Clone)]
pub struct PaymentsApi {
    client: ApiClient,
}

impl PaymentsApi {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    /// `POST /payments/initiate-payment-intent`
    pub async fn initiate(&self, request: &InitiatePayment) -> Result<PaymentReceipt, ApiError> {
        let receipt: PaymentReceipt = self
            .client
            .post(&["payments", "initiate-payment-intent"], request)
            .await?;
        accept(receipt, "Could not resolve account details")
    }

    /// `POST /payments/confirm-payment-intent`
    pub async fn confirm(&self, request: &ConfirmPayment) -> Result<PaymentReceipt, ApiError> {
        let receipt: PaymentReceipt = self
            .client
            .post(&["payments", "confirm-payment-intent"], request)
            .await?;
        accept(receipt, "Could not confirm payment")
    }
}

fn accept(receipt: PaymentReceipt, fallback: &str) -> Result<PaymentReceipt, ApiError> {
    if receipt.success {
        tracing::info!(reference = %receipt.reference, "Payment accepted");
        Ok(receipt)
    } else {
        Err(ApiError::Rejected(fallback.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn initiate_serializes_amount_as_number() {
        let request = InitiatePayment {
            account_number: "0123456789".to_string(),
            account_bank: "058".to_string(),
            amount: Decimal::from_str("2500.50").unwrap(),
            narration: None,
            category: Some("bills".to_string()),
            token: Some("USDT".to_string()),
            chain: None,
        };
        let body = serde_json::to_value(&request).unwrap();
        assert_eq!(body["accountNumber"], "0123456789");
        assert_eq!(body["amount"].as_f64(), Some(2500.5));
        assert!(body.get("narration").is_none());
        assert!(body.get("chain").is_none());
    }

    #[test]
    fn unsuccessful_receipt_is_rejected() {
        let receipt = PaymentReceipt {
            success: false,
            reference: String::new(),
            amount: None,
            message: "bank offline".to_string(),
        };
        let err = accept(receipt, "Could not confirm payment").unwrap_err();
        assert_eq!(err.to_string(), "Could not confirm payment");
    }
}
