use std::time::Duration;

use reqwest::header::AUTHORIZATION;
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::time::timeout;
use url::Url;
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::config::{bearer_header, ApiConfig, SecureString};

/// Header carrying a per-request correlation id.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Authenticated JSON client for the payment API.
///
/// Cheap to clone; clones share the underlying connection pool.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: Url,
    token: Option<SecureString>,
    request_timeout: Duration,
}

impl ApiClient {
    pub fn new(config: &ApiConfig, token: Option<SecureString>) -> Result<Self, ApiError> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| ApiError::InvalidUrl(format!("{}: {}", config.base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(ApiError::InvalidUrl(config.base_url.clone()));
        }

        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_seconds as u64))
            .build()
            .map_err(|e| ApiError::Transport {
                url: config.base_url.clone(),
                source: e,
            })?;

        Ok(Self {
            client,
            base_url,
            token,
            request_timeout: Duration::from_secs(config.timeout_seconds as u64),
        })
    }

    pub async fn get<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<T, ApiError> {
        self.send(Method::GET, segments, None::<&()>).await
    }

    pub async fn post<B, T>(&self, segments: &[&str], body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send(Method::POST, segments, Some(body)).await
    }

    pub async fn patch<B, T>(&self, segments: &[&str], body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send(Method::PATCH, segments, Some(body)).await
    }

    /// Resolve path segments against the base URL, escaping each segment.
    pub fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn send<B, T>(
        &self,
        method: Method,
        segments: &[&str],
        body: Option<&B>,
    ) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let token = self.token.as_ref().ok_or(ApiError::MissingCredential)?;
        let url = self.endpoint(segments)?;
        let request_id = Uuid::new_v4().to_string();

        tracing::debug!(
            method = %method,
            url = %url,
            request_id = %request_id,
            "Sending API request"
        );

        let mut builder = self
            .client
            .request(method.clone(), url.clone())
            .header(AUTHORIZATION, bearer_header(token))
            .header(REQUEST_ID_HEADER, &request_id);

        if let Some(body) = body {
            builder = builder.json(body);
        }

        let result = timeout(self.request_timeout, self.execute::<T>(builder, &url)).await;

        let outcome = match result {
            Ok(outcome) => outcome,
            Err(_) => Err(ApiError::Timeout {
                duration: self.request_timeout.as_secs(),
            }),
        };

        if let Err(ref e) = outcome {
            tracing::warn!(
                method = %method,
                url = %url,
                request_id = %request_id,
                error_type = e.error_type(),
                error = %e,
                "API request failed"
            );
        }
        outcome
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        builder: reqwest::RequestBuilder,
        url: &Url,
    ) -> Result<T, ApiError> {
        let transport = |source: reqwest::Error| ApiError::Transport {
            url: url.to_string(),
            source,
        };

        // Body serialization errors surface from `send` as builder errors.
        let response = builder.send().await.map_err(|source| {
            if source.is_builder() {
                ApiError::Encode {
                    url: url.to_string(),
                    message: source.to_string(),
                }
            } else {
                transport(source)
            }
        })?;
        let status = response.status();
        let bytes = response.bytes().await.map_err(transport)?;

        if !status.is_success() {
            return Err(ApiError::from_status(status, &bytes));
        }

        serde_json::from_slice(&bytes).map_err(|e| ApiError::Decode {
            url: url.to_string(),
            message: e.to_string(),
        })
    }
}
