//! HTTP transport for webhook deliveries

use async_trait::async_trait;
use std::time::Duration;

use super::WebhookEnvelope;

/// A single failed delivery attempt
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("Webhook responded with status {0}")]
    Status(u16),

    #[error("Webhook timed out")]
    Timeout,

    #[error("Webhook request failed: {0}")]
    Request(String),
}

/// Performs one POST of an envelope; retries are the dispatcher's job
#[async_trait]
pub trait WebhookTransport: Send + Sync {
    async fn post(&self, url: &str, envelope: &WebhookEnvelope) -> Result<(), DeliveryError>;
}

/// reqwest-backed transport with a per-request timeout
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Build a transport whose requests give up after `timeout`
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("relay-gateway/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl WebhookTransport for ReqwestTransport {
    async fn post(&self, url: &str, envelope: &WebhookEnvelope) -> Result<(), DeliveryError> {
        let response = self
            .client
            .post(url)
            .json(envelope)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    DeliveryError::Timeout
                } else {
                    DeliveryError::Request(e.to_string())
                }
            })?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(DeliveryError::Status(status.as_u16()))
        }
    }
}
