//! HTTP transport to the Recipient.
//!
//! One POST per record. Classification: explicit rejection (4xx) is
//! permanent for the cycle, server trouble (5xx) and transport errors
//! including timeouts are transient and eligible for the send policy's
//! bounded retry.

use async_trait::async_trait;
use ledgerlink_protocol::{DeliveryError, DeliveryResult, RecordKind};
use std::time::Duration;
use tracing::debug;

use crate::adapters::Recipient;

pub struct HttpRecipient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpRecipient {
    /// Build a client with the configured per-call timeout. A timeout is
    /// treated as a transient failure by classification below.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> DeliveryResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DeliveryError::transient(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }
}

#[async_trait]
impl Recipient for HttpRecipient {
    async fn submit(
        &self,
        kind: RecordKind,
        record_id: i64,
        case_id: &str,
        payload: &str,
    ) -> DeliveryResult<()> {
        let url = format!(
            "{}/records/{}/{}",
            self.base_url.trim_end_matches('/'),
            kind.as_str(),
            record_id
        );

        debug!(%url, case_id, "submitting record to recipient");

        let response = self
            .client
            .post(&url)
            .header("content-type", "application/json")
            .header("x-case-id", case_id)
            .body(payload.to_string())
            .send()
            .await
            .map_err(|e| DeliveryError::transient(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        let detail = format!("recipient returned {} for record {}: {}", status, record_id, body);

        if status.is_client_error() {
            Err(DeliveryError::rejected(detail))
        } else {
            Err(DeliveryError::transient(detail))
        }
    }
}
