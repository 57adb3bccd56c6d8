//! Outbound send policy: bounded retries with backoff around exactly one
//! Recipient submission.
//!
//! Transient failures (network/5xx-equivalent, including timeouts) are
//! retried per the configured policy; explicit rejection is permanent for
//! the cycle and the record stays in its pre-send status. Every attempt
//! is mirrored into the event log with the record id and outcome code.

use ledgerlink_protocol::{
    CaseRecord, DeliveryResult, EventLogEntry, EventType, RetryPolicy,
};
use std::future::Future;
use tracing::{debug, info, warn};

use crate::adapters::{EventLog, Recipient};
use crate::RunContext;

/// Wraps a single submission with retry/backoff and failure
/// classification. One instance per record kind, configured.
pub struct SendPolicy {
    policy: RetryPolicy,
    /// Isolated mode: no network call is made, the policy synthesizes a
    /// success locally. Explicit and audited as such.
    isolated: bool,
}

impl SendPolicy {
    pub fn new(policy: RetryPolicy, isolated: bool) -> Self {
        Self { policy, isolated }
    }

    pub async fn submit(
        &self,
        recipient: &dyn Recipient,
        events: &dyn EventLog,
        run: &RunContext,
        record: &CaseRecord,
        payload: &str,
    ) -> DeliveryResult<()> {
        if self.isolated {
            info!(
                record_id = record.id,
                kind = %record.kind,
                policy = %self.policy.name,
                "isolated mode: synthesizing local success, no outbound call"
            );
            events
                .record(
                    EventLogEntry::now(
                        EventType::SendSucceeded,
                        &run.batch_id,
                        &run.trace_id,
                        200,
                    )
                    .with_payload(record.id.to_string())
                    .with_detail(format!("isolated mode ({})", self.policy.name)),
                )
                .await;
            return Ok(());
        }

        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match recipient
                .submit(record.kind, record.id, &record.case_id, payload)
                .await
            {
                Ok(()) => {
                    debug!(record_id = record.id, attempt, "submission accepted");
                    events
                        .record(
                            EventLogEntry::now(
                                EventType::SendSucceeded,
                                &run.batch_id,
                                &run.trace_id,
                                200,
                            )
                            .with_payload(record.id.to_string()),
                        )
                        .await;
                    return Ok(());
                }
                Err(err) if err.is_transient() && self.policy.allows_retry(attempt) => {
                    let delay = self.policy.delay_for(attempt);
                    warn!(
                        record_id = record.id,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "transient submission failure, backing off"
                    );
                    events
                        .record(
                            EventLogEntry::now(
                                EventType::SendAttempt,
                                &run.batch_id,
                                &run.trace_id,
                                err.outcome_code(),
                            )
                            .with_payload(record.id.to_string())
                            .with_detail(err.to_string()),
                        )
                        .await;
                    tokio::time::sleep(delay).await;
                }
                Err(err) => {
                    warn!(
                        record_id = record.id,
                        attempt,
                        error = %err,
                        "submission failed for this cycle"
                    );
                    events
                        .record(
                            EventLogEntry::now(
                                EventType::SendFailed,
                                &run.batch_id,
                                &run.trace_id,
                                err.outcome_code(),
                            )
                            .with_payload(record.id.to_string())
                            .with_detail(err.to_string()),
                        )
                        .await;
                    return Err(err);
                }
            }
        }
    }
}

/// Bounded retry around a source-adapter call. The acknowledgement path
/// uses this with its own policy name; only transient failures re-run
/// the operation.
pub async fn with_source_retry<T, F, Fut>(policy: &RetryPolicy, mut op: F) -> DeliveryResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = DeliveryResult<T>>,
{
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() && policy.allows_retry(attempt) => {
                let delay = policy.delay_for(attempt);
                warn!(
                    policy = %policy.name,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "transient source failure, backing off"
                );
                tokio::time::sleep(delay).await;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledgerlink_protocol::DeliveryError;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            name: "test".to_string(),
            max_attempts,
            base_delay_ms: 1,
            max_delay_ms: 2,
            jitter_ms: 0,
        }
    }

    #[tokio::test]
    async fn test_source_retry_recovers_from_transient() {
        let calls = AtomicU32::new(0);
        let result = with_source_retry(&fast_policy(3), || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(DeliveryError::transient("blip"))
                } else {
                    Ok(42)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_source_retry_gives_up_after_budget() {
        let calls = AtomicU32::new(0);
        let result: DeliveryResult<()> = with_source_retry(&fast_policy(2), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(DeliveryError::transient("still down")) }
        })
        .await;
        assert!(result.unwrap_err().is_transient());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_source_retry_never_retries_permanent() {
        let calls = AtomicU32::new(0);
        let result: DeliveryResult<()> = with_source_retry(&fast_policy(5), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(DeliveryError::not_found("record 9")) }
        })
        .await;
        assert!(matches!(
            result.unwrap_err(),
            DeliveryError::SourceNotFound(_)
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
