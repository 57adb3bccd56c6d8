//! Acknowledgement correlator: matches asynchronous confirmations from
//! the Recipient back to the delivery that produced them.
//!
//! Runs independently of the pipeline's cycle boundaries, concurrently
//! with other acknowledgements and with an in-flight cycle. It only ever
//! increments counters or appends error rows, so concurrency is
//! delegated to the source adapter's atomic operations.

use ledgerlink_protocol::{
    AckEnvelope, DeliveryResult, EventLogEntry, EventType, RecordKind, RetryPolicy,
};
use std::sync::Arc;
use tracing::{info, warn};

use crate::adapters::{EventLog, RecordSource};
use crate::send_policy::with_source_retry;
use crate::RunContext;

/// Processes one inbound confirmation/error report per call.
pub struct AckCorrelator {
    source: Arc<dyn RecordSource>,
    events: Arc<dyn EventLog>,
    /// Retry policy for the correlator's own source-adapter calls,
    /// keyed distinctly from the send path.
    policy: RetryPolicy,
    /// Isolated mode: the source mutation is suppressed and a synthetic
    /// zero id returned. The audit pair is still written.
    isolated: bool,
}

impl AckCorrelator {
    pub fn new(
        source: Arc<dyn RecordSource>,
        events: Arc<dyn EventLog>,
        policy: RetryPolicy,
        isolated: bool,
    ) -> Self {
        Self {
            source,
            events,
            policy,
            isolated,
        }
    }

    /// Handle one acknowledgement and return the owning file id.
    ///
    /// `SourceNotFound` and `SourceConflict` are terminal for this call
    /// and surface to the inbound caller; the Recipient's at-least-once
    /// redelivery covers them. Duplicate acks re-apply the same outcome,
    /// which the source treats as a no-op.
    ///
    /// The audit pair is written unconditionally, whatever the outcome -
    /// the event log is the one place a human checks afterwards.
    pub async fn handle_ack(
        &self,
        kind: RecordKind,
        envelope: &AckEnvelope,
    ) -> DeliveryResult<i64> {
        let run = RunContext::for_ack(kind, envelope.record_id);
        let error_text = envelope.error_text();

        let result = if self.isolated {
            info!(
                kind = %kind,
                record_id = envelope.record_id,
                "isolated mode: suppressing source mutation, returning synthetic id"
            );
            Ok(0)
        } else {
            with_source_retry(&self.policy, || {
                self.source.apply_ack(kind, envelope.record_id, error_text)
            })
            .await
        };

        // Finally-equivalent: both audit rows are written even when the
        // application failed above.
        let outcome_code = match &result {
            Ok(_) => 200,
            Err(err) => err.outcome_code(),
        };

        self.events
            .record(
                EventLogEntry::now(
                    EventType::AckReceived,
                    &run.batch_id,
                    &run.trace_id,
                    outcome_code,
                )
                .with_payload(
                    serde_json::to_string(envelope).unwrap_or_else(|_| envelope.record_id.to_string()),
                ),
            )
            .await;
        self.events
            .record(
                EventLogEntry::now(
                    EventType::AckProcessing,
                    &run.batch_id,
                    &run.trace_id,
                    outcome_code,
                )
                .with_detail(format!(
                    "{} ({})",
                    envelope.report.title, envelope.report.detail
                )),
            )
            .await;

        match &result {
            Ok(file_id) => {
                info!(
                    kind = %kind,
                    record_id = envelope.record_id,
                    file_id,
                    success = error_text.is_none(),
                    "acknowledgement applied"
                );
            }
            Err(err) => {
                warn!(
                    kind = %kind,
                    record_id = envelope.record_id,
                    error = %err,
                    "acknowledgement could not be applied"
                );
            }
        }

        result
    }
}
