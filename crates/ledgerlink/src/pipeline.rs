//! Delivery pipeline: one batch cycle per record kind.
//!
//! Strictly ordered: global update (FinalCost only), selection,
//! sequential per-record submission, aggregate commit. Records are
//! submitted one-by-one so the succeeded ordering is deterministic and a
//! slow Recipient cannot produce concurrent writers to the same file.
//! A delivery file is only ever created when at least one record is
//! going out.

use chrono::Utc;
use ledgerlink_protocol::{
    CaseRecord, CycleReport, DeliveryResult, EventLogEntry, EventType, RecordKind, RetryPolicy,
};
use std::sync::Arc;
use tracing::{info, warn};

use crate::adapters::{EventLog, RecordSource, Recipient};
use crate::codec::PayloadCodec;
use crate::file_ledger::FileLedger;
use crate::send_policy::SendPolicy;
use crate::RunContext;

/// Pipeline settings, plain data checked at each decision point.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Acting-user tag stamped on committed files.
    pub created_by: String,
    /// Isolated mode: submissions synthesize local successes.
    pub isolated_send: bool,
    pub contribution_retry: RetryPolicy,
    pub final_cost_retry: RetryPolicy,
}

impl PipelineConfig {
    fn retry_for(&self, kind: RecordKind) -> &RetryPolicy {
        match kind {
            RecordKind::Contribution => &self.contribution_retry,
            RecordKind::FinalCost => &self.final_cost_retry,
        }
    }
}

/// Orchestrates one delivery cycle: select, submit, aggregate, commit.
pub struct DeliveryPipeline {
    source: Arc<dyn RecordSource>,
    recipient: Arc<dyn Recipient>,
    events: Arc<dyn EventLog>,
    codec: Arc<dyn PayloadCodec>,
    config: PipelineConfig,
}

impl DeliveryPipeline {
    pub fn new(
        source: Arc<dyn RecordSource>,
        recipient: Arc<dyn Recipient>,
        events: Arc<dyn EventLog>,
        codec: Arc<dyn PayloadCodec>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            source,
            recipient,
            events,
            codec,
            config,
        }
    }

    /// Run one cycle for the given kind.
    ///
    /// Per-record failures never abort the cycle; they leave the record
    /// in its pre-send status for the next cycle. Cycle-level failures
    /// (global update, commit) abort this cycle only and are audited.
    pub async fn run_cycle(&self, kind: RecordKind) -> DeliveryResult<CycleReport> {
        let started = Utc::now();
        let run = RunContext::for_cycle(kind, started);

        info!(kind = %kind, batch_id = %run.batch_id, "starting delivery cycle");

        // FinalCost records become eligible through an upstream global
        // update. A failed update aborts the cycle with zero sent, but
        // the attempt is still audited.
        if kind == RecordKind::FinalCost {
            let update = self.source.trigger_global_update().await;
            match update {
                Ok(true) => {
                    self.events
                        .record(
                            EventLogEntry::now(
                                EventType::GlobalUpdate,
                                &run.batch_id,
                                &run.trace_id,
                                200,
                            ),
                        )
                        .await;
                }
                Ok(false) => {
                    warn!(batch_id = %run.batch_id, "global update reported failure, aborting cycle");
                    self.events
                        .record(
                            EventLogEntry::now(
                                EventType::GlobalUpdate,
                                &run.batch_id,
                                &run.trace_id,
                                500,
                            )
                            .with_detail("global update reported failure"),
                        )
                        .await;
                    return Ok(CycleReport {
                        kind,
                        records_sent: 0,
                        file_id: None,
                    });
                }
                Err(err) => {
                    warn!(batch_id = %run.batch_id, error = %err, "global update failed, aborting cycle");
                    self.events
                        .record(
                            EventLogEntry::now(
                                EventType::GlobalUpdate,
                                &run.batch_id,
                                &run.trace_id,
                                err.outcome_code(),
                            )
                            .with_detail(err.to_string()),
                        )
                        .await;
                    return Err(err);
                }
            }
        }

        let selected = self
            .source
            .list_eligible(kind, kind.eligible_status())
            .await?;

        if selected.is_empty() {
            info!(kind = %kind, batch_id = %run.batch_id, "nothing to send, cycle ends");
            return Ok(CycleReport {
                kind,
                records_sent: 0,
                file_id: None,
            });
        }

        let policy = SendPolicy::new(
            self.config.retry_for(kind).clone(),
            self.config.isolated_send,
        );

        // Sequential submission, selection order preserved in `succeeded`.
        // Each selected record gets one audit row carrying its final
        // submission outcome, so the batch audit reads on its own.
        let mut succeeded: Vec<CaseRecord> = Vec::new();
        let mut failed: Vec<(i64, String)> = Vec::new();

        for record in &selected {
            let outcome = match self.codec.encode_record(record) {
                Ok(payload) => {
                    policy
                        .submit(
                            self.recipient.as_ref(),
                            self.events.as_ref(),
                            &run,
                            record,
                            &payload,
                        )
                        .await
                }
                Err(err) => {
                    // Malformed source data is a submission failure, not
                    // a pipeline-fatal error.
                    warn!(record_id = record.id, error = %err, "payload mapping failed");
                    self.events
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
                    Err(err)
                }
            };

            let (outcome_code, detail) = match &outcome {
                Ok(()) => (200, "sent".to_string()),
                Err(err) => (err.outcome_code(), err.to_string()),
            };
            self.events
                .record(
                    EventLogEntry::now(
                        EventType::RecordFetched,
                        &run.batch_id,
                        &run.trace_id,
                        outcome_code,
                    )
                    .with_payload(record.id.to_string())
                    .with_detail(detail),
                )
                .await;

            match outcome {
                Ok(()) => succeeded.push(record.clone()),
                Err(err) => failed.push((record.id, err.to_string())),
            }
        }

        for (record_id, reason) in &failed {
            warn!(kind = %kind, record_id, reason = %reason, "record stays pre-send, re-selectable next cycle");
        }

        // Hard invariant: no file without at least one outgoing record.
        if succeeded.is_empty() {
            info!(
                kind = %kind,
                batch_id = %run.batch_id,
                failed = failed.len(),
                "no successful submissions, no delivery file created"
            );
            return Ok(CycleReport {
                kind,
                records_sent: 0,
                file_id: None,
            });
        }

        let ledger = FileLedger::new(self.codec.as_ref(), &self.config.created_by);
        match ledger
            .commit(self.source.as_ref(), kind, &succeeded, started)
            .await
        {
            Ok(file_id) => {
                self.events
                    .record(
                        EventLogEntry::now(
                            EventType::FileCommitted,
                            &run.batch_id,
                            &run.trace_id,
                            200,
                        )
                        .with_payload(
                            serde_json::json!({
                                "fileId": file_id,
                                "recordIds": succeeded.iter().map(|r| r.id).collect::<Vec<_>>(),
                            })
                            .to_string(),
                        ),
                    )
                    .await;
                info!(
                    kind = %kind,
                    batch_id = %run.batch_id,
                    file_id,
                    records_sent = succeeded.len(),
                    records_failed = failed.len(),
                    "cycle committed"
                );
                Ok(CycleReport {
                    kind,
                    records_sent: succeeded.len(),
                    file_id: Some(file_id),
                })
            }
            Err(err) => {
                // Nothing was flipped; the next scheduled cycle re-drives.
                warn!(kind = %kind, batch_id = %run.batch_id, error = %err, "commit failed, cycle marked failed");
                self.events
                    .record(
                        EventLogEntry::now(
                            EventType::CommitFailed,
                            &run.batch_id,
                            &run.trace_id,
                            err.outcome_code(),
                        )
                        .with_detail(err.to_string()),
                    )
                    .await;
                Err(err)
            }
        }
    }
}
