//! Migration engine: replays the historical backlog through the same
//! send path under a fixed, partitioned worker pool.
//!
//! The batch-id space is split into residue classes modulo the worker
//! count, one worker per (kind, residue class), so no two workers ever
//! touch the same batch id. Tasks are marked processed individually,
//! which makes a rerun after a partial run skip the already-processed
//! remainder - resumability is a requirement here, not an optimization.

use chrono::Utc;
use ledgerlink_protocol::{
    DeliveryResult, EventLogEntry, EventType, MigrationReport, MigrationTask, RecordKind,
    RetryPolicy,
};
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::adapters::{Anonymizer, EventLog, RecordSource, Recipient};
use crate::codec::PayloadCodec;
use crate::send_policy::SendPolicy;
use crate::RunContext;

/// Migration settings. The worker count is fixed for the whole run,
/// never elastic.
#[derive(Debug, Clone)]
pub struct MigrationConfig {
    pub workers_per_kind: usize,
    /// Route payloads through the anonymization collaborator.
    pub anonymize: bool,
    /// Smoke-test mode: at most one task per batch.
    pub limit_one_per_batch: bool,
    /// Isolated mode for the underlying send policy.
    pub isolated_send: bool,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            workers_per_kind: 2,
            anonymize: false,
            limit_one_per_batch: false,
            isolated_send: false,
        }
    }
}

/// Replays `MigrationTask` rows through the delivery mechanism.
#[derive(Clone)]
pub struct MigrationEngine {
    source: Arc<dyn RecordSource>,
    recipient: Arc<dyn Recipient>,
    events: Arc<dyn EventLog>,
    codec: Arc<dyn PayloadCodec>,
    anonymizer: Arc<dyn Anonymizer>,
    policy: RetryPolicy,
    config: MigrationConfig,
}

impl MigrationEngine {
    pub fn new(
        source: Arc<dyn RecordSource>,
        recipient: Arc<dyn Recipient>,
        events: Arc<dyn EventLog>,
        codec: Arc<dyn PayloadCodec>,
        anonymizer: Arc<dyn Anonymizer>,
        policy: RetryPolicy,
        config: MigrationConfig,
    ) -> Self {
        Self {
            source,
            recipient,
            events,
            codec,
            anonymizer,
            policy,
            config,
        }
    }

    /// Run one migration pass over the whole backlog.
    ///
    /// The caller blocks until every worker has joined. A worker that
    /// fails contributes zero to the count but never prevents the others
    /// from reporting theirs.
    pub async fn migrate(&self) -> DeliveryResult<MigrationReport> {
        let started = Instant::now();
        let run = RunContext::for_migration(Utc::now());

        // Snapshot boundary: tasks created after this point are not
        // picked up in this run.
        let max_batch = match self.source.max_batch_id().await? {
            Some(max) => max,
            None => {
                info!(batch_id = %run.batch_id, "backlog empty, nothing to migrate");
                return Ok(MigrationReport {
                    processed: 0,
                    elapsed_ms: 0,
                    per_worker: Vec::new(),
                });
            }
        };

        let workers = self.config.workers_per_kind.max(1);
        info!(
            batch_id = %run.batch_id,
            max_batch,
            workers_per_kind = workers,
            "starting migration run"
        );

        let mut handles: Vec<JoinHandle<DeliveryResult<u64>>> = Vec::new();
        for kind in RecordKind::all() {
            for residue in 0..workers {
                let engine = self.clone();
                let run = run.clone();
                handles.push(tokio::spawn(async move {
                    engine
                        .run_worker(kind, residue as i64, workers as i64, max_batch, &run)
                        .await
                }));
            }
        }

        let mut per_worker = Vec::with_capacity(handles.len());
        for handle in handles {
            match handle.await {
                Ok(Ok(count)) => per_worker.push(count),
                Ok(Err(err)) => {
                    warn!(error = %err, "migration worker failed, contributes zero");
                    per_worker.push(0);
                }
                Err(join_err) => {
                    warn!(error = %join_err, "migration worker panicked, contributes zero");
                    per_worker.push(0);
                }
            }
        }

        let processed: u64 = per_worker.iter().sum();
        let elapsed_ms = started.elapsed().as_millis() as u64;
        let report = MigrationReport {
            processed,
            elapsed_ms,
            per_worker,
        };
        info!(
            batch_id = %run.batch_id,
            processed,
            elapsed_ms,
            throughput = report.throughput(),
            "migration run finished"
        );

        Ok(report)
    }

    /// One worker: ascending scan over its residue class, gaps tolerated.
    async fn run_worker(
        &self,
        kind: RecordKind,
        residue: i64,
        workers: i64,
        max_batch: i64,
        run: &RunContext,
    ) -> DeliveryResult<u64> {
        let policy = SendPolicy::new(self.policy.clone(), self.config.isolated_send);
        let mut processed = 0u64;

        let mut batch_id = residue;
        while batch_id <= max_batch {
            let mut tasks = self.source.list_migration_tasks(batch_id, kind).await?;
            if self.config.limit_one_per_batch {
                tasks.truncate(1);
            }

            for task in tasks {
                self.replay_task(&policy, &task, run).await?;
                processed += 1;
            }

            batch_id += workers;
        }

        Ok(processed)
    }

    /// Replay one task and mark it processed with the outcome. A failed
    /// replay is captured on the task row and never blocks processing of
    /// subsequent tasks or batches.
    async fn replay_task(
        &self,
        policy: &SendPolicy,
        task: &MigrationTask,
        run: &RunContext,
    ) -> DeliveryResult<()> {
        let outcome = self.replay_once(policy, task, run).await;

        let (status, error) = match &outcome {
            Ok(()) => (Some(200), None),
            Err(err) => (Some(err.outcome_code() as i64), Some(err.to_string())),
        };

        self.source
            .mark_task_processed(task.id, status, error.as_deref())
            .await?;

        self.events
            .record(
                EventLogEntry::now(
                    EventType::MigrationReplay,
                    &run.batch_id,
                    &run.trace_id,
                    status.unwrap_or(500) as u16,
                )
                .with_payload(task.record_id.to_string())
                .with_detail(match &error {
                    Some(text) => format!("batch {} task {}: {}", task.batch_id, task.id, text),
                    None => format!("batch {} task {}", task.batch_id, task.id),
                }),
            )
            .await;

        if let Err(err) = outcome {
            warn!(
                task_id = task.id,
                batch_id = task.batch_id,
                record_id = task.record_id,
                error = %err,
                "task replay failed, marked processed with error"
            );
        }

        Ok(())
    }

    async fn replay_once(
        &self,
        policy: &SendPolicy,
        task: &MigrationTask,
        run: &RunContext,
    ) -> DeliveryResult<()> {
        let mut record = self.source.get_by_id(task.kind, task.record_id).await?;

        if self.config.anonymize {
            record.payload = self.anonymizer.scrub(task.kind, &record.payload);
        }

        let payload = self.codec.encode_record(&record)?;

        policy
            .submit(
                self.recipient.as_ref(),
                self.events.as_ref(),
                run,
                &record,
                &payload,
            )
            .await
    }
}
