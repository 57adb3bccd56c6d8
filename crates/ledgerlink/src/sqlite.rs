//! SQLite bindings of the adapter traits over [`LedgerDb`].
//!
//! The db layer has its own error type; this module maps it into the
//! delivery taxonomy at the trait seam. Connection-level trouble maps to
//! `TransientTransport` so the bounded-retry policy on the ack path
//! applies to it.

use async_trait::async_trait;
use ledgerlink_db::{DbError, LedgerDb};
use ledgerlink_protocol::{
    CaseRecord, DeliveryError, DeliveryResult, EventLogEntry, MigrationTask, RecordKind,
    RecordStatus,
};
use tracing::warn;

use crate::adapters::{EventLog, RecordSource};

fn map_db(e: DbError) -> DeliveryError {
    match e {
        DbError::NotFound(msg) => DeliveryError::SourceNotFound(msg),
        DbError::Conflict(msg) => DeliveryError::SourceConflict(msg),
        DbError::InvalidState(msg) => DeliveryError::CommitFailure(msg),
        DbError::Serialization(e) => DeliveryError::MappingFailure(e.to_string()),
        DbError::Sqlx(e) => DeliveryError::TransientTransport(e.to_string()),
        DbError::Io(e) => DeliveryError::TransientTransport(e.to_string()),
    }
}

#[async_trait]
impl RecordSource for LedgerDb {
    async fn list_eligible(
        &self,
        kind: RecordKind,
        status: RecordStatus,
    ) -> DeliveryResult<Vec<CaseRecord>> {
        LedgerDb::list_eligible(self, kind, status).await.map_err(map_db)
    }

    async fn get_by_id(&self, kind: RecordKind, id: i64) -> DeliveryResult<CaseRecord> {
        self.get_record(kind, id).await.map_err(map_db)
    }

    async fn commit_file(
        &self,
        kind: RecordKind,
        content: &str,
        record_ids: &[i64],
        file_name: &str,
        created_by: &str,
    ) -> DeliveryResult<i64> {
        LedgerDb::commit_file(self, kind, content, record_ids, file_name, created_by)
            .await
            .map_err(map_db)
    }

    async fn apply_ack(
        &self,
        kind: RecordKind,
        record_id: i64,
        error_text: Option<&str>,
    ) -> DeliveryResult<i64> {
        LedgerDb::apply_ack(self, kind, record_id, error_text)
            .await
            .map_err(map_db)
    }

    async fn trigger_global_update(&self) -> DeliveryResult<bool> {
        LedgerDb::trigger_global_update(self).await.map_err(map_db)
    }

    async fn list_migration_tasks(
        &self,
        batch_id: i64,
        kind: RecordKind,
    ) -> DeliveryResult<Vec<MigrationTask>> {
        self.list_unprocessed_tasks(batch_id, kind)
            .await
            .map_err(map_db)
    }

    async fn mark_task_processed(
        &self,
        task_id: i64,
        http_status: Option<i64>,
        error: Option<&str>,
    ) -> DeliveryResult<()> {
        LedgerDb::mark_task_processed(self, task_id, http_status, error)
            .await
            .map_err(map_db)
    }

    async fn max_batch_id(&self) -> DeliveryResult<Option<i64>> {
        LedgerDb::max_batch_id(self).await.map_err(map_db)
    }
}

#[async_trait]
impl EventLog for LedgerDb {
    async fn record(&self, entry: EventLogEntry) {
        // Best-effort: an audit failure is itself logged, never propagated.
        if let Err(e) = self.append_event(&entry).await {
            warn!(
                event_type = %entry.event_type,
                batch_id = %entry.batch_id,
                error = %e,
                "failed to write audit event"
            );
        }
    }
}
