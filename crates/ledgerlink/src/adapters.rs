//! Adapter traits for the engine's external collaborators.
//!
//! The engine consumes, never implements, the Record Source (the Ledger's
//! persistence), the Recipient transport, and the Event Log audit sink.
//! These traits enable swapping backends without changing engine code;
//! the SQLite bindings live in [`crate::sqlite`], test fakes in the
//! integration-test harness.

use async_trait::async_trait;
use ledgerlink_protocol::{
    CaseRecord, DeliveryResult, EventLogEntry, MigrationTask, RecordKind, RecordStatus,
};

/// The Ledger's persistence, consumed as opaque rows.
#[async_trait]
pub trait RecordSource: Send + Sync {
    /// List eligible records of one kind in the given status, in a stable
    /// order. The returned order fixes the succeeded-set ordering.
    async fn list_eligible(
        &self,
        kind: RecordKind,
        status: RecordStatus,
    ) -> DeliveryResult<Vec<CaseRecord>>;

    /// Fetch one record by id. `SourceNotFound` when the Ledger has no
    /// such row.
    async fn get_by_id(&self, kind: RecordKind, id: i64) -> DeliveryResult<CaseRecord>;

    /// Atomic commit: persist the delivery-file row, flip every listed
    /// record to SENT with the new file id attached, and return that id -
    /// or fail the whole operation with no partial effect.
    async fn commit_file(
        &self,
        kind: RecordKind,
        content: &str,
        record_ids: &[i64],
        file_name: &str,
        created_by: &str,
    ) -> DeliveryResult<i64>;

    /// Apply one acknowledgement outcome idempotently and return the
    /// owning file id. `SourceNotFound` for an unknown record,
    /// `SourceConflict` when the record has no owning file yet.
    async fn apply_ack(
        &self,
        kind: RecordKind,
        record_id: i64,
        error_text: Option<&str>,
    ) -> DeliveryResult<i64>;

    /// FinalCost upstream step moving WAITING_ITEMS records to REQUESTED.
    /// Returns whether the update reported success.
    async fn trigger_global_update(&self) -> DeliveryResult<bool>;

    /// Unprocessed migration tasks of one kind in one batch.
    async fn list_migration_tasks(
        &self,
        batch_id: i64,
        kind: RecordKind,
    ) -> DeliveryResult<Vec<MigrationTask>>;

    /// Mark a migration task processed with its outcome.
    async fn mark_task_processed(
        &self,
        task_id: i64,
        http_status: Option<i64>,
        error: Option<&str>,
    ) -> DeliveryResult<()>;

    /// Highest existing batch id, the snapshot boundary of one migration
    /// run. `None` when the backlog is empty.
    async fn max_batch_id(&self) -> DeliveryResult<Option<i64>>;
}

/// Outbound transport to the external processing partner.
#[async_trait]
pub trait Recipient: Send + Sync {
    /// Submit one record payload. Classifies the outcome into the
    /// delivery taxonomy: explicit rejection is permanent, transport
    /// trouble is transient.
    async fn submit(
        &self,
        kind: RecordKind,
        record_id: i64,
        case_id: &str,
        payload: &str,
    ) -> DeliveryResult<()>;
}

/// Append-only audit sink.
///
/// Fire-and-forget: implementations log their own failures and never
/// propagate them, so callers can audit unconditionally.
#[async_trait]
pub trait EventLog: Send + Sync {
    async fn record(&self, entry: EventLogEntry);
}

/// Content transform applied to migrated payloads when configured.
/// The transform itself is an external concern; the engine only routes
/// payloads through it.
pub trait Anonymizer: Send + Sync {
    fn scrub(&self, kind: RecordKind, payload: &serde_json::Value) -> serde_json::Value;
}

/// Identity transform, used when anonymization is toggled off.
pub struct PassthroughAnonymizer;

impl Anonymizer for PassthroughAnonymizer {
    fn scrub(&self, _kind: RecordKind, payload: &serde_json::Value) -> serde_json::Value {
        payload.clone()
    }
}
