//! In-memory fakes for the engine's external collaborators.
//!
//! The fakes mirror the adapter contracts: the source applies the atomic
//! commit and the idempotent ack exactly as the SQLite layer does, the
//! recipient can be scripted to reject or fail transiently per record,
//! and the event sink keeps every audit row for assertions.

// Not every test binary exercises every helper.
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Utc;
use ledgerlink_protocol::types::AckState;
use ledgerlink_protocol::{
    CaseRecord, DeliveryError, DeliveryResult, EventLogEntry, EventType, MigrationTask,
    RecordKind, RecordStatus, RetryPolicy,
};
use std::collections::HashMap;
use std::sync::Mutex;

use ledgerlink::adapters::{EventLog, RecordSource, Recipient};

// ============================================================================
// Record source fake
// ============================================================================

#[derive(Debug, Clone)]
pub struct StoredFile {
    pub id: i64,
    pub kind: RecordKind,
    pub file_name: String,
    pub record_ids: Vec<i64>,
    pub content: String,
    pub records_received: i64,
}

#[derive(Debug, Clone)]
pub struct StoredFileError {
    pub file_id: i64,
    pub record_id: i64,
    pub case_id: String,
    pub error_text: String,
}

#[derive(Default)]
struct SourceState {
    records: Vec<CaseRecord>,
    files: Vec<StoredFile>,
    file_errors: Vec<StoredFileError>,
    tasks: Vec<MigrationTask>,
    global_update_ok: bool,
    fail_commit: bool,
    transient_ack_failures: u32,
    /// Every (kind, batch_id) a migration worker asked for, in call order.
    visited_batches: Vec<(RecordKind, i64)>,
}

pub struct FakeSource {
    state: Mutex<SourceState>,
}

impl FakeSource {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SourceState {
                global_update_ok: true,
                ..SourceState::default()
            }),
        }
    }

    pub fn record(kind: RecordKind, id: i64, status: RecordStatus) -> CaseRecord {
        CaseRecord {
            id,
            kind,
            case_id: format!("C-{}", id),
            status,
            payload: serde_json::json!({"recordId": id, "amount": id * 100}),
            file_id: None,
            ack_state: None,
            created_at: Utc::now(),
            modified_at: Utc::now(),
        }
    }

    pub fn push_record(&self, record: CaseRecord) {
        self.state.lock().unwrap().records.push(record);
    }

    pub fn push_record_without_payload(&self, kind: RecordKind, id: i64, status: RecordStatus) {
        let mut record = Self::record(kind, id, status);
        record.payload = serde_json::Value::Null;
        self.push_record(record);
    }

    pub fn push_task(&self, batch_id: i64, kind: RecordKind, record_id: i64) {
        let mut state = self.state.lock().unwrap();
        let id = state.tasks.len() as i64 + 1;
        state.tasks.push(MigrationTask {
            id,
            batch_id,
            kind,
            case_id: format!("C-{}", record_id),
            record_id,
            is_processed: false,
            processed_date: None,
            last_http_status: None,
            last_error: None,
        });
    }

    pub fn set_global_update_ok(&self, ok: bool) {
        self.state.lock().unwrap().global_update_ok = ok;
    }

    pub fn set_fail_commit(&self, fail: bool) {
        self.state.lock().unwrap().fail_commit = fail;
    }

    /// The next N `apply_ack` calls fail transiently before the fake
    /// answers normally.
    pub fn set_transient_ack_failures(&self, n: u32) {
        self.state.lock().unwrap().transient_ack_failures = n;
    }

    pub fn record_status(&self, kind: RecordKind, id: i64) -> Option<(RecordStatus, Option<i64>)> {
        let state = self.state.lock().unwrap();
        state
            .records
            .iter()
            .find(|r| r.kind == kind && r.id == id)
            .map(|r| (r.status, r.file_id))
    }

    pub fn files(&self) -> Vec<StoredFile> {
        self.state.lock().unwrap().files.clone()
    }

    pub fn file_errors(&self) -> Vec<StoredFileError> {
        self.state.lock().unwrap().file_errors.clone()
    }

    pub fn tasks(&self) -> Vec<MigrationTask> {
        self.state.lock().unwrap().tasks.clone()
    }

    pub fn visited_batches(&self) -> Vec<(RecordKind, i64)> {
        self.state.lock().unwrap().visited_batches.clone()
    }
}

#[async_trait]
impl RecordSource for FakeSource {
    async fn list_eligible(
        &self,
        kind: RecordKind,
        status: RecordStatus,
    ) -> DeliveryResult<Vec<CaseRecord>> {
        let state = self.state.lock().unwrap();
        let mut selected: Vec<CaseRecord> = state
            .records
            .iter()
            .filter(|r| r.kind == kind && r.status == status)
            .cloned()
            .collect();
        selected.sort_by_key(|r| r.id);
        Ok(selected)
    }

    async fn get_by_id(&self, kind: RecordKind, id: i64) -> DeliveryResult<CaseRecord> {
        let state = self.state.lock().unwrap();
        state
            .records
            .iter()
            .find(|r| r.kind == kind && r.id == id)
            .cloned()
            .ok_or_else(|| DeliveryError::not_found(format!("record {}/{}", kind, id)))
    }

    async fn commit_file(
        &self,
        kind: RecordKind,
        content: &str,
        record_ids: &[i64],
        file_name: &str,
        _created_by: &str,
    ) -> DeliveryResult<i64> {
        let mut state = self.state.lock().unwrap();

        if state.fail_commit {
            return Err(DeliveryError::CommitFailure("scripted commit failure".into()));
        }

        // All-or-nothing: verify before mutating anything.
        for &id in record_ids {
            let ok = state
                .records
                .iter()
                .any(|r| r.kind == kind && r.id == id && r.status != RecordStatus::Sent);
            if !ok {
                return Err(DeliveryError::CommitFailure(format!(
                    "record {}/{} missing or already sent",
                    kind, id
                )));
            }
        }

        let file_id = state.files.len() as i64 + 1;
        state.files.push(StoredFile {
            id: file_id,
            kind,
            file_name: file_name.to_string(),
            record_ids: record_ids.to_vec(),
            content: content.to_string(),
            records_received: 0,
        });

        for &id in record_ids {
            if let Some(record) = state
                .records
                .iter_mut()
                .find(|r| r.kind == kind && r.id == id)
            {
                record.status = RecordStatus::Sent;
                record.file_id = Some(file_id);
            }
        }

        Ok(file_id)
    }

    async fn apply_ack(
        &self,
        kind: RecordKind,
        record_id: i64,
        error_text: Option<&str>,
    ) -> DeliveryResult<i64> {
        let mut state = self.state.lock().unwrap();

        if state.transient_ack_failures > 0 {
            state.transient_ack_failures -= 1;
            return Err(DeliveryError::transient("scripted source blip"));
        }

        let record = state
            .records
            .iter()
            .find(|r| r.kind == kind && r.id == record_id)
            .cloned()
            .ok_or_else(|| DeliveryError::not_found(format!("record {}/{}", kind, record_id)))?;

        let file_id = record
            .file_id
            .ok_or_else(|| DeliveryError::conflict(format!("record {}/{} has no file", kind, record_id)))?;

        let target = match error_text {
            None => AckState::AcknowledgedOk,
            Some(_) => AckState::AcknowledgedError,
        };

        // Duplicate outcome: no-op.
        if record.ack_state == Some(target) {
            return Ok(file_id);
        }

        match error_text {
            None => {
                if let Some(file) = state.files.iter_mut().find(|f| f.id == file_id) {
                    file.records_received += 1;
                }
            }
            Some(text) => {
                state.file_errors.push(StoredFileError {
                    file_id,
                    record_id,
                    case_id: record.case_id.clone(),
                    error_text: text.to_string(),
                });
            }
        }

        if let Some(record) = state
            .records
            .iter_mut()
            .find(|r| r.kind == kind && r.id == record_id)
        {
            record.ack_state = Some(target);
        }

        Ok(file_id)
    }

    async fn trigger_global_update(&self) -> DeliveryResult<bool> {
        let mut state = self.state.lock().unwrap();
        if !state.global_update_ok {
            return Ok(false);
        }
        for record in state.records.iter_mut() {
            if record.kind == RecordKind::FinalCost && record.status == RecordStatus::WaitingItems {
                record.status = RecordStatus::Requested;
            }
        }
        Ok(true)
    }

    async fn list_migration_tasks(
        &self,
        batch_id: i64,
        kind: RecordKind,
    ) -> DeliveryResult<Vec<MigrationTask>> {
        let mut state = self.state.lock().unwrap();
        state.visited_batches.push((kind, batch_id));
        Ok(state
            .tasks
            .iter()
            .filter(|t| t.batch_id == batch_id && t.kind == kind && !t.is_processed)
            .cloned()
            .collect())
    }

    async fn mark_task_processed(
        &self,
        task_id: i64,
        http_status: Option<i64>,
        error: Option<&str>,
    ) -> DeliveryResult<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(task) = state.tasks.iter_mut().find(|t| t.id == task_id) {
            task.is_processed = true;
            task.processed_date = Some(Utc::now());
            task.last_http_status = http_status;
            task.last_error = error.map(|s| s.to_string());
        }
        Ok(())
    }

    async fn max_batch_id(&self) -> DeliveryResult<Option<i64>> {
        let state = self.state.lock().unwrap();
        Ok(state.tasks.iter().map(|t| t.batch_id).max())
    }
}

// ============================================================================
// Recipient fake
// ============================================================================

#[derive(Default)]
struct RecipientState {
    reject_ids: Vec<i64>,
    /// record id -> remaining transient failures before success
    transient: HashMap<i64, u32>,
    calls: Vec<i64>,
}

pub struct ScriptedRecipient {
    state: Mutex<RecipientState>,
}

impl ScriptedRecipient {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(RecipientState::default()),
        }
    }

    /// The given record is permanently rejected (4xx-equivalent).
    pub fn reject(&self, record_id: i64) {
        self.state.lock().unwrap().reject_ids.push(record_id);
    }

    /// The given record fails transiently N times, then succeeds.
    pub fn fail_transiently(&self, record_id: i64, times: u32) {
        self.state.lock().unwrap().transient.insert(record_id, times);
    }

    pub fn calls(&self) -> Vec<i64> {
        self.state.lock().unwrap().calls.clone()
    }
}

#[async_trait]
impl Recipient for ScriptedRecipient {
    async fn submit(
        &self,
        _kind: RecordKind,
        record_id: i64,
        _case_id: &str,
        _payload: &str,
    ) -> DeliveryResult<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(record_id);

        if state.reject_ids.contains(&record_id) {
            return Err(DeliveryError::rejected(format!(
                "record {} rejected by script",
                record_id
            )));
        }

        if let Some(remaining) = state.transient.get_mut(&record_id) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(DeliveryError::transient(format!(
                    "record {} transient by script",
                    record_id
                )));
            }
        }

        Ok(())
    }
}

// ============================================================================
// Event sink fake
// ============================================================================

pub struct MemoryEvents {
    entries: Mutex<Vec<EventLogEntry>>,
}

impl MemoryEvents {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
        }
    }

    pub fn entries(&self) -> Vec<EventLogEntry> {
        self.entries.lock().unwrap().clone()
    }

    pub fn count(&self, event_type: EventType) -> usize {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.event_type == event_type)
            .count()
    }
}

#[async_trait]
impl EventLog for MemoryEvents {
    async fn record(&self, entry: EventLogEntry) {
        self.entries.lock().unwrap().push(entry);
    }
}

// ============================================================================
// Shared knobs
// ============================================================================

/// Retry policy with millisecond backoff so tests run fast.
pub fn fast_policy(name: &str, max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
        name: name.to_string(),
        max_attempts,
        base_delay_ms: 1,
        max_delay_ms: 2,
        jitter_ms: 0,
    }
}
