//! Domain payload types shared across the workspace.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Canonical Enums (used across all crates)
// ============================================================================

/// The two record kinds synchronized with the Recipient.
/// This is the CANONICAL definition - use this everywhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecordKind {
    /// Periodic contribution records.
    Contribution,
    /// Final cost settlement records.
    FinalCost,
}

impl RecordKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::Contribution => "CONTRIBUTION",
            RecordKind::FinalCost => "FINAL_COST",
        }
    }

    /// Status a record of this kind must hold to be picked up by a cycle.
    pub fn eligible_status(&self) -> RecordStatus {
        match self {
            RecordKind::Contribution => RecordStatus::Active,
            RecordKind::FinalCost => RecordStatus::Requested,
        }
    }

    /// All kinds, in the order cycles and migration workers iterate them.
    pub fn all() -> [RecordKind; 2] {
        [RecordKind::Contribution, RecordKind::FinalCost]
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for RecordKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "CONTRIBUTION" => Ok(RecordKind::Contribution),
            "FINAL_COST" | "FINALCOST" => Ok(RecordKind::FinalCost),
            _ => Err(format!(
                "Invalid record kind: '{}'. Expected: CONTRIBUTION or FINAL_COST",
                s
            )),
        }
    }
}

/// Record lifecycle status.
///
/// The two kinds use different vocabularies of the same shape:
/// Contribution runs `ACTIVE -> SENT` (with `REPLACED` as a terminal
/// alternate), FinalCost runs `WAITING_ITEMS -> REQUESTED -> SENT`.
/// A record flips to `SENT` only inside a successful file commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecordStatus {
    /// Contribution: eligible for the next cycle.
    Active,
    /// Contribution: superseded, never sent.
    Replaced,
    /// FinalCost: waiting for cost items, not yet requestable.
    WaitingItems,
    /// FinalCost: eligible for the next cycle (set by the global update).
    Requested,
    /// Delivered as part of a committed file.
    Sent,
}

impl RecordStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordStatus::Active => "ACTIVE",
            RecordStatus::Replaced => "REPLACED",
            RecordStatus::WaitingItems => "WAITING_ITEMS",
            RecordStatus::Requested => "REQUESTED",
            RecordStatus::Sent => "SENT",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RecordStatus::Sent | RecordStatus::Replaced)
    }
}

impl fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for RecordStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "ACTIVE" => Ok(RecordStatus::Active),
            "REPLACED" => Ok(RecordStatus::Replaced),
            "WAITING_ITEMS" => Ok(RecordStatus::WaitingItems),
            "REQUESTED" => Ok(RecordStatus::Requested),
            "SENT" => Ok(RecordStatus::Sent),
            _ => Err(format!("Invalid record status: '{}'", s)),
        }
    }
}

/// Acknowledgement sub-state of a record, independent of the cycle runs.
///
/// Entry is `SENT` (set by the file commit); the correlator moves a record
/// to exactly one of the terminal states and re-applying the same outcome
/// is a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AckState {
    AcknowledgedOk,
    AcknowledgedError,
}

impl AckState {
    pub fn as_str(&self) -> &'static str {
        match self {
            AckState::AcknowledgedOk => "ACKNOWLEDGED_OK",
            AckState::AcknowledgedError => "ACKNOWLEDGED_ERROR",
        }
    }
}

impl fmt::Display for AckState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for AckState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "ACKNOWLEDGED_OK" => Ok(AckState::AcknowledgedOk),
            "ACKNOWLEDGED_ERROR" => Ok(AckState::AcknowledgedError),
            _ => Err(format!("Invalid ack state: '{}'", s)),
        }
    }
}

/// Audit event type written to the Event Log collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    /// A record was fetched/selected for a cycle.
    RecordFetched,
    /// One outbound submission attempt (any outcome).
    SendAttempt,
    /// A record's submission succeeded.
    SendSucceeded,
    /// A record's submission failed permanently for this cycle.
    SendFailed,
    /// A delivery file was committed.
    FileCommitted,
    /// The atomic commit failed; the cycle is marked failed.
    CommitFailed,
    /// The FinalCost global update ran (success or failure).
    GlobalUpdate,
    /// An asynchronous confirmation arrived from the Recipient.
    AckReceived,
    /// The Recipient's free-text processing report for one ack.
    AckProcessing,
    /// A migration task was replayed.
    MigrationReplay,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::RecordFetched => "RECORD_FETCHED",
            EventType::SendAttempt => "SEND_ATTEMPT",
            EventType::SendSucceeded => "SEND_SUCCEEDED",
            EventType::SendFailed => "SEND_FAILED",
            EventType::FileCommitted => "FILE_COMMITTED",
            EventType::CommitFailed => "COMMIT_FAILED",
            EventType::GlobalUpdate => "GLOBAL_UPDATE",
            EventType::AckReceived => "ACK_RECEIVED",
            EventType::AckProcessing => "ACK_PROCESSING",
            EventType::MigrationReplay => "MIGRATION_REPLAY",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for EventType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "RECORD_FETCHED" => Ok(EventType::RecordFetched),
            "SEND_ATTEMPT" => Ok(EventType::SendAttempt),
            "SEND_SUCCEEDED" => Ok(EventType::SendSucceeded),
            "SEND_FAILED" => Ok(EventType::SendFailed),
            "FILE_COMMITTED" => Ok(EventType::FileCommitted),
            "COMMIT_FAILED" => Ok(EventType::CommitFailed),
            "GLOBAL_UPDATE" => Ok(EventType::GlobalUpdate),
            "ACK_RECEIVED" => Ok(EventType::AckReceived),
            "ACK_PROCESSING" => Ok(EventType::AckProcessing),
            "MIGRATION_REPLAY" => Ok(EventType::MigrationReplay),
            _ => Err(format!("Invalid event type: '{}'", s)),
        }
    }
}

// ============================================================================
// Record and bookkeeping rows
// ============================================================================

/// One case record, owned canonically by the Ledger.
///
/// The engine holds only a transient copy for the duration of one cycle;
/// the adapter's row is the source of truth.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseRecord {
    /// Numeric id, unique within the kind.
    pub id: i64,
    pub kind: RecordKind,
    /// External case/matter identifier.
    pub case_id: String,
    pub status: RecordStatus,
    /// Opaque kind-specific document produced by the Ledger.
    pub payload: serde_json::Value,
    /// Owning delivery file, set by the commit that flipped this to SENT.
    pub file_id: Option<i64>,
    /// Acknowledgement sub-state, set by the correlator.
    pub ack_state: Option<AckState>,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

/// One aggregate document submitted per cycle, with its counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryFile {
    pub id: i64,
    pub kind: RecordKind,
    /// Deterministic name derived from the kind and the cycle timestamp.
    pub file_name: String,
    /// Included record ids, in selection order. Successful submissions only.
    pub record_ids: Vec<i64>,
    pub records_sent: i64,
    /// Raw serialized aggregate document.
    pub content: String,
    /// Count of success acknowledgements received so far.
    pub records_received: i64,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub sent_at: Option<DateTime<Utc>>,
    pub received_at: Option<DateTime<Utc>>,
    pub modified_at: Option<DateTime<Utc>>,
}

/// One error acknowledgement row. Insert-only, never updated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryFileError {
    pub id: i64,
    pub file_id: i64,
    pub record_id: i64,
    pub case_id: String,
    pub error_text: String,
    pub created_at: DateTime<Utc>,
}

/// One unit of historical backlog work, replayed by the migration engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationTask {
    pub id: i64,
    /// Partition key. Workers split the batch-id space into residue classes.
    pub batch_id: i64,
    pub kind: RecordKind,
    pub case_id: String,
    pub record_id: i64,
    /// Flipped to true after each replay attempt, success or terminal
    /// failure. Never retried automatically within the same run.
    pub is_processed: bool,
    pub processed_date: Option<DateTime<Utc>>,
    pub last_http_status: Option<i64>,
    pub last_error: Option<String>,
}

/// Immutable audit row written for every state-changing action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventLogEntry {
    pub event_type: EventType,
    /// Correlates all entries of one cycle/run.
    pub batch_id: String,
    pub trace_id: String,
    /// HTTP-status-like outcome code.
    pub outcome_code: u16,
    /// Payload snapshot, serialized.
    pub payload: Option<String>,
    /// Free text (error detail, report title, toggles in effect).
    pub detail: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl EventLogEntry {
    /// Convenience constructor stamping the current time.
    pub fn now(
        event_type: EventType,
        batch_id: impl Into<String>,
        trace_id: impl Into<String>,
        outcome_code: u16,
    ) -> Self {
        Self {
            event_type,
            batch_id: batch_id.into(),
            trace_id: trace_id.into(),
            outcome_code,
            payload: None,
            detail: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_payload(mut self, payload: impl Into<String>) -> Self {
        self.payload = Some(payload.into());
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

// ============================================================================
// Inbound acknowledgement envelope
// ============================================================================

/// Free-text report inside a confirmation envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AckReport {
    pub title: String,
    /// ISO-8601 UTC timestamp from the Recipient.
    pub detail: String,
}

/// Confirmation envelope the Recipient delivers out-of-band, at least once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AckEnvelope {
    pub record_id: i64,
    pub case_id: String,
    pub report: AckReport,
}

impl AckEnvelope {
    /// Error text derived from the report: `None` means success.
    pub fn error_text(&self) -> Option<&str> {
        if self.report.title == "Success" {
            None
        } else {
            Some(self.report.title.as_str())
        }
    }
}

// ============================================================================
// Run reports
// ============================================================================

/// Outcome of one delivery cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleReport {
    pub kind: RecordKind,
    pub records_sent: usize,
    /// `None` when nothing was sent: no file is ever created then.
    pub file_id: Option<i64>,
}

/// Outcome of one migration run, summed after all workers join.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationReport {
    pub processed: u64,
    pub elapsed_ms: u64,
    /// Per-worker processed counts, in (kind, residue) spawn order.
    /// A worker that failed contributes zero.
    pub per_worker: Vec<u64>,
}

impl MigrationReport {
    /// Tasks per second over the whole run, zero when nothing ran.
    pub fn throughput(&self) -> f64 {
        if self.elapsed_ms == 0 {
            return 0.0;
        }
        self.processed as f64 * 1000.0 / self.elapsed_ms as f64
    }
}
