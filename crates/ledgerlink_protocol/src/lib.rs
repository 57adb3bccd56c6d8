//! Canonical domain types for the ledgerlink delivery engine.
//!
//! Every crate in the workspace speaks these types: record kinds and their
//! lifecycle statuses, the delivery-file bookkeeping rows, migration tasks,
//! audit events, the inbound acknowledgement envelope, and the shared
//! error taxonomy and retry-policy value.
//!
//! The definitions here are the CANONICAL ones - use these everywhere.

pub mod error;
pub mod retry;
pub mod types;

pub use error::{DeliveryError, DeliveryResult};
pub use retry::RetryPolicy;
pub use types::{
    AckEnvelope,
    AckReport,
    AckState,
    CaseRecord,
    CycleReport,
    DeliveryFile,
    DeliveryFileError,
    EventLogEntry,
    EventType,
    MigrationReport,
    MigrationTask,
    RecordKind,
    RecordStatus,
};
