//! Record-delivery lifecycle engine.
//!
//! Reconciles financial case records between the system-of-record (the
//! Ledger) and an external processing partner (the Recipient):
//!
//! - **Delivery pipeline** ([`pipeline`]): one batch cycle per record kind -
//!   select eligible records, submit one-by-one, aggregate successes into a
//!   delivery file, commit atomically.
//! - **Outbound send policy** ([`send_policy`]): bounded retries with
//!   backoff around one Recipient submission, transient/permanent split.
//! - **File ledger** ([`file_ledger`]): aggregate document build and the
//!   all-or-nothing commit request.
//! - **Acknowledgement correlator** ([`correlator`]): matches out-of-band
//!   confirmations back to the file that produced them, idempotently.
//! - **Migration engine** ([`migration`]): replays the historical backlog
//!   through the same send path under a fixed, partitioned worker pool.
//!
//! External collaborators (record source, recipient transport, event log,
//! anonymization) sit behind the traits in [`adapters`]; the SQLite
//! bindings live in [`sqlite`].

pub mod adapters;
pub mod cli;
pub mod codec;
pub mod config;
pub mod correlator;
pub mod file_ledger;
pub mod migration;
pub mod pipeline;
pub mod recipient_http;
pub mod send_policy;
pub mod sqlite;

pub use config::AppConfig;
pub use correlator::AckCorrelator;
pub use migration::MigrationEngine;
pub use pipeline::DeliveryPipeline;

use chrono::{DateTime, Utc};
use ledgerlink_protocol::RecordKind;
use uuid::Uuid;

/// Correlation ids stamped on every audit row of one run.
///
/// The batch id groups all entries of one cycle/run for a human reading
/// the event log after the fact; the trace id is unique per invocation.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub batch_id: String,
    pub trace_id: String,
}

impl RunContext {
    /// Context for one delivery cycle of the given kind.
    pub fn for_cycle(kind: RecordKind, at: DateTime<Utc>) -> Self {
        Self {
            batch_id: format!("{}-{}", kind.as_str(), at.format("%Y%m%d%H%M%S")),
            trace_id: Uuid::new_v4().to_string(),
        }
    }

    /// Context for one inbound acknowledgement.
    pub fn for_ack(kind: RecordKind, record_id: i64) -> Self {
        Self {
            batch_id: format!("ACK-{}-{}", kind.as_str(), record_id),
            trace_id: Uuid::new_v4().to_string(),
        }
    }

    /// Context for one migration run.
    pub fn for_migration(at: DateTime<Utc>) -> Self {
        Self {
            batch_id: format!("MIGRATION-{}", at.format("%Y%m%d%H%M%S")),
            trace_id: Uuid::new_v4().to_string(),
        }
    }
}
