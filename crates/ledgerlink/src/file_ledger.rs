//! File ledger: aggregate document build and the atomic commit request.
//!
//! The commit is the single operation that both persists the delivery
//! file and flips every succeeded record to SENT. It either fully
//! happens or leaves nothing behind; the pipeline relies on that to keep
//! failed cycles re-drivable.

use chrono::{DateTime, Utc};
use ledgerlink_protocol::{CaseRecord, DeliveryError, DeliveryResult, RecordKind};

use crate::adapters::RecordSource;
use crate::codec::PayloadCodec;

/// Deterministic file name derived from the kind and the cycle
/// timestamp. Stable across retries of the same commit within a cycle
/// because the pipeline captures the timestamp once.
pub fn file_name(kind: RecordKind, at: DateTime<Utc>) -> String {
    format!("{}_{}.json", kind.as_str(), at.format("%Y%m%d%H%M%S"))
}

/// Builds the aggregate payload document and issues the atomic commit.
pub struct FileLedger<'a> {
    codec: &'a dyn PayloadCodec,
    created_by: &'a str,
}

impl<'a> FileLedger<'a> {
    pub fn new(codec: &'a dyn PayloadCodec, created_by: &'a str) -> Self {
        Self { codec, created_by }
    }

    /// Serialize the succeeded records into one document and commit it
    /// atomically. Returns the new file id for audit correlation.
    ///
    /// Any failure here means nothing was flipped; it surfaces as
    /// `CommitFailure` so the cycle is marked failed without inventing
    /// a retry.
    pub async fn commit(
        &self,
        source: &dyn RecordSource,
        kind: RecordKind,
        succeeded: &[CaseRecord],
        at: DateTime<Utc>,
    ) -> DeliveryResult<i64> {
        let content = self.codec.encode_batch(kind, succeeded)?;
        let record_ids: Vec<i64> = succeeded.iter().map(|r| r.id).collect();
        let name = file_name(kind, at);

        source
            .commit_file(kind, &content, &record_ids, &name, self.created_by)
            .await
            .map_err(|e| match e {
                DeliveryError::CommitFailure(_) => e,
                other => DeliveryError::CommitFailure(other.to_string()),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_file_name_is_deterministic() {
        let at = Utc.with_ymd_and_hms(2026, 8, 30, 9, 15, 0).unwrap();
        assert_eq!(
            file_name(RecordKind::Contribution, at),
            "CONTRIBUTION_20260830091500.json"
        );
        assert_eq!(
            file_name(RecordKind::FinalCost, at),
            "FINAL_COST_20260830091500.json"
        );
        // Same inputs, same name
        assert_eq!(
            file_name(RecordKind::Contribution, at),
            file_name(RecordKind::Contribution, at)
        );
    }
}
