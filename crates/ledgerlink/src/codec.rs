//! Wire-document codec seam.
//!
//! The aggregate document's exact shape belongs to the codec collaborator,
//! not the engine; the engine only requires that a batch of succeeded
//! records serializes into one document string and that a single record's
//! payload serializes for submission. [`JsonCodec`] is the default
//! implementation; an XML codec would slot in behind the same trait.

use ledgerlink_protocol::{CaseRecord, DeliveryError, DeliveryResult, RecordKind};
use serde_json::json;

pub trait PayloadCodec: Send + Sync {
    /// Serialize one record's payload for outbound submission.
    /// `MappingFailure` when the source data cannot produce a payload.
    fn encode_record(&self, record: &CaseRecord) -> DeliveryResult<String>;

    /// Serialize the succeeded records into one aggregate document, in
    /// the given order.
    fn encode_batch(&self, kind: RecordKind, records: &[CaseRecord]) -> DeliveryResult<String>;
}

/// JSON wire documents via serde_json.
pub struct JsonCodec;

impl PayloadCodec for JsonCodec {
    fn encode_record(&self, record: &CaseRecord) -> DeliveryResult<String> {
        if record.payload.is_null() {
            return Err(DeliveryError::mapping(format!(
                "record {}/{} has no payload",
                record.kind, record.id
            )));
        }
        serde_json::to_string(&record.payload)
            .map_err(|e| DeliveryError::mapping(e.to_string()))
    }

    fn encode_batch(&self, kind: RecordKind, records: &[CaseRecord]) -> DeliveryResult<String> {
        let entries = records
            .iter()
            .map(|record| {
                if record.payload.is_null() {
                    return Err(DeliveryError::mapping(format!(
                        "record {}/{} has no payload",
                        record.kind, record.id
                    )));
                }
                Ok(json!({
                    "recordId": record.id,
                    "caseId": record.case_id,
                    "payload": record.payload,
                }))
            })
            .collect::<DeliveryResult<Vec<_>>>()?;

        let document = json!({
            "kind": kind.as_str(),
            "recordCount": entries.len(),
            "records": entries,
        });

        serde_json::to_string(&document).map_err(|e| DeliveryError::mapping(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use ledgerlink_protocol::RecordStatus;

    fn record(id: i64, payload: serde_json::Value) -> CaseRecord {
        CaseRecord {
            id,
            kind: RecordKind::Contribution,
            case_id: format!("C-{}", id),
            status: RecordStatus::Active,
            payload,
            file_id: None,
            ack_state: None,
            created_at: Utc::now(),
            modified_at: Utc::now(),
        }
    }

    #[test]
    fn test_encode_record_rejects_missing_payload() {
        let err = JsonCodec
            .encode_record(&record(1, serde_json::Value::Null))
            .unwrap_err();
        assert!(matches!(err, DeliveryError::MappingFailure(_)));
    }

    #[test]
    fn test_encode_batch_preserves_order() {
        let records = vec![
            record(3, json!({"amount": 30})),
            record(1, json!({"amount": 10})),
            record(2, json!({"amount": 20})),
        ];
        let doc = JsonCodec
            .encode_batch(RecordKind::Contribution, &records)
            .unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&doc).unwrap();
        assert_eq!(parsed["recordCount"], 3);
        let ids: Vec<i64> = parsed["records"]
            .as_array()
            .unwrap()
            .iter()
            .map(|r| r["recordId"].as_i64().unwrap())
            .collect();
        assert_eq!(ids, vec![3, 1, 2]);
    }
}
