//! Acknowledgement correlation: idempotence, terminal errors, audit pair.

mod harness;

use std::sync::Arc;

use ledgerlink::AckCorrelator;
use ledgerlink_protocol::{
    AckEnvelope, AckReport, DeliveryError, EventType, RecordKind, RecordStatus,
};

use harness::{fast_policy, FakeSource, MemoryEvents};

fn correlator(source: &Arc<FakeSource>, events: &Arc<MemoryEvents>, isolated: bool) -> AckCorrelator {
    AckCorrelator::new(
        source.clone(),
        events.clone(),
        fast_policy("ack-source", 3),
        isolated,
    )
}

fn success_envelope(record_id: i64) -> AckEnvelope {
    AckEnvelope {
        record_id,
        case_id: format!("C-{}", record_id),
        report: AckReport {
            title: "Success".to_string(),
            detail: "2026-08-30T10:00:00Z".to_string(),
        },
    }
}

fn error_envelope(record_id: i64, title: &str) -> AckEnvelope {
    AckEnvelope {
        record_id,
        case_id: format!("C-{}", record_id),
        report: AckReport {
            title: title.to_string(),
            detail: "2026-08-30T10:00:00Z".to_string(),
        },
    }
}

/// Seeds one SENT record owned by a committed file, returns the file id.
async fn seed_sent_record(source: &FakeSource, kind: RecordKind, id: i64) -> i64 {
    use ledgerlink::adapters::RecordSource;

    source.push_record(FakeSource::record(kind, id, RecordStatus::Active));
    source
        .commit_file(kind, "{}", &[id], "CONTRIBUTION_20260830100000.json", "test-runner")
        .await
        .unwrap()
}

#[tokio::test]
async fn success_ack_increments_received_counter() {
    let source = Arc::new(FakeSource::new());
    let events = Arc::new(MemoryEvents::new());
    let file_id = seed_sent_record(&source, RecordKind::Contribution, 1).await;
    let correlator = correlator(&source, &events, false);

    let got = correlator
        .handle_ack(RecordKind::Contribution, &success_envelope(1))
        .await
        .unwrap();

    assert_eq!(got, file_id);
    assert_eq!(source.files()[0].records_received, 1);
    assert!(source.file_errors().is_empty());
}

#[tokio::test]
async fn duplicate_success_ack_never_double_counts() {
    let source = Arc::new(FakeSource::new());
    let events = Arc::new(MemoryEvents::new());
    let file_id = seed_sent_record(&source, RecordKind::Contribution, 1).await;
    let correlator = correlator(&source, &events, false);

    let envelope = success_envelope(1);
    let first = correlator
        .handle_ack(RecordKind::Contribution, &envelope)
        .await
        .unwrap();
    let second = correlator
        .handle_ack(RecordKind::Contribution, &envelope)
        .await
        .unwrap();

    assert_eq!(first, file_id);
    assert_eq!(second, file_id);
    assert_eq!(source.files()[0].records_received, 1);
}

#[tokio::test]
async fn error_ack_appends_one_error_row() {
    let source = Arc::new(FakeSource::new());
    let events = Arc::new(MemoryEvents::new());
    seed_sent_record(&source, RecordKind::Contribution, 1).await;
    let correlator = correlator(&source, &events, false);

    correlator
        .handle_ack(RecordKind::Contribution, &error_envelope(1, "Schema validation failed"))
        .await
        .unwrap();

    let errors = source.file_errors();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].record_id, 1);
    assert_eq!(errors[0].error_text, "Schema validation failed");
    // Error acks never count as received.
    assert_eq!(source.files()[0].records_received, 0);
}

#[tokio::test]
async fn duplicate_error_ack_appends_nothing() {
    let source = Arc::new(FakeSource::new());
    let events = Arc::new(MemoryEvents::new());
    seed_sent_record(&source, RecordKind::Contribution, 1).await;
    let correlator = correlator(&source, &events, false);

    let envelope = error_envelope(1, "Schema validation failed");
    correlator
        .handle_ack(RecordKind::Contribution, &envelope)
        .await
        .unwrap();
    correlator
        .handle_ack(RecordKind::Contribution, &envelope)
        .await
        .unwrap();

    assert_eq!(source.file_errors().len(), 1);
}

#[tokio::test]
async fn unknown_record_surfaces_not_found_but_still_audits() {
    let source = Arc::new(FakeSource::new());
    let events = Arc::new(MemoryEvents::new());
    let correlator = correlator(&source, &events, false);

    let err = correlator
        .handle_ack(RecordKind::Contribution, &success_envelope(99))
        .await
        .unwrap_err();

    assert!(matches!(err, DeliveryError::SourceNotFound(_)));
    // The audit pair is written whatever the outcome.
    assert_eq!(events.count(EventType::AckReceived), 1);
    assert_eq!(events.count(EventType::AckProcessing), 1);
    let entries = events.entries();
    assert!(entries.iter().all(|e| e.outcome_code == 404));
}

#[tokio::test]
async fn ack_for_uncommitted_record_is_a_conflict() {
    let source = Arc::new(FakeSource::new());
    let events = Arc::new(MemoryEvents::new());
    source.push_record(FakeSource::record(RecordKind::Contribution, 1, RecordStatus::Active));
    let correlator = correlator(&source, &events, false);

    let err = correlator
        .handle_ack(RecordKind::Contribution, &success_envelope(1))
        .await
        .unwrap_err();

    assert!(matches!(err, DeliveryError::SourceConflict(_)));
}

#[tokio::test]
async fn transient_source_failures_are_retried() {
    let source = Arc::new(FakeSource::new());
    let events = Arc::new(MemoryEvents::new());
    let file_id = seed_sent_record(&source, RecordKind::Contribution, 1).await;
    source.set_transient_ack_failures(2);
    let correlator = correlator(&source, &events, false);

    let got = correlator
        .handle_ack(RecordKind::Contribution, &success_envelope(1))
        .await
        .unwrap();

    assert_eq!(got, file_id);
    assert_eq!(source.files()[0].records_received, 1);
}

#[tokio::test]
async fn audit_pair_is_written_on_success() {
    let source = Arc::new(FakeSource::new());
    let events = Arc::new(MemoryEvents::new());
    seed_sent_record(&source, RecordKind::Contribution, 1).await;
    let correlator = correlator(&source, &events, false);

    correlator
        .handle_ack(RecordKind::Contribution, &success_envelope(1))
        .await
        .unwrap();

    assert_eq!(events.count(EventType::AckReceived), 1);
    assert_eq!(events.count(EventType::AckProcessing), 1);
    let entries = events.entries();
    assert!(entries.iter().all(|e| e.outcome_code == 200));
    // Both rows share the correlation ids of this ack.
    assert_eq!(entries[0].batch_id, entries[1].batch_id);
    assert_eq!(entries[0].trace_id, entries[1].trace_id);
}

#[tokio::test]
async fn isolated_ack_suppresses_the_mutation() {
    let source = Arc::new(FakeSource::new());
    let events = Arc::new(MemoryEvents::new());
    seed_sent_record(&source, RecordKind::Contribution, 1).await;
    let correlator = correlator(&source, &events, true);

    let got = correlator
        .handle_ack(RecordKind::Contribution, &success_envelope(1))
        .await
        .unwrap();

    assert_eq!(got, 0);
    assert_eq!(source.files()[0].records_received, 0);
    // The audit pair still lands.
    assert_eq!(events.count(EventType::AckReceived), 1);
    assert_eq!(events.count(EventType::AckProcessing), 1);
}
