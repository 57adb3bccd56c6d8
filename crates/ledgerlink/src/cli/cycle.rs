//! `ledgerlink cycle <kind>` - run one delivery cycle.

use anyhow::Result;
use ledgerlink_protocol::RecordKind;

use crate::config::AppConfig;
use crate::pipeline::{DeliveryPipeline, PipelineConfig};

pub async fn run(config: &AppConfig, kind: RecordKind) -> Result<()> {
    let wiring = super::wire(config).await?;

    let pipeline = DeliveryPipeline::new(
        wiring.source,
        wiring.recipient,
        wiring.events,
        wiring.codec,
        PipelineConfig {
            created_by: config.created_by.clone(),
            isolated_send: config.toggles.isolated_send,
            contribution_retry: config.retry.contribution.clone(),
            final_cost_retry: config.retry.final_cost.clone(),
        },
    );

    let report = pipeline.run_cycle(kind).await?;

    match report.file_id {
        Some(file_id) => println!(
            "{}: sent {} record(s) in file {}",
            kind, report.records_sent, file_id
        ),
        None => println!("{}: nothing sent, no file created", kind),
    }

    Ok(())
}
