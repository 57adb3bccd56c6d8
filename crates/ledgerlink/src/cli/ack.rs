//! `ledgerlink ack` - feed one confirmation envelope to the correlator.
//!
//! The envelope comes from a JSON file (the inbound webhook body shape)
//! or from the inline flags.

use anyhow::{bail, Context, Result};
use ledgerlink_protocol::{AckEnvelope, AckReport, RecordKind};
use std::path::PathBuf;

use crate::config::AppConfig;
use crate::correlator::AckCorrelator;

pub struct AckArgs {
    pub kind: RecordKind,
    pub file: Option<PathBuf>,
    pub record_id: Option<i64>,
    pub case_id: Option<String>,
    pub title: Option<String>,
    pub detail: Option<String>,
}

pub async fn run(config: &AppConfig, args: AckArgs) -> Result<()> {
    let envelope = match args.file {
        Some(path) => {
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read envelope: {}", path.display()))?;
            serde_json::from_str::<AckEnvelope>(&text)
                .with_context(|| format!("Invalid envelope JSON: {}", path.display()))?
        }
        None => {
            let (Some(record_id), Some(case_id)) = (args.record_id, args.case_id.clone()) else {
                bail!("either --file or both --record-id and --case-id are required");
            };
            AckEnvelope {
                record_id,
                case_id,
                report: AckReport {
                    title: args.title.unwrap_or_else(|| "Success".to_string()),
                    detail: args.detail.unwrap_or_default(),
                },
            }
        }
    };

    let wiring = super::wire(config).await?;
    let correlator = AckCorrelator::new(
        wiring.source,
        wiring.events,
        config.retry.ack.clone(),
        config.toggles.isolated_ack,
    );

    let file_id = correlator.handle_ack(args.kind, &envelope).await?;
    println!(
        "acknowledgement for record {} applied to file {}",
        envelope.record_id, file_id
    );

    Ok(())
}
