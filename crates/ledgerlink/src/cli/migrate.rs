//! `ledgerlink migrate` - replay the historical backlog.

use anyhow::Result;
use std::sync::Arc;

use crate::adapters::PassthroughAnonymizer;
use crate::config::AppConfig;
use crate::migration::{MigrationConfig, MigrationEngine};

pub async fn run(config: &AppConfig) -> Result<()> {
    let wiring = super::wire(config).await?;

    let engine = MigrationEngine::new(
        wiring.source,
        wiring.recipient,
        wiring.events,
        wiring.codec,
        Arc::new(PassthroughAnonymizer),
        config.retry.contribution.clone(),
        MigrationConfig {
            workers_per_kind: config.migration.workers_per_kind,
            anonymize: config.toggles.anonymize_on_migrate,
            limit_one_per_batch: config.toggles.limited_migration_run,
            isolated_send: config.toggles.isolated_send,
        },
    );

    let report = engine.migrate().await?;

    println!(
        "migrated {} task(s) in {} ms ({:.1} tasks/s)",
        report.processed,
        report.elapsed_ms,
        report.throughput()
    );

    Ok(())
}
