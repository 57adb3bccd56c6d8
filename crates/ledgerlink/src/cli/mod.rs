//! CLI commands for the ledgerlink binary.

pub mod ack;
pub mod cycle;
pub mod init;
pub mod migrate;

use anyhow::{Context, Result};
use ledgerlink_db::LedgerDb;
use std::sync::Arc;
use std::time::Duration;

use crate::adapters::{EventLog, RecordSource, Recipient};
use crate::codec::{JsonCodec, PayloadCodec};
use crate::config::AppConfig;
use crate::recipient_http::HttpRecipient;

/// Shared wiring for the commands: the SQLite adapter doubles as record
/// source and event log; the recipient is the configured HTTP endpoint.
pub struct Wiring {
    pub source: Arc<dyn RecordSource>,
    pub events: Arc<dyn EventLog>,
    pub recipient: Arc<dyn Recipient>,
    pub codec: Arc<dyn PayloadCodec>,
    pub db: LedgerDb,
}

pub async fn wire(config: &AppConfig) -> Result<Wiring> {
    let db = LedgerDb::open(&config.db_path)
        .await
        .with_context(|| format!("Failed to open database: {}", config.db_path.display()))?;

    let recipient = HttpRecipient::new(
        config.recipient.base_url.clone(),
        Duration::from_secs(config.recipient.timeout_secs),
    )
    .context("Failed to build recipient client")?;

    Ok(Wiring {
        source: Arc::new(db.clone()),
        events: Arc::new(db.clone()),
        recipient: Arc::new(recipient),
        codec: Arc::new(JsonCodec),
        db,
    })
}
