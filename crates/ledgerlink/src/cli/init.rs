//! `ledgerlink init` - create the database schema.

use anyhow::{Context, Result};
use ledgerlink_db::LedgerDb;

use crate::config::AppConfig;

pub async fn run(config: &AppConfig) -> Result<()> {
    let db = LedgerDb::open(&config.db_path)
        .await
        .with_context(|| format!("Failed to initialize: {}", config.db_path.display()))?;
    drop(db);

    println!("Initialized database at {}", config.db_path.display());
    Ok(())
}
