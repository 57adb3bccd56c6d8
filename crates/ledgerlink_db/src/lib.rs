//! SQLite-backed Record Source Adapter and Event Log for ledgerlink.
//!
//! This crate is the single source of truth for the persisted rows the
//! delivery engine consumes: case records, delivery files, delivery-file
//! errors, migration tasks, and the append-only event log. All engine
//! components go through [`LedgerDb`]; do not use raw sqlx elsewhere.
//!
//! # Usage
//!
//! ```rust,ignore
//! use ledgerlink_db::{LedgerDb, Result};
//!
//! let db = LedgerDb::open("~/.ledgerlink/ledgerlink.sqlite3").await?;
//!
//! let eligible = db.list_eligible(RecordKind::Contribution, RecordStatus::Active).await?;
//! let file_id = db.commit_file(kind, &content, &ids, &file_name, "scheduler").await?;
//! ```

mod error;
mod schema;

// Method implementations organized by domain
mod events;
mod migration;
mod source;

pub use error::{DbError, Result};

use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use std::path::Path;
use tracing::info;

/// Unified database handle for all ledgerlink persistence.
#[derive(Clone, Debug)]
pub struct LedgerDb {
    pool: SqlitePool,
}

impl LedgerDb {
    /// Open or create a database at the given path.
    ///
    /// Creates all tables if they don't exist.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let url = format!("sqlite:{}?mode=rwc", path.display());

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&url)
            .await?;

        let db = Self { pool };
        db.ensure_schema().await?;

        info!(path = %path.display(), "Ledger database opened");

        Ok(db)
    }

    /// Open an existing database (fails if not exists).
    pub async fn open_existing(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(DbError::not_found(format!(
                "Database not found: {}",
                path.display()
            )));
        }

        let url = format!("sqlite:{}?mode=rw", path.display());

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&url)
            .await?;

        Ok(Self { pool })
    }

    /// Open an in-memory database. A single connection so every caller
    /// sees the same store; used by tests and the isolated smoke paths.
    pub async fn open_in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        let db = Self { pool };
        db.ensure_schema().await?;
        Ok(db)
    }

    /// Get the underlying connection pool (escape hatch for complex queries).
    ///
    /// Prefer the typed methods instead.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}
