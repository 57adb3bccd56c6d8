//! Schema creation for the ledgerlink tables.
//!
//! All timestamps are bound from Rust as RFC 3339 UTC; no column defaults
//! write clock values.

use crate::{LedgerDb, Result};

impl LedgerDb {
    /// Create all tables and indexes if they don't exist.
    pub(crate) async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS ll_case_record (
                kind TEXT NOT NULL,
                id INTEGER NOT NULL,
                case_id TEXT NOT NULL,
                status TEXT NOT NULL,
                payload TEXT,
                file_id INTEGER,
                ack_state TEXT,
                modified_by TEXT,
                created_at TEXT NOT NULL,
                modified_at TEXT NOT NULL,
                PRIMARY KEY (kind, id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_ll_case_record_status
            ON ll_case_record(kind, status)
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS ll_delivery_file (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                kind TEXT NOT NULL,
                file_name TEXT NOT NULL,
                record_ids TEXT NOT NULL,
                records_sent INTEGER NOT NULL,
                content TEXT NOT NULL,
                records_received INTEGER NOT NULL DEFAULT 0,
                created_by TEXT NOT NULL,
                created_at TEXT NOT NULL,
                sent_at TEXT,
                received_at TEXT,
                modified_at TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS ll_delivery_file_error (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                file_id INTEGER NOT NULL,
                record_id INTEGER NOT NULL,
                case_id TEXT NOT NULL,
                error_text TEXT NOT NULL,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS ll_migration_task (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                batch_id INTEGER NOT NULL,
                kind TEXT NOT NULL,
                case_id TEXT NOT NULL,
                record_id INTEGER NOT NULL,
                is_processed INTEGER NOT NULL DEFAULT 0,
                processed_date TEXT,
                last_http_status INTEGER,
                last_error TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_ll_migration_task_batch
            ON ll_migration_task(kind, batch_id, is_processed)
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS ll_event_log (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                event_type TEXT NOT NULL,
                batch_id TEXT NOT NULL,
                trace_id TEXT NOT NULL,
                outcome_code INTEGER NOT NULL,
                payload TEXT,
                detail TEXT,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_ll_event_log_batch
            ON ll_event_log(batch_id)
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
