//! Migration task operations (backlog replay bookkeeping).

use crate::error::{DbError, Result};
use crate::LedgerDb;
use chrono::{DateTime, Utc};
use ledgerlink_protocol::{MigrationTask, RecordKind};
use sqlx::Row;

impl LedgerDb {
    /// Create one migration task. Tasks are normally bulk-seeded ahead of
    /// a migration run.
    pub async fn create_migration_task(
        &self,
        batch_id: i64,
        kind: RecordKind,
        case_id: &str,
        record_id: i64,
    ) -> Result<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO ll_migration_task (batch_id, kind, case_id, record_id, is_processed)
            VALUES (?, ?, ?, ?, 0)
            "#,
        )
        .bind(batch_id)
        .bind(kind.as_str())
        .bind(case_id)
        .bind(record_id)
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// List the unprocessed tasks of one kind in one batch, ordered by id.
    pub async fn list_unprocessed_tasks(
        &self,
        batch_id: i64,
        kind: RecordKind,
    ) -> Result<Vec<MigrationTask>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM ll_migration_task
            WHERE batch_id = ? AND kind = ? AND is_processed = 0
            ORDER BY id ASC
            "#,
        )
        .bind(batch_id)
        .bind(kind.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_task).collect()
    }

    /// Mark a task processed with its outcome. Called exactly once per
    /// replay attempt, success or terminal failure.
    pub async fn mark_task_processed(
        &self,
        task_id: i64,
        http_status: Option<i64>,
        error: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE ll_migration_task
            SET is_processed = 1,
                processed_date = ?,
                last_http_status = ?,
                last_error = ?
            WHERE id = ?
            "#,
        )
        .bind(Utc::now())
        .bind(http_status)
        .bind(error)
        .bind(task_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Highest batch id present, across both kinds. `None` when the
    /// backlog is empty. Captured once per run as the snapshot boundary.
    pub async fn max_batch_id(&self) -> Result<Option<i64>> {
        let row = sqlx::query("SELECT MAX(batch_id) AS max_batch FROM ll_migration_task")
            .fetch_one(&self.pool)
            .await?;

        Ok(row.get::<Option<i64>, _>("max_batch"))
    }

    /// Count of tasks still unprocessed, for reporting.
    pub async fn count_unprocessed_tasks(&self) -> Result<u64> {
        let row =
            sqlx::query("SELECT COUNT(*) AS remaining FROM ll_migration_task WHERE is_processed = 0")
                .fetch_one(&self.pool)
                .await?;

        Ok(row.get::<i64, _>("remaining") as u64)
    }
}

fn row_to_task(row: &sqlx::sqlite::SqliteRow) -> Result<MigrationTask> {
    let kind_str: String = row.get("kind");
    let kind: RecordKind = kind_str
        .parse()
        .map_err(|e: String| DbError::invalid_state(e))?;

    let processed_date: Option<DateTime<Utc>> = row.get("processed_date");

    Ok(MigrationTask {
        id: row.get("id"),
        batch_id: row.get("batch_id"),
        kind,
        case_id: row.get("case_id"),
        record_id: row.get("record_id"),
        is_processed: row.get::<i64, _>("is_processed") != 0,
        processed_date,
        last_http_status: row.get("last_http_status"),
        last_error: row.get("last_error"),
    })
}
