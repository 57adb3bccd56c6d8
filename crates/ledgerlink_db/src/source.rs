//! Record source operations: selection, the atomic file commit, and the
//! idempotent acknowledgement application.

use crate::error::{DbError, Result};
use crate::LedgerDb;
use chrono::{DateTime, Utc};
use ledgerlink_protocol::types::AckState;
use ledgerlink_protocol::{CaseRecord, DeliveryFile, DeliveryFileError, RecordKind, RecordStatus};
use sqlx::Row;

impl LedgerDb {
    // ========================================================================
    // Case Record Operations
    // ========================================================================

    /// Insert a record row. Ids are assigned by the Ledger, so the caller
    /// provides them; used by seeding, the CLI, and tests.
    pub async fn insert_record(&self, record: &CaseRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO ll_case_record
                (kind, id, case_id, status, payload, file_id, ack_state, created_at, modified_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(record.kind.as_str())
        .bind(record.id)
        .bind(&record.case_id)
        .bind(record.status.as_str())
        .bind(serde_json::to_string(&record.payload)?)
        .bind(record.file_id)
        .bind(record.ack_state.map(|s| s.as_str()))
        .bind(record.created_at)
        .bind(record.modified_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// List records of one kind in the given status, ordered by id.
    ///
    /// This is the cycle's selection query; the ordering fixes the
    /// `succeeded` ordering downstream.
    pub async fn list_eligible(
        &self,
        kind: RecordKind,
        status: RecordStatus,
    ) -> Result<Vec<CaseRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM ll_case_record
            WHERE kind = ? AND status = ?
            ORDER BY id ASC
            "#,
        )
        .bind(kind.as_str())
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_record).collect()
    }

    /// Fetch one record by kind and id.
    pub async fn get_record(&self, kind: RecordKind, id: i64) -> Result<CaseRecord> {
        let row = sqlx::query("SELECT * FROM ll_case_record WHERE kind = ? AND id = ?")
            .bind(kind.as_str())
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => row_to_record(&row),
            None => Err(DbError::not_found(format!(
                "record {}/{} does not exist",
                kind, id
            ))),
        }
    }

    /// Atomically persist a delivery file and flip every listed record to
    /// SENT with the file id attached. All-or-nothing: if any listed
    /// record is missing or already sent, nothing is changed.
    pub async fn commit_file(
        &self,
        kind: RecordKind,
        content: &str,
        record_ids: &[i64],
        file_name: &str,
        created_by: &str,
    ) -> Result<i64> {
        if record_ids.is_empty() {
            return Err(DbError::invalid_state(
                "refusing to commit a delivery file with no records",
            ));
        }

        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            INSERT INTO ll_delivery_file
                (kind, file_name, record_ids, records_sent, content, records_received,
                 created_by, created_at, sent_at)
            VALUES (?, ?, ?, ?, ?, 0, ?, ?, ?)
            "#,
        )
        .bind(kind.as_str())
        .bind(file_name)
        .bind(serde_json::to_string(record_ids)?)
        .bind(record_ids.len() as i64)
        .bind(content)
        .bind(created_by)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        let file_id = result.last_insert_rowid();

        for &record_id in record_ids {
            let updated = sqlx::query(
                r#"
                UPDATE ll_case_record
                SET status = 'SENT', file_id = ?, modified_by = ?, modified_at = ?
                WHERE kind = ? AND id = ? AND status != 'SENT'
                "#,
            )
            .bind(file_id)
            .bind(created_by)
            .bind(now)
            .bind(kind.as_str())
            .bind(record_id)
            .execute(&mut *tx)
            .await?;

            if updated.rows_affected() != 1 {
                tx.rollback().await?;
                return Err(DbError::invalid_state(format!(
                    "record {}/{} missing or already sent, commit rolled back",
                    kind, record_id
                )));
            }
        }

        tx.commit().await?;

        Ok(file_id)
    }

    /// Apply one acknowledgement outcome to a record and its owning file.
    ///
    /// Idempotent: re-applying the outcome a record already carries is a
    /// no-op. Success increments the file's `records_received` once and
    /// stamps the received time; an error inserts one delivery-file-error
    /// row instead and leaves the counter alone. Returns the owning file
    /// id in every non-error case.
    pub async fn apply_ack(
        &self,
        kind: RecordKind,
        record_id: i64,
        error_text: Option<&str>,
    ) -> Result<i64> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(
            "SELECT case_id, file_id, ack_state FROM ll_case_record WHERE kind = ? AND id = ?",
        )
        .bind(kind.as_str())
        .bind(record_id)
        .fetch_optional(&mut *tx)
        .await?;

        let row = match row {
            Some(row) => row,
            None => {
                tx.rollback().await?;
                return Err(DbError::not_found(format!(
                    "record {}/{} does not exist",
                    kind, record_id
                )));
            }
        };

        let case_id: String = row.get("case_id");
        let file_id: Option<i64> = row.get("file_id");
        let ack_state: Option<String> = row.get("ack_state");

        let file_id = match file_id {
            Some(id) => id,
            None => {
                tx.rollback().await?;
                return Err(DbError::conflict(format!(
                    "record {}/{} has no owning delivery file yet",
                    kind, record_id
                )));
            }
        };

        let target = match error_text {
            None => AckState::AcknowledgedOk,
            Some(_) => AckState::AcknowledgedError,
        };

        // Duplicate delivery of the same outcome: nothing to apply.
        if ack_state.as_deref() == Some(target.as_str()) {
            tx.rollback().await?;
            return Ok(file_id);
        }

        match error_text {
            None => {
                sqlx::query(
                    r#"
                    UPDATE ll_delivery_file
                    SET records_received = records_received + 1,
                        received_at = ?,
                        modified_at = ?
                    WHERE id = ?
                    "#,
                )
                .bind(now)
                .bind(now)
                .bind(file_id)
                .execute(&mut *tx)
                .await?;
            }
            Some(text) => {
                sqlx::query(
                    r#"
                    INSERT INTO ll_delivery_file_error
                        (file_id, record_id, case_id, error_text, created_at)
                    VALUES (?, ?, ?, ?, ?)
                    "#,
                )
                .bind(file_id)
                .bind(record_id)
                .bind(&case_id)
                .bind(text)
                .bind(now)
                .execute(&mut *tx)
                .await?;
            }
        }

        sqlx::query(
            "UPDATE ll_case_record SET ack_state = ?, modified_at = ? WHERE kind = ? AND id = ?",
        )
        .bind(target.as_str())
        .bind(now)
        .bind(kind.as_str())
        .bind(record_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(file_id)
    }

    /// FinalCost upstream step: move every WAITING_ITEMS record to
    /// REQUESTED so the next selection can pick them up.
    pub async fn trigger_global_update(&self) -> Result<bool> {
        let now = Utc::now();
        sqlx::query(
            r#"
            UPDATE ll_case_record
            SET status = 'REQUESTED', modified_at = ?
            WHERE kind = 'FINAL_COST' AND status = 'WAITING_ITEMS'
            "#,
        )
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(true)
    }

    // ========================================================================
    // Delivery File Operations
    // ========================================================================

    /// Get a delivery file by id.
    pub async fn get_file(&self, file_id: i64) -> Result<DeliveryFile> {
        let row = sqlx::query("SELECT * FROM ll_delivery_file WHERE id = ?")
            .bind(file_id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => row_to_file(&row),
            None => Err(DbError::not_found(format!(
                "delivery file {} does not exist",
                file_id
            ))),
        }
    }

    /// List the error rows recorded against one delivery file.
    pub async fn list_file_errors(&self, file_id: i64) -> Result<Vec<DeliveryFileError>> {
        let rows = sqlx::query(
            "SELECT * FROM ll_delivery_file_error WHERE file_id = ? ORDER BY id ASC",
        )
        .bind(file_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(DeliveryFileError {
                    id: row.get("id"),
                    file_id: row.get("file_id"),
                    record_id: row.get("record_id"),
                    case_id: row.get("case_id"),
                    error_text: row.get("error_text"),
                    created_at: row.get("created_at"),
                })
            })
            .collect()
    }
}

fn row_to_record(row: &sqlx::sqlite::SqliteRow) -> Result<CaseRecord> {
    let kind_str: String = row.get("kind");
    let kind: RecordKind = kind_str
        .parse()
        .map_err(|e: String| DbError::invalid_state(e))?;

    let status_str: String = row.get("status");
    let status: RecordStatus = status_str
        .parse()
        .map_err(|e: String| DbError::invalid_state(e))?;

    let ack_state: Option<String> = row.get("ack_state");
    let ack_state = match ack_state {
        Some(s) => Some(
            s.parse::<AckState>()
                .map_err(|e: String| DbError::invalid_state(e))?,
        ),
        None => None,
    };

    let payload: Option<String> = row.get("payload");
    let payload = match payload {
        Some(text) => serde_json::from_str(&text)?,
        None => serde_json::Value::Null,
    };

    let created_at: DateTime<Utc> = row.get("created_at");
    let modified_at: DateTime<Utc> = row.get("modified_at");

    Ok(CaseRecord {
        id: row.get("id"),
        kind,
        case_id: row.get("case_id"),
        status,
        payload,
        file_id: row.get("file_id"),
        ack_state,
        created_at,
        modified_at,
    })
}

fn row_to_file(row: &sqlx::sqlite::SqliteRow) -> Result<DeliveryFile> {
    let kind_str: String = row.get("kind");
    let kind: RecordKind = kind_str
        .parse()
        .map_err(|e: String| DbError::invalid_state(e))?;

    let record_ids: String = row.get("record_ids");
    let record_ids: Vec<i64> = serde_json::from_str(&record_ids)?;

    Ok(DeliveryFile {
        id: row.get("id"),
        kind,
        file_name: row.get("file_name"),
        record_ids,
        records_sent: row.get("records_sent"),
        content: row.get("content"),
        records_received: row.get("records_received"),
        created_by: row.get("created_by"),
        created_at: row.get("created_at"),
        sent_at: row.get("sent_at"),
        received_at: row.get("received_at"),
        modified_at: row.get("modified_at"),
    })
}
