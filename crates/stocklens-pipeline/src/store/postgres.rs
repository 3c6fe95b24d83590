//! Postgres state store
//!
//! Single-row atomic updates over the `datasets`, `processing_logs`, and
//! `analysis_results` tables (schema under `migrations/`). All writes are
//! absolute value sets; there are no increments or compare-and-swaps.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::PgPool;
use stocklens_common::StocklensError;
use uuid::Uuid;

use crate::model::{AnalysisResult, Dataset, DatasetStatus, NewDataset, ProcessingLogEntry, StepStatus};
use crate::store::StateStore;

/// Postgres-backed [`StateStore`]
#[derive(Clone)]
pub struct PgStateStore {
    pool: PgPool,
}

impl PgStateStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Apply the bundled migrations
    pub async fn migrate(&self) -> Result<(), StocklensError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StocklensError::Database(e.to_string()))
    }
}

fn db_err(e: sqlx::Error) -> StocklensError {
    StocklensError::Database(e.to_string())
}

#[derive(sqlx::FromRow)]
struct DatasetRow {
    id: Uuid,
    file_name: String,
    source_location: String,
    size_bytes: i64,
    status: String,
    workflow_id: Option<String>,
    metadata: Option<Value>,
    deleted_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<DatasetRow> for Dataset {
    fn from(row: DatasetRow) -> Self {
        Dataset {
            id: row.id,
            file_name: row.file_name,
            source_location: row.source_location,
            size_bytes: row.size_bytes,
            status: DatasetStatus::from(row.status),
            workflow_id: row.workflow_id,
            metadata: row.metadata,
            deleted_at: row.deleted_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct LogRow {
    id: Uuid,
    dataset_id: Uuid,
    step: String,
    status: String,
    message: String,
    created_at: DateTime<Utc>,
}

impl From<LogRow> for ProcessingLogEntry {
    fn from(row: LogRow) -> Self {
        ProcessingLogEntry {
            id: row.id,
            dataset_id: row.dataset_id,
            step: row.step,
            status: StepStatus::from(row.status),
            message: row.message,
            created_at: row.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct AnalysisRow {
    id: Uuid,
    dataset_id: Uuid,
    results: Value,
    created_at: DateTime<Utc>,
}

impl From<AnalysisRow> for AnalysisResult {
    fn from(row: AnalysisRow) -> Self {
        AnalysisResult {
            id: row.id,
            dataset_id: row.dataset_id,
            results: row.results,
            created_at: row.created_at,
        }
    }
}

#[async_trait]
impl StateStore for PgStateStore {
    async fn create_dataset(&self, new: NewDataset) -> Result<Dataset, StocklensError> {
        let row: DatasetRow = sqlx::query_as(
            r#"
            INSERT INTO datasets (id, file_name, source_location, size_bytes, status)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, file_name, source_location, size_bytes, status,
                      workflow_id, metadata, deleted_at, created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&new.file_name)
        .bind(&new.source_location)
        .bind(new.size_bytes)
        .bind(DatasetStatus::Uploaded.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(row.into())
    }

    async fn get_dataset(&self, id: Uuid) -> Result<Option<Dataset>, StocklensError> {
        let row: Option<DatasetRow> = sqlx::query_as(
            r#"
            SELECT id, file_name, source_location, size_bytes, status,
                   workflow_id, metadata, deleted_at, created_at, updated_at
            FROM datasets
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(row.map(Into::into))
    }

    async fn set_status(
        &self,
        id: Uuid,
        status: DatasetStatus,
        workflow_id: Option<&str>,
    ) -> Result<(), StocklensError> {
        // One statement either way so status and workflow_id can never be
        // observed half-updated
        match workflow_id {
            Some(workflow_id) => {
                sqlx::query(
                    "UPDATE datasets SET status = $2, workflow_id = $3, updated_at = NOW() WHERE id = $1",
                )
                .bind(id)
                .bind(status.as_str())
                .bind(workflow_id)
                .execute(&self.pool)
                .await
                .map_err(db_err)?;
            }
            None => {
                sqlx::query("UPDATE datasets SET status = $2, updated_at = NOW() WHERE id = $1")
                    .bind(id)
                    .bind(status.as_str())
                    .execute(&self.pool)
                    .await
                    .map_err(db_err)?;
            }
        }
        Ok(())
    }

    async fn set_status_and_metadata(
        &self,
        id: Uuid,
        status: DatasetStatus,
        workflow_id: Option<&str>,
        metadata: Value,
    ) -> Result<(), StocklensError> {
        sqlx::query(
            r#"
            UPDATE datasets
            SET status = $2,
                workflow_id = COALESCE($3, workflow_id),
                metadata = $4,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(status.as_str())
        .bind(workflow_id)
        .bind(metadata)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn soft_delete_dataset(&self, id: Uuid) -> Result<(), StocklensError> {
        sqlx::query("UPDATE datasets SET deleted_at = NOW(), updated_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn append_log(
        &self,
        dataset_id: Uuid,
        step: &str,
        status: StepStatus,
        message: &str,
    ) -> Result<(), StocklensError> {
        sqlx::query(
            r#"
            INSERT INTO processing_logs (id, dataset_id, step, status, message)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(dataset_id)
        .bind(step)
        .bind(status.as_str())
        .bind(message)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn recent_logs(
        &self,
        dataset_id: Uuid,
        limit: usize,
    ) -> Result<Vec<ProcessingLogEntry>, StocklensError> {
        let rows: Vec<LogRow> = sqlx::query_as(
            r#"
            SELECT id, dataset_id, step, status, message, created_at
            FROM processing_logs
            WHERE dataset_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(dataset_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn insert_analysis(
        &self,
        dataset_id: Uuid,
        results: Value,
    ) -> Result<AnalysisResult, StocklensError> {
        let row: AnalysisRow = sqlx::query_as(
            r#"
            INSERT INTO analysis_results (id, dataset_id, results)
            VALUES ($1, $2, $3)
            RETURNING id, dataset_id, results, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(dataset_id)
        .bind(results)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(row.into())
    }

    async fn latest_analysis(
        &self,
        dataset_id: Uuid,
    ) -> Result<Option<AnalysisResult>, StocklensError> {
        let row: Option<AnalysisRow> = sqlx::query_as(
            r#"
            SELECT id, dataset_id, results, created_at
            FROM analysis_results
            WHERE dataset_id = $1
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(dataset_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(row.map(Into::into))
    }
}
