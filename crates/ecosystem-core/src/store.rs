//! Workflow persistence.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use sqlx::{Executor, Row};
use tracing::{debug, info};

use crate::{EcosystemError, WorkflowResult};

/// Row metadata for a persisted workflow.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredWorkflow {
    pub id: i64,
    pub task_id: String,
    pub created_at: DateTime<Utc>,
}

#[async_trait]
pub trait WorkflowStore: Send + Sync {
    /// Returns the new row id.
    async fn insert(&self, result: &WorkflowResult) -> Result<i64, EcosystemError>;

    /// Most recently inserted result for `task_id`.
    async fn load(&self, task_id: &str) -> Result<Option<WorkflowResult>, EcosystemError>;

    /// Newest first.
    async fn recent(&self, limit: usize) -> Result<Vec<StoredWorkflow>, EcosystemError>;
}

const CREATE_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS research_results (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        task_id TEXT NOT NULL,
        results TEXT NOT NULL,
        created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
    );
"#;

/// SQLite-backed store. The pool holds a single connection so inserts from
/// concurrent workflows are serialized.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open the database. With `reset`, the results table is dropped and
    /// recreated; prior rows are lost.
    pub async fn connect(database_url: &str, reset: bool) -> Result<Self, EcosystemError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(database_url)
            .await?;

        if reset {
            pool.execute("DROP TABLE IF EXISTS research_results;").await?;
            info!(database_url, "reset research_results table");
        }
        pool.execute(CREATE_TABLE).await?;

        Ok(Self { pool })
    }

    /// Private in-memory database for tests and dry runs.
    pub async fn in_memory() -> Result<Self, EcosystemError> {
        Self::connect("sqlite::memory:", true).await
    }
}

#[async_trait]
impl WorkflowStore for SqliteStore {
    async fn insert(&self, result: &WorkflowResult) -> Result<i64, EcosystemError> {
        let document = serde_json::to_string(result)?;
        let outcome = sqlx::query("INSERT INTO research_results (task_id, results) VALUES (?1, ?2)")
            .bind(&result.task_id)
            .bind(document)
            .execute(&self.pool)
            .await?;
        let id = outcome.last_insert_rowid();
        debug!(task_id = %result.task_id, id, "persisted workflow result");
        Ok(id)
    }

    async fn load(&self, task_id: &str) -> Result<Option<WorkflowResult>, EcosystemError> {
        let row = sqlx::query(
            "SELECT results FROM research_results WHERE task_id = ?1 ORDER BY id DESC LIMIT 1",
        )
        .bind(task_id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let document: String = row.try_get("results")?;
                Ok(Some(serde_json::from_str(&document)?))
            }
            None => Ok(None),
        }
    }

    async fn recent(&self, limit: usize) -> Result<Vec<StoredWorkflow>, EcosystemError> {
        let rows = sqlx::query(
            "SELECT id, task_id, created_at FROM research_results ORDER BY id DESC LIMIT ?1",
        )
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| -> Result<StoredWorkflow, EcosystemError> {
                let created_at: String = row.try_get("created_at")?;
                let created_at = DateTime::parse_from_rfc3339(&created_at)
                    .map(|ts| ts.with_timezone(&Utc))
                    .map_err(|err| {
                        EcosystemError::Other(anyhow::anyhow!(
                            "invalid created_at `{created_at}`: {err}"
                        ))
                    })?;
                Ok(StoredWorkflow {
                    id: row.try_get("id")?,
                    task_id: row.try_get("task_id")?,
                    created_at,
                })
            })
            .collect()
    }
}
