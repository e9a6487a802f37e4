//! Persistent job bookkeeping over SQLite.
//!
//! The store exclusively owns `job` and `job_status_event` persistence; the
//! orchestrator never caches job state beyond a single pass. Derived-record
//! cleanup touches the configured dependent tables and nothing else.

pub mod job;

use std::future::Future;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};

use crate::config::DependentTable;
use crate::error::{MapfarmError, Result};

pub use job::{JobRecord, JobStatus, MappingTask, ProcessEvent};

#[derive(Debug)]
pub struct StatusStore {
    pool: SqlitePool,
    url: String,
    dependent_tables: Vec<DependentTable>,
}

impl StatusStore {
    /// Open (creating if missing) the status database at `url`, e.g.
    /// `sqlite:mapping.db` or `sqlite::memory:`.
    pub async fn connect(url: &str, dependent_tables: Vec<DependentTable>) -> Result<Self> {
        let pool = Self::open_pool(url).await?;
        Self::init_schema(&pool).await?;
        Ok(Self {
            pool,
            url: url.to_string(),
            dependent_tables,
        })
    }

    /// In-memory store, used by tests and farm-less dry runs.
    pub async fn in_memory(dependent_tables: Vec<DependentTable>) -> Result<Self> {
        Self::connect("sqlite::memory:", dependent_tables).await
    }

    async fn open_pool(url: &str) -> Result<SqlitePool> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(MapfarmError::Store)?
            .create_if_missing(true);
        // An in-memory database lives and dies with its connection, so it
        // must not be spread across a pool.
        let max_connections = if Self::url_is_in_memory(url) { 1 } else { 5 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;
        Ok(pool)
    }

    fn url_is_in_memory(url: &str) -> bool {
        url.contains(":memory:") || url.contains("mode=memory")
    }

    async fn init_schema(pool: &SqlitePool) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS job (
                job_id       TEXT NOT NULL,
                array_index  INTEGER NOT NULL,
                method       TEXT NOT NULL,
                command_line TEXT NOT NULL,
                status       TEXT NOT NULL,
                map_file     TEXT NOT NULL,
                out_file     TEXT NOT NULL,
                err_file     TEXT NOT NULL,
                root_dir     TEXT NOT NULL,
                range_start  INTEGER,
                range_end    INTEGER,
                PRIMARY KEY (job_id, array_index)
            )
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS job_status_event (
                status_tag  TEXT NOT NULL,
                recorded_at TEXT NOT NULL
            )
            "#,
        )
        .execute(pool)
        .await?;

        Ok(())
    }

    /// Direct pool access, for callers that need tables outside the store's
    /// own schema (dependent-table setup in tests, ad-hoc inspection).
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn insert_job(&self, job: &JobRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO job
                (job_id, array_index, method, command_line, status,
                 map_file, out_file, err_file, root_dir, range_start, range_end)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&job.job_id)
        .bind(job.array_index)
        .bind(&job.method)
        .bind(&job.command_line)
        .bind(job.status.as_str())
        .bind(job.map_file.to_string_lossy().into_owned())
        .bind(job.out_file.to_string_lossy().into_owned())
        .bind(job.err_file.to_string_lossy().into_owned())
        .bind(job.root_dir.to_string_lossy().into_owned())
        .bind(job.range_start)
        .bind(job.range_end)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn job(&self, job_id: &str, array_index: i64) -> Result<Option<JobRecord>> {
        let row = sqlx::query("SELECT * FROM job WHERE job_id = ? AND array_index = ?")
            .bind(job_id)
            .bind(array_index)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| Self::job_from_row(&r)).transpose()
    }

    pub async fn all_jobs(&self) -> Result<Vec<JobRecord>> {
        let rows = sqlx::query("SELECT * FROM job ORDER BY job_id, array_index")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(Self::job_from_row).collect()
    }

    /// Jobs whose accounting status is FAILED, in stable order.
    pub async fn failed_jobs(&self) -> Result<Vec<JobRecord>> {
        let rows = sqlx::query("SELECT * FROM job WHERE status = ? ORDER BY job_id, array_index")
            .bind(JobStatus::Failed.as_str())
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(Self::job_from_row).collect()
    }

    pub async fn update_status(
        &self,
        job_id: &str,
        array_index: i64,
        status: JobStatus,
    ) -> Result<()> {
        sqlx::query("UPDATE job SET status = ? WHERE job_id = ? AND array_index = ?")
            .bind(status.as_str())
            .bind(job_id)
            .bind(array_index)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Record the affected-record range. Farm accounting is the usual writer;
    /// both-`None` and one-sided states are representable on purpose so the
    /// recovery engine can observe anomalies instead of masking them.
    pub async fn set_affected_range(
        &self,
        job_id: &str,
        array_index: i64,
        range_start: Option<i64>,
        range_end: Option<i64>,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE job SET range_start = ?, range_end = ? WHERE job_id = ? AND array_index = ?",
        )
        .bind(range_start)
        .bind(range_end)
        .bind(job_id)
        .bind(array_index)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Null out both range fields so a future successful run can set them
    /// afresh.
    pub async fn clear_affected_range(&self, job_id: &str, array_index: i64) -> Result<()> {
        self.set_affected_range(job_id, array_index, None, None)
            .await
    }

    /// Rewrite a resubmitted job's identity: the farm assigned a new job
    /// name, the array index is unchanged, and the row goes back to
    /// SUBMITTED.
    pub async fn reassign_job(
        &self,
        job_id: &str,
        array_index: i64,
        new_job_id: &str,
    ) -> Result<()> {
        sqlx::query("UPDATE job SET job_id = ?, status = ? WHERE job_id = ? AND array_index = ?")
            .bind(new_job_id)
            .bind(JobStatus::Submitted.as_str())
            .bind(job_id)
            .bind(array_index)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Delete every derived record with key in `[start, end]` from every
    /// configured dependent table. Returns the total number of rows removed.
    pub async fn delete_derived_range(&self, start: i64, end: i64) -> Result<u64> {
        let mut deleted = 0;
        for dep in &self.dependent_tables {
            let sql = format!(
                "DELETE FROM {} WHERE {} BETWEEN ? AND ?",
                dep.table, dep.key_column
            );
            let result = sqlx::query(&sql)
                .bind(start)
                .bind(end)
                .execute(&self.pool)
                .await?;
            deleted += result.rows_affected();
        }
        Ok(deleted)
    }

    /// Append one milestone to the process-event log.
    pub async fn record_event(&self, status_tag: &str) -> Result<()> {
        sqlx::query("INSERT INTO job_status_event (status_tag, recorded_at) VALUES (?, ?)")
            .bind(status_tag)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn events(&self) -> Result<Vec<ProcessEvent>> {
        let rows = sqlx::query("SELECT status_tag, recorded_at FROM job_status_event ORDER BY rowid")
            .fetch_all(&self.pool)
            .await?;
        rows.iter()
            .map(|row| {
                Ok(ProcessEvent {
                    status_tag: row.try_get("status_tag")?,
                    recorded_at: row.try_get::<DateTime<Utc>, _>("recorded_at")?,
                })
            })
            .collect()
    }

    /// Run `fut` with the database connections released, reopening them once
    /// it resolves. Farm waits can span hours; holding idle connections open
    /// across them is wasteful. In-memory databases are exempt, since
    /// closing the last connection would drop the data.
    pub async fn suspended<T, F>(&mut self, fut: F) -> Result<T>
    where
        F: Future<Output = T>,
    {
        if Self::url_is_in_memory(&self.url) {
            return Ok(fut.await);
        }
        self.pool.close().await;
        let output = fut.await;
        self.pool = Self::open_pool(&self.url).await?;
        Ok(output)
    }

    fn job_from_row(row: &SqliteRow) -> Result<JobRecord> {
        let status_text: String = row.try_get("status")?;
        let status = JobStatus::parse(&status_text)
            .ok_or_else(|| MapfarmError::Decode(format!("unknown job status {status_text:?}")))?;
        Ok(JobRecord {
            job_id: row.try_get("job_id")?,
            array_index: row.try_get("array_index")?,
            method: row.try_get("method")?,
            command_line: row.try_get("command_line")?,
            status,
            map_file: PathBuf::from(row.try_get::<String, _>("map_file")?),
            out_file: PathBuf::from(row.try_get::<String, _>("out_file")?),
            err_file: PathBuf::from(row.try_get::<String, _>("err_file")?),
            root_dir: PathBuf::from(row.try_get::<String, _>("root_dir")?),
            range_start: row.try_get("range_start")?,
            range_end: row.try_get("range_end")?,
        })
    }
}
