//! SQLite Job Store
//!
//! jobs 表保存任务元数据，job_chapters 表保存逐章完成标记

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::FromRow;

use super::DbPool;
use crate::application::ports::{JobStoreError, JobStorePort};
use crate::domain::job::{ChapterProgress, Job, JobResult, JobStatus, OutputMode};
use crate::domain::speech::SynthesisParams;

const JOB_COLUMNS: &str = "id, book_id, book_title, voice, rate, pitch, mode, status, progress, \
     progress_text, created_at, started_at, completed_at, result_json, error_message";

/// SQLite Job Store
pub struct SqliteJobStore {
    pool: DbPool,
}

impl SqliteJobStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn load_chapters(&self, job_id: &str) -> Result<Vec<ChapterProgress>, JobStoreError> {
        let rows: Vec<ChapterRow> = sqlx::query_as(
            "SELECT chapter_order, chapter_ref, title, completed FROM job_chapters \
             WHERE job_id = ? ORDER BY chapter_order",
        )
        .bind(job_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(rows
            .into_iter()
            .map(|row| ChapterProgress {
                order: row.chapter_order as u32,
                chapter_ref: row.chapter_ref,
                title: row.title,
                completed: row.completed != 0,
            })
            .collect())
    }

    async fn hydrate(&self, rows: Vec<JobRow>) -> Result<Vec<Job>, JobStoreError> {
        let mut jobs = Vec::with_capacity(rows.len());
        for row in rows {
            let chapters = self.load_chapters(&row.id).await?;
            jobs.push(row.into_job(chapters)?);
        }
        Ok(jobs)
    }
}

fn db_error(e: sqlx::Error) -> JobStoreError {
    JobStoreError::DatabaseError(e.to_string())
}

fn parse_time(value: &str) -> Result<DateTime<Utc>, JobStoreError> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| JobStoreError::SerializationError(e.to_string()))
}

fn parse_optional_time(value: Option<String>) -> Result<Option<DateTime<Utc>>, JobStoreError> {
    value.as_deref().map(parse_time).transpose()
}

fn encode_result(result: &Option<JobResult>) -> Result<Option<String>, JobStoreError> {
    result
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .map_err(|e| JobStoreError::SerializationError(e.to_string()))
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    match e {
        sqlx::Error::Database(db) => db.is_unique_violation(),
        _ => false,
    }
}

#[derive(FromRow)]
struct JobRow {
    id: String,
    book_id: String,
    book_title: String,
    voice: String,
    rate: f64,
    pitch: f64,
    mode: String,
    status: String,
    progress: i64,
    progress_text: String,
    created_at: String,
    started_at: Option<String>,
    completed_at: Option<String>,
    result_json: Option<String>,
    error_message: Option<String>,
}

#[derive(FromRow)]
struct ChapterRow {
    chapter_order: i64,
    chapter_ref: String,
    title: String,
    completed: i64,
}

impl JobRow {
    fn into_job(self, chapters: Vec<ChapterProgress>) -> Result<Job, JobStoreError> {
        let status = JobStatus::from_str(&self.status).ok_or_else(|| {
            JobStoreError::SerializationError(format!("Unknown job status: {}", self.status))
        })?;
        let mode = OutputMode::from_str(&self.mode).ok_or_else(|| {
            JobStoreError::SerializationError(format!("Unknown output mode: {}", self.mode))
        })?;
        let result = self
            .result_json
            .as_deref()
            .map(serde_json::from_str::<JobResult>)
            .transpose()
            .map_err(|e| JobStoreError::SerializationError(e.to_string()))?;

        Ok(Job {
            id: self.id,
            book_id: self.book_id,
            book_title: self.book_title,
            params: SynthesisParams::new(self.voice, self.rate as f32, self.pitch as f32),
            mode,
            status,
            progress: self.progress.clamp(0, 100) as u8,
            progress_text: self.progress_text,
            chapters,
            created_at: parse_time(&self.created_at)?,
            started_at: parse_optional_time(self.started_at)?,
            completed_at: parse_optional_time(self.completed_at)?,
            result,
            error: self.error_message,
        })
    }
}

#[async_trait]
impl JobStorePort for SqliteJobStore {
    async fn insert(&self, job: &Job) -> Result<(), JobStoreError> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO jobs (id, book_id, book_title, voice, rate, pitch, mode, status, progress,
                              progress_text, created_at, started_at, completed_at, result_json, error_message)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&job.id)
        .bind(&job.book_id)
        .bind(&job.book_title)
        .bind(&job.params.voice)
        .bind(job.params.rate as f64)
        .bind(job.params.pitch as f64)
        .bind(job.mode.as_str())
        .bind(job.status.as_str())
        .bind(job.progress as i64)
        .bind(&job.progress_text)
        .bind(job.created_at.to_rfc3339())
        .bind(job.started_at.map(|t| t.to_rfc3339()))
        .bind(job.completed_at.map(|t| t.to_rfc3339()))
        .bind(encode_result(&job.result)?)
        .bind(&job.error)
        .execute(&mut *tx)
        .await;

        if let Err(e) = inserted {
            if is_unique_violation(&e) {
                return Err(JobStoreError::Conflict(format!(
                    "{} ({}, {})",
                    job.book_id,
                    job.params.key(),
                    job.mode.as_str()
                )));
            }
            return Err(db_error(e));
        }

        for chapter in &job.chapters {
            sqlx::query(
                "INSERT INTO job_chapters (job_id, chapter_order, chapter_ref, title, completed) \
                 VALUES (?, ?, ?, ?, ?)",
            )
            .bind(&job.id)
            .bind(chapter.order as i64)
            .bind(&chapter.chapter_ref)
            .bind(&chapter.title)
            .bind(chapter.completed as i64)
            .execute(&mut *tx)
            .await
            .map_err(db_error)?;
        }

        tx.commit().await.map_err(db_error)?;

        tracing::debug!(job_id = %job.id, chapters = job.chapters.len(), "Job inserted");
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Job>, JobStoreError> {
        let row: Option<JobRow> = sqlx::query_as(&format!("SELECT {} FROM jobs WHERE id = ?", JOB_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?;

        match row {
            Some(row) => {
                let chapters = self.load_chapters(&row.id).await?;
                Ok(Some(row.into_job(chapters)?))
            }
            None => Ok(None),
        }
    }

    async fn find_all(&self) -> Result<Vec<Job>, JobStoreError> {
        let rows: Vec<JobRow> = sqlx::query_as(&format!(
            "SELECT {} FROM jobs ORDER BY created_at DESC",
            JOB_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        self.hydrate(rows).await
    }

    async fn find_incomplete(
        &self,
        book_id: &str,
        params: &SynthesisParams,
        mode: OutputMode,
    ) -> Result<Option<Job>, JobStoreError> {
        let row: Option<JobRow> = sqlx::query_as(&format!(
            "SELECT {} FROM jobs WHERE book_id = ? AND voice = ? AND rate = ? AND pitch = ? \
             AND mode = ? AND status != 'completed' ORDER BY created_at DESC LIMIT 1",
            JOB_COLUMNS
        ))
        .bind(book_id)
        .bind(&params.voice)
        .bind(params.rate as f64)
        .bind(params.pitch as f64)
        .bind(mode.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;

        match row {
            Some(row) => {
                let chapters = self.load_chapters(&row.id).await?;
                Ok(Some(row.into_job(chapters)?))
            }
            None => Ok(None),
        }
    }

    async fn find_interrupted(&self) -> Result<Vec<Job>, JobStoreError> {
        let rows: Vec<JobRow> = sqlx::query_as(&format!(
            "SELECT {} FROM jobs WHERE status IN ('pending', 'running') ORDER BY created_at",
            JOB_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        self.hydrate(rows).await
    }

    async fn save(&self, job: &Job) -> Result<bool, JobStoreError> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;

        let updated = sqlx::query(
            r#"
            UPDATE jobs SET
                book_title = ?,
                status = ?,
                progress = ?,
                progress_text = ?,
                started_at = ?,
                completed_at = ?,
                result_json = ?,
                error_message = ?
            WHERE id = ?
            "#,
        )
        .bind(&job.book_title)
        .bind(job.status.as_str())
        .bind(job.progress as i64)
        .bind(&job.progress_text)
        .bind(job.started_at.map(|t| t.to_rfc3339()))
        .bind(job.completed_at.map(|t| t.to_rfc3339()))
        .bind(encode_result(&job.result)?)
        .bind(&job.error)
        .bind(&job.id)
        .execute(&mut *tx)
        .await
        .map_err(db_error)?;

        if updated.rows_affected() == 0 {
            // 任务已被删除
            return Ok(false);
        }

        for chapter in &job.chapters {
            sqlx::query(
                "UPDATE job_chapters SET completed = ? WHERE job_id = ? AND chapter_order = ?",
            )
            .bind(chapter.completed as i64)
            .bind(&job.id)
            .bind(chapter.order as i64)
            .execute(&mut *tx)
            .await
            .map_err(db_error)?;
        }

        tx.commit().await.map_err(db_error)?;
        Ok(true)
    }

    async fn delete(&self, id: &str) -> Result<bool, JobStoreError> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;

        sqlx::query("DELETE FROM job_chapters WHERE job_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(db_error)?;

        let deleted = sqlx::query("DELETE FROM jobs WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(db_error)?;

        tx.commit().await.map_err(db_error)?;
        Ok(deleted.rows_affected() > 0)
    }
}
