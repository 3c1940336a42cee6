mod models;

pub use models::*;

use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use std::sync::Arc;

use crate::error::StorageError;

pub type DbPool = Arc<SqlitePool>;

/// `submitted_at` is written in SQLite's `CURRENT_TIMESTAMP` layout (plus
/// fractional seconds) so new rows sort as text alongside rows that took
/// the column default.
const STORED_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

pub async fn create_pool(database_url: &str) -> Result<DbPool, StorageError> {
    let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    Ok(Arc::new(pool))
}

/// Creates the submissions table if it is not there yet. Safe to run
/// against a database that already has it.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), StorageError> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Appends a submission and returns its id.
pub async fn insert_submission(
    pool: &SqlitePool,
    submission: &NewSubmission,
) -> Result<i64, StorageError> {
    let result = sqlx::query(
        r#"
        INSERT INTO submissions
            (name, email, course, assignment_text, rubric_text, ai_feedback,
             scorecard_json, computed_score, computed_grade, submitted_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&submission.name)
    .bind(&submission.email)
    .bind(&submission.course)
    .bind(&submission.assignment_text)
    .bind(&submission.rubric_text)
    .bind(&submission.ai_feedback)
    .bind(&submission.scorecard_json)
    .bind(submission.computed_score)
    .bind(&submission.computed_grade)
    .bind(Utc::now().format(STORED_TIMESTAMP_FORMAT).to_string())
    .execute(pool)
    .await?;

    Ok(result.last_insert_rowid())
}

/// The submission log, newest first.
pub async fn list_submissions(pool: &SqlitePool) -> Result<Vec<SubmissionSummary>, StorageError> {
    let rows = sqlx::query_as::<_, SubmissionSummary>(
        r#"
        SELECT name, email, course, computed_score, computed_grade, submitted_at
        FROM submissions
        ORDER BY submitted_at DESC, id DESC
        "#,
    )
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn get_submission(pool: &SqlitePool, id: i64) -> Result<Option<Submission>, StorageError> {
    let row = sqlx::query_as::<_, Submission>("SELECT * FROM submissions WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(row)
}

#[cfg(test)]
pub(crate) async fn memory_pool() -> DbPool {
    // A single long-lived connection: every new in-memory connection would
    // be a separate empty database.
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    run_migrations(&pool).await.unwrap();
    Arc::new(pool)
}
