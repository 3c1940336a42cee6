use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Submission {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub course: String,
    pub assignment_text: String,
    pub rubric_text: String,
    pub ai_feedback: Option<String>,
    pub scorecard_json: Option<String>,
    pub computed_score: f64,
    pub computed_grade: String,
    pub submitted_at: DateTime<Utc>,
}

/// A submission ready to insert; id and timestamp are assigned by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewSubmission {
    pub name: String,
    pub email: String,
    pub course: String,
    pub assignment_text: String,
    pub rubric_text: String,
    pub ai_feedback: String,
    pub scorecard_json: String,
    pub computed_score: f64,
    pub computed_grade: String,
}

/// One row of the submission log.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct SubmissionSummary {
    pub name: String,
    pub email: String,
    pub course: String,
    pub computed_score: f64,
    pub computed_grade: String,
    pub submitted_at: DateTime<Utc>,
}
