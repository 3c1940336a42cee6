use axum::{
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;

use crate::db::{self, Submission, SubmissionSummary};
use crate::error::AppError;
use crate::export::submissions_csv;
use crate::state::AppState;

pub async fn download_csv(State(state): State<Arc<AppState>>) -> Result<Response, AppError> {
    let rows = db::list_submissions(state.pool.as_ref()).await?;
    let body = submissions_csv(&rows)?;

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"submissions.csv\"",
            ),
        ],
        body,
    )
        .into_response())
}

pub async fn list_submissions(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<SubmissionSummary>>, AppError> {
    let rows = db::list_submissions(state.pool.as_ref()).await?;
    Ok(Json(rows))
}

pub async fn get_submission(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Submission>, AppError> {
    db::get_submission(state.pool.as_ref(), id)
        .await?
        .map(Json)
        .ok_or(AppError::NotFound { id })
}
