use axum::{
    extract::{multipart::MultipartError, Multipart, Path, State},
    response::{Html, IntoResponse, Redirect, Response},
    Form,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tera::Context;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::db::{self, SubmissionSummary};
use crate::export::TIMESTAMP_FORMAT;
use crate::extract::resolve_mime;
use crate::score::format_score;
use crate::state::AppState;
use crate::workflow::{
    AssignmentDraft, FormFields, IntakeForm, Notice, Scoring, UploadedFile, WorkflowSession,
};

pub async fn index(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let session_id = state.sessions.open();
    Redirect::to(&session_path(session_id))
}

/// Everything the session page shows about one session, copied out so the
/// session lock is not held while rendering.
#[derive(Serialize)]
struct SessionView {
    workflow_state: &'static str,
    notice: Option<Notice>,
    form: FormFields,
    draft: Option<AssignmentDraft>,
    prompt: Option<String>,
    scoring: Option<Scoring>,
    score_display: Option<String>,
}

impl SessionView {
    fn capture(session: &mut WorkflowSession, state: &AppState) -> Self {
        let scoring = session.scoring().cloned();
        Self {
            workflow_state: session.state().name(),
            notice: session.take_notice(),
            form: session.form().clone(),
            draft: session.draft().cloned(),
            prompt: session.prompt(&state.config.weights),
            score_display: scoring.as_ref().map(|s| format_score(s.score)),
            scoring,
        }
    }
}

#[derive(Serialize)]
struct LogRow {
    name: String,
    email: String,
    course: String,
    score: String,
    grade: String,
    submitted_at: String,
}

impl From<SubmissionSummary> for LogRow {
    fn from(row: SubmissionSummary) -> Self {
        Self {
            score: format_score(row.computed_score),
            submitted_at: row.submitted_at.format(TIMESTAMP_FORMAT).to_string(),
            name: row.name,
            email: row.email,
            course: row.course,
            grade: row.computed_grade,
        }
    }
}

pub async fn view_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Response {
    let Some(id) = parse_session_id(&session_id) else {
        return Redirect::to("/").into_response();
    };
    let Some(mut view) = state
        .sessions
        .with(id, |session| SessionView::capture(session, &state))
    else {
        return Redirect::to("/").into_response();
    };

    let submissions: Vec<LogRow> = match db::list_submissions(state.pool.as_ref()).await {
        Ok(rows) => rows.into_iter().map(LogRow::from).collect(),
        Err(e) => {
            error!("Failed to load submission log: {}", e);
            if view.notice.is_none() {
                view.notice = Some(Notice::Error("Failed to load the submission log.".to_string()));
            }
            Vec::new()
        }
    };

    let mut ctx = Context::new();
    ctx.insert("session_id", &id.to_string());
    ctx.insert("workflow_state", &view.workflow_state);
    ctx.insert("notice", &view.notice);
    ctx.insert("form", &view.form);
    ctx.insert("courses", &state.config.courses);
    ctx.insert("draft", &view.draft);
    ctx.insert("prompt", &view.prompt);
    ctx.insert("chat_url", &state.config.chat_url);
    ctx.insert("scoring", &view.scoring);
    ctx.insert("score_display", &view.score_display);
    ctx.insert("submissions", &submissions);

    render_template("session.html", ctx).into_response()
}

pub async fn process_handler(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    mut multipart: Multipart,
) -> Response {
    let Some(id) = live_session(&state, &session_id) else {
        return Redirect::to("/").into_response();
    };

    let mut form = IntakeForm::default();
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => return upload_failed(&state, id, e),
        };

        let name = field.name().unwrap_or("").to_string();
        let slot = match name.as_str() {
            "name" => &mut form.fields.name,
            "email" => &mut form.fields.email,
            "course" => &mut form.fields.course,
            "rubric_text" => &mut form.fields.rubric_text,
            "file" => {
                let filename = field.file_name().unwrap_or("").to_string();
                let mime = resolve_mime(field.content_type(), &filename);
                match field.bytes().await {
                    Ok(data) => {
                        form.file = Some(UploadedFile {
                            filename,
                            mime,
                            bytes: data.to_vec(),
                        })
                    }
                    Err(e) => return upload_failed(&state, id, e),
                }
                continue;
            }
            _ => continue,
        };
        match field.text().await {
            Ok(text) => *slot = text,
            Err(e) => return upload_failed(&state, id, e),
        }
    }

    // Extraction is CPU-bound: run it off the async workers and without
    // holding the session store.
    let fields = form.fields.clone();
    let outcome = match tokio::task::spawn_blocking(move || form.into_draft()).await {
        Ok(outcome) => outcome,
        Err(e) => {
            error!("Extraction task failed: {}", e);
            state.sessions.with(id, |session| {
                session.notify(Notice::Error("Failed to process the assignment.".to_string()))
            });
            return Redirect::to(&session_path(id)).into_response();
        }
    };

    let applied = state.sessions.with(id, |session| {
        let notice = match session.apply_intake(fields, outcome) {
            Ok(()) => Notice::Success("Assignment processed.".to_string()),
            Err(e) => Notice::Warning(e.to_string()),
        };
        session.notify(notice);
    });

    match applied {
        Some(()) => Redirect::to(&session_path(id)).into_response(),
        None => Redirect::to("/").into_response(),
    }
}

fn upload_failed(state: &AppState, id: Uuid, e: MultipartError) -> Response {
    warn!("Failed to read upload: {}", e);
    state.sessions.with(id, |session| {
        session.notify(Notice::Error(format!("Upload failed: {}", e)))
    });
    Redirect::to(&session_path(id)).into_response()
}

#[derive(Deserialize)]
pub struct ScorecardForm {
    #[serde(default)]
    scorecard: String,
    #[serde(default)]
    feedback: String,
}

pub async fn scorecard_handler(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    Form(form): Form<ScorecardForm>,
) -> Response {
    let Some(id) = parse_session_id(&session_id) else {
        return Redirect::to("/").into_response();
    };

    let found = state.sessions.with(id, |session| {
        let notice = match session.enter_scorecard(
            &form.scorecard,
            &form.feedback,
            &state.config.weights,
        ) {
            Ok(Some(_)) => None,
            Ok(None) => Some(Notice::Warning(
                "Paste a JSON scorecard to compute a score.".to_string(),
            )),
            Err(e) => Some(Notice::Warning(e.to_string())),
        };
        if let Some(notice) = notice {
            session.notify(notice);
        }
    });

    match found {
        Some(()) => Redirect::to(&session_path(id)).into_response(),
        None => Redirect::to("/").into_response(),
    }
}

pub async fn save_handler(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Response {
    let Some(id) = parse_session_id(&session_id) else {
        return Redirect::to("/").into_response();
    };

    let pending = match state.sessions.with(id, |session| session.pending_submission()) {
        None => return Redirect::to("/").into_response(),
        Some(Err(e)) => {
            state
                .sessions
                .with(id, |session| session.notify(Notice::Warning(e.to_string())));
            return Redirect::to(&session_path(id)).into_response();
        }
        Some(Ok(pending)) => pending,
    };

    match db::insert_submission(state.pool.as_ref(), &pending).await {
        Ok(row_id) => {
            info!(
                id = row_id,
                name = %pending.name,
                course = %pending.course,
                score = pending.computed_score,
                grade = %pending.computed_grade,
                "Submission saved"
            );
            let notice = Notice::Success("Submission and grade saved.".to_string());
            match state.sessions.retire(id, Some(notice)) {
                Some(fresh) => Redirect::to(&session_path(fresh)).into_response(),
                None => Redirect::to("/").into_response(),
            }
        }
        Err(e) => {
            error!("Failed to save submission: {}", e);
            state.sessions.with(id, |session| {
                session.notify(Notice::Error(format!("Failed to save submission: {}", e)))
            });
            Redirect::to(&session_path(id)).into_response()
        }
    }
}

pub async fn reset_handler(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Response {
    let fresh = parse_session_id(&session_id).and_then(|id| state.sessions.retire(id, None));
    match fresh {
        Some(fresh) => Redirect::to(&session_path(fresh)).into_response(),
        None => Redirect::to("/").into_response(),
    }
}

fn session_path(id: Uuid) -> String {
    format!("/session/{}", id)
}

fn parse_session_id(raw: &str) -> Option<Uuid> {
    Uuid::parse_str(raw).ok()
}

fn live_session(state: &AppState, raw: &str) -> Option<Uuid> {
    parse_session_id(raw).filter(|id| state.sessions.contains(*id))
}

fn render_template(name: &str, ctx: Context) -> Html<String> {
    let tera = crate::templates::get_tera();
    let rendered = tera.render(name, &ctx).unwrap_or_else(|e| {
        error!("Failed to render {}: {:?}", name, e);
        format!("Template error: {}", name)
    });
    Html(rendered)
}
