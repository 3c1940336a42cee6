use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use tower::ServiceExt;

use crate::config::Config;
use crate::db::{self, DbPool};
use crate::extract::{fixtures, DOCX_MIME};
use crate::rubric::COURSES;
use crate::state::AppState;
use crate::workflow::SessionStore;

const BOUNDARY: &str = "grader-test-boundary";

struct Harness {
    app: Router,
    pool: DbPool,
    sessions: SessionStore,
}

async fn harness() -> Harness {
    let pool = db::memory_pool().await;
    let sessions = SessionStore::default();
    let state = Arc::new(AppState {
        pool: pool.clone(),
        config: Arc::new(Config::default()),
        sessions: sessions.clone(),
    });
    Harness {
        app: crate::app(state),
        pool,
        sessions,
    }
}

impl Harness {
    async fn send(&self, request: Request<Body>) -> (StatusCode, Option<String>, String) {
        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let location = response
            .headers()
            .get(header::LOCATION)
            .map(|v| v.to_str().unwrap().to_string());
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, location, String::from_utf8(bytes.to_vec()).unwrap())
    }

    async fn get(&self, uri: &str) -> (StatusCode, Option<String>, String) {
        self.send(Request::get(uri).body(Body::empty()).unwrap()).await
    }

    async fn post_form(&self, uri: &str, pairs: &[(&str, &str)]) -> (StatusCode, Option<String>) {
        let body = pairs
            .iter()
            .map(|(k, v)| format!("{}={}", urlencode(k), urlencode(v)))
            .collect::<Vec<_>>()
            .join("&");
        let request = Request::post(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body))
            .unwrap();
        let (status, location, _) = self.send(request).await;
        (status, location)
    }

    async fn post_upload(
        &self,
        uri: &str,
        fields: &[(&str, &str)],
        file: Option<(&str, &str, Vec<u8>)>,
    ) -> (StatusCode, Option<String>) {
        self.post_multipart(uri, multipart_body(fields, file)).await
    }

    async fn post_multipart(&self, uri: &str, body: Vec<u8>) -> (StatusCode, Option<String>) {
        let request = Request::post(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(body))
            .unwrap();
        let (status, location, _) = self.send(request).await;
        (status, location)
    }

    async fn execute(&self, sql: &str) {
        sqlx::query(sql).execute(self.pool.as_ref()).await.unwrap();
    }

    async fn open_session(&self) -> String {
        let (status, location, _) = self.get("/").await;
        assert_eq!(status, StatusCode::SEE_OTHER);
        location.unwrap()
    }
}

fn urlencode(raw: &str) -> String {
    raw.bytes()
        .map(|b| match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                (b as char).to_string()
            }
            _ => format!("%{:02X}", b),
        })
        .collect()
}

fn multipart_body(fields: &[(&str, &str)], file: Option<(&str, &str, Vec<u8>)>) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                BOUNDARY, name, value
            )
            .as_bytes(),
        );
    }
    if let Some((filename, mime, bytes)) = file {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                BOUNDARY, filename, mime
            )
            .as_bytes(),
        );
        body.extend_from_slice(&bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

fn intake_fields() -> Vec<(&'static str, &'static str)> {
    vec![
        ("name", "Grace Hopper"),
        ("email", "grace@uw.edu"),
        ("course", COURSES[0]),
        ("rubric_text", "Full grading rubric"),
    ]
}

fn essay_docx() -> (&'static str, &'static str, Vec<u8>) {
    (
        "essay.docx",
        DOCX_MIME,
        fixtures::docx("<w:p><w:r><w:t>Machines that learn.</w:t></w:r></w:p>"),
    )
}

const STANDARD_SCORECARD: &str = r#"{"Understanding of Topic": 5, "Originality & Critical Thinking": 4, "Use of Evidence & Examples": 3, "Structure & Organization": 3, "Clarity & Writing Style": 2, "Citation & Academic Integrity": 5}"#;

#[tokio::test]
async fn full_workflow_saves_and_exports() {
    let h = harness().await;
    let page = h.open_session().await;

    let (_, _, body) = h.get(&page).await;
    assert!(body.contains("No submissions recorded yet."));
    assert!(body.contains("data-state=\"idle\""));

    let (status, location) = h
        .post_upload(&format!("{}/process", page), &intake_fields(), Some(essay_docx()))
        .await;
    assert_eq!(status, StatusCode::SEE_OTHER);
    assert_eq!(location.as_deref(), Some(page.as_str()));

    let (_, _, body) = h.get(&page).await;
    assert!(body.contains("Assignment processed."));
    assert!(body.contains("data-state=\"document_processed\""));
    assert!(body.contains("Machines that learn."));
    assert!(body.contains("Rubric weights:"));

    h.post_form(
        &format!("{}/scorecard", page),
        &[("scorecard", STANDARD_SCORECARD), ("feedback", "Clear argument")],
    )
    .await;
    let (_, _, body) = h.get(&page).await;
    assert!(body.contains("Computed Score: 78.0/100 → Grade: B+"));
    assert!(body.contains("data-state=\"scorecard_entered\""));

    let (status, fresh) = h.post_form(&format!("{}/save", page), &[]).await;
    assert_eq!(status, StatusCode::SEE_OTHER);
    let fresh = fresh.unwrap();
    assert_ne!(fresh, page);

    let (_, location, _) = h.get(&page).await;
    assert_eq!(location.as_deref(), Some("/"));

    let (_, _, body) = h.get(&fresh).await;
    assert!(body.contains("Submission and grade saved."));
    assert!(body.contains("data-state=\"idle\""));
    assert!(body.contains("Grace Hopper"));
    assert!(body.contains("B+, 78.0%"));
    assert!(!body.contains("Machines that learn."));

    let (status, _, csv) = h.get("/submissions.csv").await;
    assert_eq!(status, StatusCode::OK);
    let lines: Vec<_> = csv.lines().collect();
    assert_eq!(lines[0], "name,email,course,computed_score,computed_grade,submitted_at");
    assert!(lines[1].starts_with("Grace Hopper,grace@uw.edu,"));
    assert!(lines[1].contains(",78.0,\"B+, 78.0%\","));

    let (_, _, json) = h.get("/api/submissions/1").await;
    let record: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(record["assignment_text"], "Machines that learn.");
    assert_eq!(record["ai_feedback"], "Clear argument");
    assert_eq!(record["scorecard_json"], STANDARD_SCORECARD);
    assert_eq!(record["computed_grade"], "B+, 78.0%");
}

#[tokio::test]
async fn missing_field_warns_and_stays_idle() {
    let h = harness().await;
    let page = h.open_session().await;

    let mut fields = intake_fields();
    fields.retain(|(name, _)| *name != "rubric_text");
    h.post_upload(&format!("{}/process", page), &fields, Some(essay_docx()))
        .await;

    let (_, _, body) = h.get(&page).await;
    assert!(body.contains("Please complete all fields"));
    assert!(!body.contains("Rubric weights:"));
    // entered values are echoed back into the form
    assert!(body.contains("value=\"grace@uw.edu\""));
}

#[tokio::test]
async fn save_before_scoring_is_refused() {
    let h = harness().await;
    let page = h.open_session().await;
    h.post_upload(&format!("{}/process", page), &intake_fields(), Some(essay_docx()))
        .await;

    let (_, location) = h.post_form(&format!("{}/save", page), &[]).await;
    assert_eq!(location.as_deref(), Some(page.as_str()));

    let (_, _, body) = h.get(&page).await;
    assert!(body.contains("Paste a scorecard to compute a score before saving."));
    let (_, _, log) = h.get("/api/submissions").await;
    assert_eq!(log, "[]");
}

#[tokio::test]
async fn malformed_scorecard_scores_zero() {
    let h = harness().await;
    let page = h.open_session().await;
    h.post_upload(&format!("{}/process", page), &intake_fields(), Some(essay_docx()))
        .await;
    h.post_form(&format!("{}/scorecard", page), &[("scorecard", "{not json")])
        .await;

    let (_, _, body) = h.get(&page).await;
    assert!(body.contains("Invalid JSON scorecard:"));
    assert!(body.contains("Computed Score: 0.0/100 → Grade: F"));
}

#[tokio::test]
async fn unsupported_upload_saves_with_empty_text() {
    let h = harness().await;
    let page = h.open_session().await;
    h.post_upload(
        &format!("{}/process", page),
        &intake_fields(),
        Some(("notes.txt", "text/plain", b"just text".to_vec())),
    )
    .await;
    h.post_form(&format!("{}/scorecard", page), &[("scorecard", "{}")])
        .await;
    let (_, fresh) = h.post_form(&format!("{}/save", page), &[]).await;
    assert_ne!(fresh.as_deref(), Some(page.as_str()));

    let (_, _, json) = h.get("/api/submissions/1").await;
    let record: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(record["assignment_text"], "");
    assert_eq!(record["computed_score"], 0.0);
}

#[tokio::test]
async fn log_lists_newest_first() {
    let h = harness().await;
    for name in ["First", "Second", "Third"] {
        let page = h.open_session().await;
        let mut fields = intake_fields();
        fields[0] = ("name", name);
        h.post_upload(&format!("{}/process", page), &fields, Some(essay_docx()))
            .await;
        h.post_form(&format!("{}/scorecard", page), &[("scorecard", "{}")])
            .await;
        h.post_form(&format!("{}/save", page), &[]).await;
    }

    let (_, _, json) = h.get("/api/submissions").await;
    let rows: Vec<serde_json::Value> = serde_json::from_str(&json).unwrap();
    let names: Vec<_> = rows.iter().map(|r| r["name"].as_str().unwrap()).collect();
    assert_eq!(names, vec!["Third", "Second", "First"]);

    let (_, _, csv) = h.get("/submissions.csv").await;
    let csv_names: Vec<_> = csv
        .lines()
        .skip(1)
        .map(|line| line.split(',').next().unwrap())
        .collect();
    assert_eq!(csv_names, names);
}

#[tokio::test]
async fn reset_discards_session() {
    let h = harness().await;
    let page = h.open_session().await;
    h.post_upload(&format!("{}/process", page), &intake_fields(), Some(essay_docx()))
        .await;

    let (status, fresh) = h.post_form(&format!("{}/reset", page), &[]).await;
    assert_eq!(status, StatusCode::SEE_OTHER);
    let fresh = fresh.unwrap();
    assert_ne!(fresh, page);
    assert_eq!(h.sessions.len(), 1);

    let (_, _, body) = h.get(&fresh).await;
    assert!(!body.contains("Machines that learn."));
    assert!(!body.contains("value=\"grace@uw.edu\""));

    let (_, _, log) = h.get("/api/submissions").await;
    assert_eq!(log, "[]");
}

#[tokio::test]
async fn unknown_session_redirects_home() {
    let h = harness().await;
    for uri in ["/session/not-a-uuid", "/session/5f0c7f0e-4a43-4b0e-9d53-5b8c8f1d1a11"] {
        let (status, location, _) = h.get(uri).await;
        assert_eq!(status, StatusCode::SEE_OTHER);
        assert_eq!(location.as_deref(), Some("/"));
    }
}

#[tokio::test]
async fn missing_record_is_404() {
    let h = harness().await;
    let (status, _, body) = h.get("/api/submissions/42").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body.contains("NOT_FOUND"));
}

#[tokio::test]
async fn failed_save_keeps_session_and_retry_succeeds() {
    let h = harness().await;
    let page = h.open_session().await;
    h.post_upload(&format!("{}/process", page), &intake_fields(), Some(essay_docx()))
        .await;
    h.post_form(
        &format!("{}/scorecard", page),
        &[("scorecard", STANDARD_SCORECARD)],
    )
    .await;

    h.execute("ALTER TABLE submissions RENAME TO parked").await;
    let (status, location) = h.post_form(&format!("{}/save", page), &[]).await;
    assert_eq!(status, StatusCode::SEE_OTHER);
    assert_eq!(location.as_deref(), Some(page.as_str()));

    let (_, _, body) = h.get(&page).await;
    assert!(body.contains("Failed to save submission"));
    assert!(body.contains("Machines that learn."));
    assert!(body.contains("Computed Score: 78.0/100"));
    assert!(body.contains("data-state=\"scorecard_entered\""));

    h.execute("ALTER TABLE parked RENAME TO submissions").await;
    let (_, fresh) = h.post_form(&format!("{}/save", page), &[]).await;
    assert_ne!(fresh.as_deref(), Some(page.as_str()));

    let (status, _, json) = h.get("/api/submissions/1").await;
    assert_eq!(status, StatusCode::OK);
    let record: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(record["computed_grade"], "B+, 78.0%");
}

#[tokio::test]
async fn truncated_upload_reports_failure() {
    let h = harness().await;
    let page = h.open_session().await;

    // no closing boundary: the stream ends inside the first field
    let body = format!(
        "--{}\r\nContent-Disposition: form-data; name=\"name\"\r\n\r\nGrace Hop",
        BOUNDARY
    );
    let (status, location) = h
        .post_multipart(&format!("{}/process", page), body.into_bytes())
        .await;
    assert_eq!(status, StatusCode::SEE_OTHER);
    assert_eq!(location.as_deref(), Some(page.as_str()));

    let (_, _, body) = h.get(&page).await;
    assert!(body.contains("Upload failed"));
    assert!(!body.contains("Please complete all fields"));
    assert!(body.contains("data-state=\"idle\""));
}
