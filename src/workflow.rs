//! Per-session grading workflow.
//!
//! A session moves `Idle` → `DocumentProcessed` → `ScorecardEntered` and is
//! replaced by a brand-new session (fresh id) after a save or reset, so any
//! page rendered for the old id no longer binds to live state.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::db::NewSubmission;
use crate::error::{ValidationError, WorkflowError};
use crate::extract;
use crate::prompt::build_prompt;
use crate::rubric::{self, RubricWeights};
use crate::score::{compute_score, grade_label, grade_letter, Grade};
use crate::scorecard::{self, Scorecard};

#[derive(Debug, Clone, Default)]
pub struct UploadedFile {
    pub filename: String,
    pub mime: String,
    pub bytes: Vec<u8>,
}

/// Text fields of the intake form, echoed back when the form is re-rendered.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FormFields {
    pub name: String,
    pub email: String,
    pub course: String,
    pub rubric_text: String,
}

#[derive(Debug, Clone, Default)]
pub struct IntakeForm {
    pub fields: FormFields,
    pub file: Option<UploadedFile>,
}

impl IntakeForm {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let fields = &self.fields;
        if fields.name.trim().is_empty() {
            return Err(ValidationError::MissingField("name"));
        }
        if fields.email.trim().is_empty() {
            return Err(ValidationError::MissingField("email"));
        }
        if fields.course.trim().is_empty() {
            return Err(ValidationError::MissingField("course"));
        }
        if !rubric::is_known_course(&fields.course) {
            return Err(ValidationError::UnknownCourse(fields.course.clone()));
        }
        match &self.file {
            Some(file) if !file.filename.is_empty() => {}
            _ => return Err(ValidationError::MissingField("file")),
        }
        if fields.rubric_text.trim().is_empty() {
            return Err(ValidationError::MissingField("rubric_text"));
        }
        Ok(())
    }

    /// Validates the form and extracts the assignment text into a draft.
    ///
    /// Touches no session, so the extraction can run without holding the
    /// session store.
    pub fn into_draft(self) -> Result<AssignmentDraft, ValidationError> {
        self.validate()?;

        let IntakeForm { fields, file } = self;
        let file = file.unwrap_or_default();
        let assignment_text = extract::extract(&file.bytes, &file.mime);
        info!(
            filename = %file.filename,
            mime = %file.mime,
            bytes = file.bytes.len(),
            chars = assignment_text.chars().count(),
            "Assignment extracted"
        );

        Ok(AssignmentDraft {
            name: fields.name.trim().to_string(),
            email: fields.email.trim().to_string(),
            course: fields.course,
            filename: file.filename,
            assignment_text,
            rubric_text: fields.rubric_text,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssignmentDraft {
    pub name: String,
    pub email: String,
    pub course: String,
    pub filename: String,
    pub assignment_text: String,
    pub rubric_text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Scoring {
    pub scorecard_json: String,
    pub ai_feedback: String,
    pub score: f64,
    pub grade: Grade,
    pub parse_error: Option<String>,
}

impl Scoring {
    pub fn grade_label(&self) -> String {
        grade_label(self.grade, self.score)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum WorkflowState {
    Idle,
    DocumentProcessed {
        draft: AssignmentDraft,
    },
    ScorecardEntered {
        draft: AssignmentDraft,
        scoring: Scoring,
    },
}

impl WorkflowState {
    pub fn name(&self) -> &'static str {
        match self {
            WorkflowState::Idle => "idle",
            WorkflowState::DocumentProcessed { .. } => "document_processed",
            WorkflowState::ScorecardEntered { .. } => "scorecard_entered",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "level", content = "message", rename_all = "lowercase")]
pub enum Notice {
    Success(String),
    Warning(String),
    Error(String),
}

#[derive(Debug, Clone)]
pub struct WorkflowSession {
    id: Uuid,
    state: WorkflowState,
    form: FormFields,
    notice: Option<Notice>,
}

impl WorkflowSession {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            state: WorkflowState::Idle,
            form: FormFields::default(),
            notice: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> &WorkflowState {
        &self.state
    }

    pub fn form(&self) -> &FormFields {
        &self.form
    }

    pub fn draft(&self) -> Option<&AssignmentDraft> {
        match &self.state {
            WorkflowState::Idle => None,
            WorkflowState::DocumentProcessed { draft }
            | WorkflowState::ScorecardEntered { draft, .. } => Some(draft),
        }
    }

    pub fn scoring(&self) -> Option<&Scoring> {
        match &self.state {
            WorkflowState::ScorecardEntered { scoring, .. } => Some(scoring),
            _ => None,
        }
    }

    pub fn prompt(&self, weights: &RubricWeights) -> Option<String> {
        self.draft()
            .map(|draft| build_prompt(&draft.assignment_text, weights))
    }

    pub fn notify(&mut self, notice: Notice) {
        self.notice = Some(notice);
    }

    /// Hands out the pending notice once.
    pub fn take_notice(&mut self) -> Option<Notice> {
        self.notice.take()
    }

    /// Applies the outcome of [`IntakeForm::into_draft`].
    ///
    /// The entered fields are kept either way so the form can be re-rendered.
    /// A rejected form leaves the state as it was; an accepted one replaces
    /// any earlier draft and scoring.
    pub fn apply_intake(
        &mut self,
        fields: FormFields,
        outcome: Result<AssignmentDraft, ValidationError>,
    ) -> Result<(), ValidationError> {
        self.form = fields;
        match outcome {
            Ok(draft) => {
                info!(session = %self.id, filename = %draft.filename, "Assignment processed");
                self.state = WorkflowState::DocumentProcessed { draft };
                Ok(())
            }
            Err(e) => {
                warn!(session = %self.id, error = %e, "Intake form rejected");
                Err(e)
            }
        }
    }

    /// Parses and scores a pasted scorecard. Every non-empty paste is scored
    /// afresh; an empty paste leaves the session as it was and returns
    /// `Ok(None)`. Malformed JSON scores as an empty scorecard and the cause
    /// is kept on the returned [`Scoring`].
    pub fn enter_scorecard(
        &mut self,
        raw: &str,
        feedback: &str,
        weights: &RubricWeights,
    ) -> Result<Option<&Scoring>, WorkflowError> {
        if self.draft().is_none() {
            return Err(WorkflowError::NoDocument);
        }
        if raw.trim().is_empty() {
            return Ok(None);
        }

        let (card, parse_error) = match scorecard::parse(raw) {
            Ok(card) => (card, None),
            Err(e) => (Scorecard::default(), Some(e.to_string())),
        };
        if parse_error.is_none() && card.is_empty() {
            warn!(session = %self.id, "Scorecard has no criteria");
        }
        let score = compute_score(&card, weights);
        let grade = grade_letter(score);
        info!(session = %self.id, score, grade = %grade, criteria = card.len(), "Score computed");

        let scoring = Scoring {
            scorecard_json: raw.to_string(),
            ai_feedback: feedback.to_string(),
            score,
            grade,
            parse_error,
        };
        let draft = match std::mem::replace(&mut self.state, WorkflowState::Idle) {
            WorkflowState::DocumentProcessed { draft }
            | WorkflowState::ScorecardEntered { draft, .. } => draft,
            WorkflowState::Idle => return Err(WorkflowError::NoDocument),
        };
        self.state = WorkflowState::ScorecardEntered { draft, scoring };
        Ok(self.scoring())
    }

    /// The record a save would persist. Only available once a scorecard
    /// has been scored.
    pub fn pending_submission(&self) -> Result<NewSubmission, WorkflowError> {
        match &self.state {
            WorkflowState::Idle => Err(WorkflowError::NoDocument),
            WorkflowState::DocumentProcessed { .. } => Err(WorkflowError::NotScored),
            WorkflowState::ScorecardEntered { draft, scoring } => Ok(NewSubmission {
                name: draft.name.clone(),
                email: draft.email.clone(),
                course: draft.course.clone(),
                assignment_text: draft.assignment_text.clone(),
                rubric_text: draft.rubric_text.clone(),
                ai_feedback: scoring.ai_feedback.clone(),
                scorecard_json: scoring.scorecard_json.clone(),
                computed_score: scoring.score,
                computed_grade: scoring.grade_label(),
            }),
        }
    }

    /// Discards this session and returns an empty one under a new id.
    pub fn reset(self) -> WorkflowSession {
        WorkflowSession::new()
    }
}

impl Default for WorkflowSession {
    fn default() -> Self {
        Self::new()
    }
}

/// How long a session may sit untouched before the store drops it.
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(120 * 60);

struct Entry {
    session: WorkflowSession,
    last_seen: Instant,
}

/// Live sessions keyed by id. A session idle for longer than the store's
/// TTL is treated as gone and is evicted the next time a session opens.
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<Mutex<HashMap<Uuid, Entry>>>,
    ttl: Duration,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(DEFAULT_SESSION_TTL)
    }
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(HashMap::new())),
            ttl,
        }
    }

    /// Starts a new empty session and returns its id.
    pub fn open(&self) -> Uuid {
        self.open_at(Instant::now())
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.with(id, |_| ()).is_some()
    }

    /// Runs `f` against the session, or returns `None` for an unknown or
    /// expired id. Counts as activity on the session.
    pub fn with<R>(&self, id: Uuid, f: impl FnOnce(&mut WorkflowSession) -> R) -> Option<R> {
        self.with_at(id, Instant::now(), f)
    }

    /// Replaces the session with a fresh one and returns the new id. The
    /// notice, if any, is carried onto the fresh session.
    pub fn retire(&self, id: Uuid, notice: Option<Notice>) -> Option<Uuid> {
        let now = Instant::now();
        let mut sessions = self.lock();
        let entry = sessions.remove(&id)?;
        if self.expired(&entry, now) {
            return None;
        }
        let mut fresh = entry.session.reset();
        if let Some(notice) = notice {
            fresh.notify(notice);
        }
        let fresh_id = fresh.id();
        sessions.insert(
            fresh_id,
            Entry {
                session: fresh,
                last_seen: now,
            },
        );
        Some(fresh_id)
    }

    fn open_at(&self, now: Instant) -> Uuid {
        let session = WorkflowSession::new();
        let id = session.id();
        let mut sessions = self.lock();

        let before = sessions.len();
        sessions.retain(|_, entry| !self.expired(entry, now));
        let evicted = before - sessions.len();
        if evicted > 0 {
            debug!(evicted, live = sessions.len(), "Evicted idle sessions");
        }

        sessions.insert(
            id,
            Entry {
                session,
                last_seen: now,
            },
        );
        id
    }

    fn with_at<R>(
        &self,
        id: Uuid,
        now: Instant,
        f: impl FnOnce(&mut WorkflowSession) -> R,
    ) -> Option<R> {
        let mut sessions = self.lock();
        if sessions.get(&id).is_some_and(|entry| self.expired(entry, now)) {
            sessions.remove(&id);
            return None;
        }
        let entry = sessions.get_mut(&id)?;
        entry.last_seen = now;
        Some(f(&mut entry.session))
    }

    fn expired(&self, entry: &Entry, now: Instant) -> bool {
        now.saturating_duration_since(entry.last_seen) >= self.ttl
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Uuid, Entry>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
