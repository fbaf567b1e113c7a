//! Axum route handlers for the Interview API.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::AppError;
use crate::interview::evaluation::Evaluation;
use crate::interview::flow::{
    discard_interview, finalize_report, load_session, skip_question, start_interview,
    submit_answer, update_settings, SettingsRequest, StartRequest, StepOutcome,
};
use crate::interview::questions::Question;
use crate::interview::session::{Mode, Session};
use crate::interview::transcript::{Scoreboard, Transcript};
use crate::llm_client::ALLOWED_MODELS;
use crate::models::transcript::TranscriptRow;
use crate::state::AppState;

const DEFAULT_TRANSCRIPT_LIMIT: i64 = 20;
const MAX_TRANSCRIPT_LIMIT: i64 = 100;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct SubmitAnswerRequest {
    pub question_key: String,
    pub answer: String,
}

#[derive(Debug, Deserialize)]
pub struct SkipRequest {
    pub question_key: String,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct ModelsResponse {
    pub models: Vec<&'static str>,
    pub default: String,
}

#[derive(Debug, Serialize)]
pub struct QuestionView {
    pub key: String,
    pub text: String,
    /// 1-based position in this session.
    pub number: usize,
    pub total: usize,
}

#[derive(Debug, Serialize)]
pub struct EntryView {
    pub question_key: String,
    pub question: String,
    pub answer: String,
    pub skipped: bool,
    /// Withheld for answers given in interview mode until the session completes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evaluation: Option<Evaluation>,
}

#[derive(Debug, Serialize)]
pub struct Progress {
    pub answered: usize,
    pub total: usize,
}

#[derive(Debug, Serialize)]
pub struct SessionView {
    pub session_id: Uuid,
    pub mode: Mode,
    pub model: String,
    pub completed: bool,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub progress: Progress,
    pub current_question: Option<QuestionView>,
    pub entries: Vec<EntryView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scoreboard: Option<Scoreboard>,
}

impl From<&Session> for SessionView {
    fn from(session: &Session) -> Self {
        let total = session.questions.len();
        Self {
            session_id: session.id,
            mode: session.mode,
            model: session.model.clone(),
            completed: session.is_completed(),
            started_at: session.started_at,
            completed_at: session.completed_at(),
            progress: Progress {
                answered: session.entries.len(),
                total,
            },
            current_question: session.current_index().and_then(|i| {
                session.questions.get(i).map(|q| QuestionView {
                    key: q.key.clone(),
                    text: q.text.clone(),
                    number: i + 1,
                    total,
                })
            }),
            entries: session
                .entries
                .iter()
                .map(|e| EntryView {
                    question_key: e.question_key.clone(),
                    question: e.question.clone(),
                    answer: e.answer.clone(),
                    skipped: e.is_skipped(),
                    evaluation: session.reveals(e).then(|| e.evaluation.clone()),
                })
                .collect(),
            scoreboard: session.reveals_scoreboard().then(|| session.scoreboard()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StepResponse {
    pub question_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feedback: Option<Evaluation>,
    pub session: SessionView,
}

impl From<StepOutcome> for StepResponse {
    fn from(step: StepOutcome) -> Self {
        Self {
            session: SessionView::from(&step.session),
            question_key: step.question_key,
            feedback: step.feedback,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ReportResponse {
    pub transcript: Transcript,
    pub markdown: String,
    pub archive_key: String,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// GET /api/v1/questions
pub async fn handle_list_questions(State(state): State<AppState>) -> Json<Vec<Question>> {
    Json(state.bank.all().to_vec())
}

/// GET /api/v1/models
pub async fn handle_list_models(State(state): State<AppState>) -> Json<ModelsResponse> {
    Json(ModelsResponse {
        models: ALLOWED_MODELS.to_vec(),
        default: state.config.default_model.clone(),
    })
}

/// POST /api/v1/interviews
pub async fn handle_start(
    State(state): State<AppState>,
    Json(request): Json<StartRequest>,
) -> Result<(StatusCode, Json<SessionView>), AppError> {
    let session = start_interview(
        state.sessions.as_ref(),
        &state.bank,
        &state.config.default_model,
        request,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(SessionView::from(&session))))
}

/// GET /api/v1/interviews/:id
pub async fn handle_get_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, AppError> {
    let session = load_session(state.sessions.as_ref(), id).await?;
    Ok(Json(SessionView::from(&session)))
}

/// PATCH /api/v1/interviews/:id/settings
pub async fn handle_update_settings(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<SettingsRequest>,
) -> Result<Json<SessionView>, AppError> {
    let session = update_settings(state.sessions.as_ref(), &state.locks, id, request).await?;
    Ok(Json(SessionView::from(&session)))
}

/// POST /api/v1/interviews/:id/answers
pub async fn handle_submit_answer(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<SubmitAnswerRequest>,
) -> Result<Json<StepResponse>, AppError> {
    let step = submit_answer(
        state.sessions.as_ref(),
        &state.locks,
        state.evaluator.as_ref(),
        id,
        &request.question_key,
        &request.answer,
    )
    .await?;
    Ok(Json(step.into()))
}

/// POST /api/v1/interviews/:id/skip
pub async fn handle_skip(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<SkipRequest>,
) -> Result<Json<StepResponse>, AppError> {
    let step = skip_question(
        state.sessions.as_ref(),
        &state.locks,
        id,
        &request.question_key,
    )
    .await?;
    Ok(Json(step.into()))
}

/// GET /api/v1/interviews/:id/report
///
/// First call generates the summary and archives the transcript; later calls are cached.
pub async fn handle_report(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ReportResponse>, AppError> {
    let report = finalize_report(
        state.sessions.as_ref(),
        &state.locks,
        state.evaluator.as_ref(),
        state.archive.as_ref(),
        id,
    )
    .await?;
    Ok(Json(ReportResponse {
        markdown: report.transcript.render_markdown(),
        transcript: report.transcript,
        archive_key: report.archive_key,
    }))
}

/// DELETE /api/v1/interviews/:id
pub async fn handle_discard(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    discard_interview(state.sessions.as_ref(), &state.locks, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/transcripts
pub async fn handle_list_transcripts(
    State(state): State<AppState>,
    Query(params): Query<ListQuery>,
) -> Result<Json<Vec<TranscriptRow>>, AppError> {
    let limit = params
        .limit
        .unwrap_or(DEFAULT_TRANSCRIPT_LIMIT)
        .clamp(1, MAX_TRANSCRIPT_LIMIT);
    Ok(Json(state.archive.list(limit).await?))
}

/// GET /api/v1/transcripts/:session_id
pub async fn handle_get_transcript(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<Transcript>, AppError> {
    state
        .archive
        .get(session_id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Transcript {session_id} not found")))
}
