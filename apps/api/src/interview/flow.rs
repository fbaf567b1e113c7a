//! Interview flow — orchestrates a session from start to archived transcript.
//!
//! start → (submit_answer | skip_question)* → finalize_report
//!
//! Every mutation runs under the session's lock: load → validate → evaluate →
//! record → store. The lock is held across the model call so a duplicate submission
//! waits, then fails the current-question check instead of double-recording.

use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::interview::archive::TranscriptArchive;
use crate::interview::evaluation::{Evaluation, Evaluator};
use crate::interview::questions::{Question, QuestionBank};
use crate::interview::session::{validate_answer, FinalReport, Mode, Session};
use crate::interview::store::{SessionLocks, SessionStore};
use crate::interview::transcript::{Transcript, TranscriptEntry};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StartRequest {
    #[serde(default)]
    pub mode: Mode,
    pub model: Option<String>,
    /// Subset of question keys, in the order to ask them. Defaults to the whole bank.
    pub questions: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SettingsRequest {
    pub mode: Option<Mode>,
    pub model: Option<String>,
}

/// Result of recording one entry.
#[derive(Debug, Clone)]
pub struct StepOutcome {
    pub session: Session,
    pub question_key: String,
    /// Present only when the session reveals this entry's evaluation.
    pub feedback: Option<Evaluation>,
}

impl StepOutcome {
    fn new(session: Session, entry: &TranscriptEntry) -> Self {
        let feedback = session.reveals(entry).then(|| entry.evaluation.clone());
        Self {
            question_key: entry.question_key.clone(),
            feedback,
            session,
        }
    }
}

pub async fn start_interview(
    store: &dyn SessionStore,
    bank: &QuestionBank,
    default_model: &str,
    request: StartRequest,
) -> Result<Session, AppError> {
    let questions = bank.select(request.questions.as_deref())?;
    let model = request.model.as_deref().unwrap_or(default_model);
    let session = Session::new(request.mode, model, questions)?;
    store.put(&session).await?;

    info!(
        "Started interview {} (mode={:?}, model={}, questions={})",
        session.id,
        session.mode,
        session.model,
        session.questions.len()
    );
    Ok(session)
}

pub async fn load_session(store: &dyn SessionStore, id: Uuid) -> Result<Session, AppError> {
    store
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Interview {id} not found")))
}

pub async fn update_settings(
    store: &dyn SessionStore,
    locks: &SessionLocks,
    id: Uuid,
    request: SettingsRequest,
) -> Result<Session, AppError> {
    let _guard = locks.acquire(id).await;
    let mut session = load_session(store, id).await?;

    if let Some(mode) = request.mode {
        session.set_mode(mode)?;
    }
    if let Some(model) = request.model.as_deref() {
        session.set_model(model)?;
    }
    store.put(&session).await?;
    Ok(session)
}

pub async fn submit_answer(
    store: &dyn SessionStore,
    locks: &SessionLocks,
    evaluator: &dyn Evaluator,
    id: Uuid,
    question_key: &str,
    answer: &str,
) -> Result<StepOutcome, AppError> {
    let _guard = locks.acquire(id).await;
    let mut session = load_session(store, id).await?;

    let question: Question = session.ensure_current(question_key)?.clone();
    validate_answer(answer)?;

    let outcome = evaluator.evaluate(&question, answer, &session.model).await;
    info!(
        "Interview {id}: question {} scored {}",
        question.key, outcome.evaluation.score
    );

    let entry = TranscriptEntry::answered(&question, answer, outcome);
    session.record(entry.clone())?;
    store.put(&session).await?;

    Ok(StepOutcome::new(session, &entry))
}

pub async fn skip_question(
    store: &dyn SessionStore,
    locks: &SessionLocks,
    id: Uuid,
    question_key: &str,
) -> Result<StepOutcome, AppError> {
    let _guard = locks.acquire(id).await;
    let mut session = load_session(store, id).await?;

    let entry = session.skip(question_key)?.clone();
    store.put(&session).await?;
    info!("Interview {id}: question {} skipped", entry.question_key);

    Ok(StepOutcome::new(session, &entry))
}

/// Builds the final report for a completed session.
///
/// The first call writes the summary, archives the transcript and caches the result on
/// the session; later calls return the cached report. A summary failure is recorded on
/// the transcript, not raised. An archive failure is raised and nothing is cached.
pub async fn finalize_report(
    store: &dyn SessionStore,
    locks: &SessionLocks,
    evaluator: &dyn Evaluator,
    archive: &dyn TranscriptArchive,
    id: Uuid,
) -> Result<FinalReport, AppError> {
    let _guard = locks.acquire(id).await;
    let mut session = load_session(store, id).await?;

    if let Some(report) = &session.report {
        return Ok(report.clone());
    }

    let mut transcript = Transcript::from_session(&session)?;
    match evaluator.summarize(&transcript, &session.model).await {
        Ok(summary) => transcript.summary = Some(summary),
        Err(e) => {
            warn!("Summary generation failed for interview {id}: {e}");
            transcript.summary_error = Some(e.to_string());
        }
    }

    let archive_key = archive.archive(&transcript).await?;
    let report = FinalReport {
        transcript,
        archive_key,
    };
    session.report = Some(report.clone());
    store.put(&session).await?;

    info!(
        "Interview {id} finalized: {}/{}",
        report.transcript.scoreboard.total_score, report.transcript.scoreboard.max_score
    );
    Ok(report)
}

/// Drops a session so the candidate can start over.
pub async fn discard_interview(
    store: &dyn SessionStore,
    locks: &SessionLocks,
    id: Uuid,
) -> Result<(), AppError> {
    let _guard = locks.acquire(id).await;
    if !store.delete(id).await? {
        return Err(AppError::NotFound(format!("Interview {id} not found")));
    }
    info!("Interview {id} discarded");
    Ok(())
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted fakes shared by flow and handler tests.

    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::interview::archive::{mode_str, transcript_key};
    use crate::interview::evaluation::{parse_evaluation, EvaluationOutcome};
    use crate::models::transcript::TranscriptRow;

    /// Returns queued model texts in order; `Err` entries simulate provider failures.
    #[derive(Default)]
    pub struct ScriptedEvaluator {
        pub replies: Mutex<VecDeque<Result<String, String>>>,
        pub summary: Mutex<Option<Result<String, String>>>,
        pub calls: Mutex<Vec<(String, String, String)>>,
    }

    impl ScriptedEvaluator {
        pub fn with_replies(replies: Vec<Result<&str, &str>>) -> Self {
            let scripted = Self::default();
            *scripted.replies.lock().unwrap() = replies
                .into_iter()
                .map(|r| r.map(String::from).map_err(String::from))
                .collect();
            *scripted.summary.lock().unwrap() = Some(Ok("Solid fundamentals.".to_string()));
            scripted
        }
    }

    #[async_trait]
    impl Evaluator for ScriptedEvaluator {
        async fn evaluate(
            &self,
            question: &Question,
            answer: &str,
            model: &str,
        ) -> EvaluationOutcome {
            self.calls.lock().unwrap().push((
                question.key.clone(),
                answer.to_string(),
                model.to_string(),
            ));
            let reply = self
                .replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(r#"{"score": 5, "rationale": "default"}"#.to_string()));
            match reply {
                Ok(text) => match parse_evaluation(&text) {
                    Ok(evaluation) => EvaluationOutcome {
                        evaluation,
                        raw: text,
                    },
                    Err(e) => EvaluationOutcome::failed(e.to_string()),
                },
                Err(e) => EvaluationOutcome::failed(e),
            }
        }

        async fn summarize(
            &self,
            _transcript: &Transcript,
            _model: &str,
        ) -> Result<String, AppError> {
            match self.summary.lock().unwrap().clone() {
                Some(Ok(text)) => Ok(text),
                Some(Err(e)) => Err(AppError::Llm(e)),
                None => Err(AppError::Llm("no summary scripted".to_string())),
            }
        }
    }

    #[derive(Default)]
    pub struct MemoryArchive {
        pub stored: Mutex<HashMap<Uuid, Transcript>>,
        pub archive_calls: Mutex<u32>,
        pub fail: bool,
    }

    #[async_trait]
    impl TranscriptArchive for MemoryArchive {
        async fn archive(&self, transcript: &Transcript) -> Result<String, AppError> {
            *self.archive_calls.lock().unwrap() += 1;
            if self.fail {
                return Err(AppError::S3("bucket unavailable".to_string()));
            }
            self.stored
                .lock()
                .unwrap()
                .insert(transcript.session_id, transcript.clone());
            Ok(transcript_key(transcript.session_id))
        }

        async fn get(&self, session_id: Uuid) -> Result<Option<Transcript>, AppError> {
            Ok(self.stored.lock().unwrap().get(&session_id).cloned())
        }

        async fn list(&self, limit: i64) -> Result<Vec<TranscriptRow>, AppError> {
            let stored = self.stored.lock().unwrap();
            let mut rows: Vec<TranscriptRow> = stored
                .values()
                .map(|t| TranscriptRow {
                    session_id: t.session_id,
                    mode: mode_str(t.mode).to_string(),
                    model: t.model.clone(),
                    started_at: t.started_at,
                    completed_at: t.completed_at,
                    total_score: t.scoreboard.total_score as i32,
                    max_score: t.scoreboard.max_score as i32,
                    s3_key: transcript_key(t.session_id),
                    archived_at: t.completed_at,
                })
                .collect();
            rows.sort_by(|a, b| b.completed_at.cmp(&a.completed_at));
            rows.truncate(limit.max(0) as usize);
            Ok(rows)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::testing::{MemoryArchive, ScriptedEvaluator};
    use super::*;
    use crate::interview::evaluation::Correctness;
    use crate::interview::store::InMemorySessionStore;

    const GOOD: &str = r#"{"correctness": "correct", "score": 9, "rationale": "Precise."}"#;
    const WEAK: &str = r#"{"correctness": "incorrect", "score": 2, "rationale": "Off target."}"#;

    fn two_questions(mode: Mode) -> StartRequest {
        StartRequest {
            mode,
            model: None,
            questions: Some(vec![
                "vlookup_vs_xlookup".to_string(),
                "pivot_tables".to_string(),
            ]),
        }
    }

    async fn started(store: &InMemorySessionStore, mode: Mode) -> Session {
        let bank = QuestionBank::default_excel();
        start_interview(store, &bank, "gpt-4o-mini", two_questions(mode))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_start_persists_session_with_default_model() {
        let store = InMemorySessionStore::new();
        let session = started(&store, Mode::Interview).await;
        let loaded = load_session(&store, session.id).await.unwrap();
        assert_eq!(loaded.model, "gpt-4o-mini");
        assert_eq!(loaded.questions.len(), 2);
    }

    #[tokio::test]
    async fn test_start_rejects_unknown_model() {
        let store = InMemorySessionStore::new();
        let bank = QuestionBank::default_excel();
        let request = StartRequest {
            model: Some("gpt-5-turbo-max".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            start_interview(&store, &bank, "gpt-4o-mini", request).await,
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_practice_mode_returns_feedback_immediately() {
        let store = InMemorySessionStore::new();
        let locks = SessionLocks::default();
        let evaluator = ScriptedEvaluator::with_replies(vec![Ok(GOOD)]);
        let session = started(&store, Mode::Practice).await;

        let step = submit_answer(
            &store,
            &locks,
            &evaluator,
            session.id,
            "vlookup_vs_xlookup",
            "XLOOKUP defaults to exact match",
        )
        .await
        .unwrap();

        let feedback = step.feedback.expect("practice mode shows feedback");
        assert_eq!(feedback.score, 9);
        assert_eq!(
            step.session.current_question().map(|q| q.key.as_str()),
            Some("pivot_tables")
        );
    }

    #[tokio::test]
    async fn test_interview_mode_withholds_feedback_until_done() {
        let store = InMemorySessionStore::new();
        let locks = SessionLocks::default();
        let evaluator = ScriptedEvaluator::with_replies(vec![Ok(GOOD), Ok(WEAK)]);
        let session = started(&store, Mode::Interview).await;

        let first = submit_answer(
            &store,
            &locks,
            &evaluator,
            session.id,
            "vlookup_vs_xlookup",
            "a",
        )
        .await
        .unwrap();
        assert!(first.feedback.is_none());

        let last = submit_answer(&store, &locks, &evaluator, session.id, "pivot_tables", "b")
            .await
            .unwrap();
        assert!(last.session.is_completed());
        assert_eq!(last.feedback.map(|f| f.score), Some(2));
    }

    #[tokio::test]
    async fn test_switching_to_practice_keeps_interview_answers_hidden() {
        let store = InMemorySessionStore::new();
        let locks = SessionLocks::default();
        let evaluator = ScriptedEvaluator::with_replies(vec![Ok(GOOD), Ok(WEAK)]);
        let bank = QuestionBank::default_excel();
        let request = StartRequest {
            questions: Some(vec![
                "vlookup_vs_xlookup".to_string(),
                "pivot_tables".to_string(),
                "index_match".to_string(),
            ]),
            ..Default::default()
        };
        let session = start_interview(&store, &bank, "gpt-4o-mini", request)
            .await
            .unwrap();

        let first = submit_answer(
            &store,
            &locks,
            &evaluator,
            session.id,
            "vlookup_vs_xlookup",
            "a",
        )
        .await
        .unwrap();
        assert!(first.feedback.is_none());

        let switched = update_settings(
            &store,
            &locks,
            session.id,
            SettingsRequest {
                mode: Some(Mode::Practice),
                model: None,
            },
        )
        .await
        .unwrap();
        assert!(!switched.reveals(&switched.entries[0]));
        assert!(!switched.reveals_scoreboard());

        let second = submit_answer(&store, &locks, &evaluator, session.id, "pivot_tables", "b")
            .await
            .unwrap();
        assert_eq!(second.feedback.map(|f| f.score), Some(2));
        assert!(!second.session.reveals(&second.session.entries[0]));

        let last = skip_question(&store, &locks, session.id, "index_match")
            .await
            .unwrap();
        assert!(last.session.reveals(&last.session.entries[0]));
        assert!(last.session.reveals_scoreboard());
    }

    #[tokio::test]
    async fn test_answer_is_recorded_verbatim_and_sent_with_session_model() {
        let store = InMemorySessionStore::new();
        let locks = SessionLocks::default();
        let evaluator = ScriptedEvaluator::with_replies(vec![Ok(GOOD)]);
        let session = started(&store, Mode::Interview).await;
        update_settings(
            &store,
            &locks,
            session.id,
            SettingsRequest {
                mode: None,
                model: Some("gpt-4o".to_string()),
            },
        )
        .await
        .unwrap();

        let answer = "\n  =XLOOKUP(F2, A:A, C:C)\n";
        let step = submit_answer(
            &store,
            &locks,
            &evaluator,
            session.id,
            "vlookup_vs_xlookup",
            answer,
        )
        .await
        .unwrap();

        assert_eq!(step.session.entries[0].answer, answer);
        let calls = evaluator.calls.lock().unwrap();
        assert_eq!(calls[0].1, answer);
        assert_eq!(calls[0].2, "gpt-4o");
    }

    #[tokio::test]
    async fn test_blank_answer_rejected_without_calling_model() {
        let store = InMemorySessionStore::new();
        let locks = SessionLocks::default();
        let evaluator = ScriptedEvaluator::with_replies(vec![]);
        let session = started(&store, Mode::Interview).await;

        let err = submit_answer(
            &store,
            &locks,
            &evaluator,
            session.id,
            "vlookup_vs_xlookup",
            "  ",
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert!(evaluator.calls.lock().unwrap().is_empty());
        assert!(load_session(&store, session.id).await.unwrap().entries.is_empty());
    }

    #[tokio::test]
    async fn test_model_failure_records_error_entry_and_advances() {
        let store = InMemorySessionStore::new();
        let locks = SessionLocks::default();
        let evaluator = ScriptedEvaluator::with_replies(vec![Err("HTTP error: timed out")]);
        let session = started(&store, Mode::Practice).await;

        let step = submit_answer(
            &store,
            &locks,
            &evaluator,
            session.id,
            "vlookup_vs_xlookup",
            "x",
        )
        .await
        .unwrap();

        let feedback = step.feedback.unwrap();
        assert_eq!(feedback.correctness, Correctness::Error);
        assert_eq!(feedback.score, 0);
        let entry = &step.session.entries[0];
        assert!(entry.evaluation_raw.starts_with("ERROR: "));
        assert_eq!(step.session.remaining(), 1);
    }

    #[tokio::test]
    async fn test_stale_question_key_is_conflict() {
        let store = InMemorySessionStore::new();
        let locks = SessionLocks::default();
        let evaluator = ScriptedEvaluator::with_replies(vec![Ok(GOOD)]);
        let session = started(&store, Mode::Interview).await;

        let err = submit_answer(&store, &locks, &evaluator, session.id, "pivot_tables", "x")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_concurrent_duplicate_submissions_record_once() {
        let store = Arc::new(InMemorySessionStore::new());
        let locks = SessionLocks::default();
        let evaluator = Arc::new(ScriptedEvaluator::with_replies(vec![Ok(GOOD), Ok(GOOD)]));
        let session = started(&store, Mode::Interview).await;

        let submit = |store: Arc<InMemorySessionStore>, evaluator: Arc<ScriptedEvaluator>| {
            let locks = locks.clone();
            let id = session.id;
            tokio::spawn(async move {
                submit_answer(
                    store.as_ref(),
                    &locks,
                    evaluator.as_ref(),
                    id,
                    "vlookup_vs_xlookup",
                    "same answer",
                )
                .await
            })
        };
        let a = submit(store.clone(), evaluator.clone());
        let b = submit(store.clone(), evaluator.clone());
        let results = [a.await.unwrap(), b.await.unwrap()];

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results
            .iter()
            .any(|r| matches!(r, Err(AppError::Conflict(_)))));
        let stored = load_session(store.as_ref(), session.id).await.unwrap();
        assert_eq!(stored.entries.len(), 1);
    }

    #[tokio::test]
    async fn test_skip_then_finalize_produces_archived_report() {
        let store = InMemorySessionStore::new();
        let locks = SessionLocks::default();
        let evaluator = ScriptedEvaluator::with_replies(vec![Ok(GOOD)]);
        let archive = MemoryArchive::default();
        let session = started(&store, Mode::Interview).await;

        submit_answer(
            &store,
            &locks,
            &evaluator,
            session.id,
            "vlookup_vs_xlookup",
            "a",
        )
        .await
        .unwrap();
        let step = skip_question(&store, &locks, session.id, "pivot_tables").await.unwrap();
        assert!(step.session.is_completed());

        let report = finalize_report(&store, &locks, &evaluator, &archive, session.id)
            .await
            .unwrap();
        assert_eq!(report.transcript.scoreboard.total_score, 9);
        assert_eq!(report.transcript.scoreboard.max_score, 20);
        assert_eq!(report.transcript.summary.as_deref(), Some("Solid fundamentals."));
        assert!(report.archive_key.ends_with(".json"));
        assert!(archive.get(session.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_finalize_is_cached_after_first_call() {
        let store = InMemorySessionStore::new();
        let locks = SessionLocks::default();
        let evaluator = ScriptedEvaluator::with_replies(vec![]);
        let archive = MemoryArchive::default();
        let session = started(&store, Mode::Interview).await;
        skip_question(&store, &locks, session.id, "vlookup_vs_xlookup").await.unwrap();
        skip_question(&store, &locks, session.id, "pivot_tables").await.unwrap();

        let first = finalize_report(&store, &locks, &evaluator, &archive, session.id)
            .await
            .unwrap();
        let second = finalize_report(&store, &locks, &evaluator, &archive, session.id)
            .await
            .unwrap();
        assert_eq!(first, second);
        assert_eq!(*archive.archive_calls.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_finalize_before_completion_is_conflict() {
        let store = InMemorySessionStore::new();
        let locks = SessionLocks::default();
        let evaluator = ScriptedEvaluator::with_replies(vec![]);
        let archive = MemoryArchive::default();
        let session = started(&store, Mode::Interview).await;

        assert!(matches!(
            finalize_report(&store, &locks, &evaluator, &archive, session.id).await,
            Err(AppError::Conflict(_))
        ));
        assert_eq!(*archive.archive_calls.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_summary_failure_still_produces_report() {
        let store = InMemorySessionStore::new();
        let locks = SessionLocks::default();
        let evaluator = ScriptedEvaluator::with_replies(vec![]);
        *evaluator.summary.lock().unwrap() = Some(Err("rate limited".to_string()));
        let archive = MemoryArchive::default();
        let session = started(&store, Mode::Interview).await;
        skip_question(&store, &locks, session.id, "vlookup_vs_xlookup").await.unwrap();
        skip_question(&store, &locks, session.id, "pivot_tables").await.unwrap();

        let report = finalize_report(&store, &locks, &evaluator, &archive, session.id)
            .await
            .unwrap();
        assert!(report.transcript.summary.is_none());
        assert!(report
            .transcript
            .summary_error
            .as_deref()
            .is_some_and(|e| e.contains("rate limited")));
    }

    #[tokio::test]
    async fn test_archive_failure_is_not_cached() {
        let store = InMemorySessionStore::new();
        let locks = SessionLocks::default();
        let evaluator = ScriptedEvaluator::with_replies(vec![]);
        let archive = MemoryArchive {
            fail: true,
            ..Default::default()
        };
        let session = started(&store, Mode::Interview).await;
        skip_question(&store, &locks, session.id, "vlookup_vs_xlookup").await.unwrap();
        skip_question(&store, &locks, session.id, "pivot_tables").await.unwrap();

        assert!(matches!(
            finalize_report(&store, &locks, &evaluator, &archive, session.id).await,
            Err(AppError::S3(_))
        ));
        assert!(load_session(&store, session.id).await.unwrap().report.is_none());
    }

    #[tokio::test]
    async fn test_discard_removes_session() {
        let store = InMemorySessionStore::new();
        let locks = SessionLocks::default();
        let session = started(&store, Mode::Interview).await;

        discard_interview(&store, &locks, session.id).await.unwrap();
        assert_eq!(locks.tracked_sessions(), 0);
        assert!(matches!(
            load_session(&store, session.id).await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            discard_interview(&store, &locks, session.id).await,
            Err(AppError::NotFound(_))
        ));
    }
}
