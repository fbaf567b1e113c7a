use std::sync::Arc;

use crate::config::Config;
use crate::interview::archive::TranscriptArchive;
use crate::interview::evaluation::Evaluator;
use crate::interview::questions::QuestionBank;
use crate::interview::store::{SessionLocks, SessionStore};

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub bank: Arc<QuestionBank>,
    /// Live sessions. Redis in production, in-memory in tests.
    pub sessions: Arc<dyn SessionStore>,
    pub locks: SessionLocks,
    /// Pluggable evaluator. Default: LlmEvaluator over the shared LlmClient.
    pub evaluator: Arc<dyn Evaluator>,
    /// Completed transcripts: Postgres row + S3 JSON object.
    pub archive: Arc<dyn TranscriptArchive>,
}
