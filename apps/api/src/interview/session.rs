//! Interview session state machine.
//!
//! A session walks an ordered question list once: each question gets exactly one
//! transcript entry (answered or skipped), in order. After the last entry the session
//! is `Completed` and accepts no further submissions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::AppError;
use crate::interview::questions::Question;
use crate::interview::transcript::{Scoreboard, Transcript, TranscriptEntry};
use crate::llm_client::{is_allowed_model, ALLOWED_MODELS};

/// When feedback reaches the candidate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Feedback only at the end.
    #[default]
    Interview,
    /// Feedback after each question.
    Practice,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SessionStatus {
    InProgress { current_index: usize },
    Completed { completed_at: DateTime<Utc> },
}

/// Finalized report cached on the session so the summary and archive run once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalReport {
    pub transcript: Transcript,
    pub archive_key: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub mode: Mode,
    pub model: String,
    pub started_at: DateTime<Utc>,
    pub questions: Vec<Question>,
    pub entries: Vec<TranscriptEntry>,
    pub status: SessionStatus,
    #[serde(default)]
    pub report: Option<FinalReport>,
}

impl Session {
    pub fn new(mode: Mode, model: &str, questions: Vec<Question>) -> Result<Self, AppError> {
        if questions.is_empty() {
            return Err(AppError::Validation(
                "An interview needs at least one question".to_string(),
            ));
        }
        validate_model(model)?;

        Ok(Self {
            id: Uuid::new_v4(),
            mode,
            model: model.to_string(),
            started_at: Utc::now(),
            questions,
            entries: Vec::new(),
            status: SessionStatus::InProgress { current_index: 0 },
            report: None,
        })
    }

    pub fn is_completed(&self) -> bool {
        matches!(self.status, SessionStatus::Completed { .. })
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        match self.status {
            SessionStatus::Completed { completed_at } => Some(completed_at),
            SessionStatus::InProgress { .. } => None,
        }
    }

    pub fn current_index(&self) -> Option<usize> {
        match self.status {
            SessionStatus::InProgress { current_index } => Some(current_index),
            SessionStatus::Completed { .. } => None,
        }
    }

    pub fn current_question(&self) -> Option<&Question> {
        self.current_index().and_then(|i| self.questions.get(i))
    }

    pub fn remaining(&self) -> usize {
        self.questions.len() - self.entries.len()
    }

    /// An entry's evaluation is visible if it was answered in practice mode, or once the
    /// session is done. Switching to practice later does not expose earlier answers.
    pub fn reveals(&self, entry: &TranscriptEntry) -> bool {
        entry.mode == Mode::Practice || self.is_completed()
    }

    /// Running totals are shown only when every recorded evaluation is.
    pub fn reveals_scoreboard(&self) -> bool {
        self.entries.iter().all(|e| self.reveals(e))
    }

    /// Returns the current question if `question_key` names it.
    /// Stale, out-of-order and post-completion submissions are conflicts.
    pub fn ensure_current(&self, question_key: &str) -> Result<&Question, AppError> {
        let current = self.current_question().ok_or_else(|| {
            AppError::Conflict(format!("Interview {} is already completed", self.id))
        })?;
        if current.key != question_key {
            return Err(AppError::Conflict(format!(
                "Question '{question_key}' is not the current question (expected '{}')",
                current.key
            )));
        }
        Ok(current)
    }

    /// Appends the entry for the current question, stamped with the current mode, and advances.
    pub fn record(&mut self, mut entry: TranscriptEntry) -> Result<&TranscriptEntry, AppError> {
        self.ensure_current(&entry.question_key)?;
        entry.mode = self.mode;
        self.entries.push(entry);
        self.advance();
        Ok(&self.entries[self.entries.len() - 1])
    }

    pub fn skip(&mut self, question_key: &str) -> Result<&TranscriptEntry, AppError> {
        let entry = TranscriptEntry::skipped(self.ensure_current(question_key)?);
        self.record(entry)
    }

    pub fn set_mode(&mut self, mode: Mode) -> Result<(), AppError> {
        self.ensure_in_progress()?;
        self.mode = mode;
        Ok(())
    }

    pub fn set_model(&mut self, model: &str) -> Result<(), AppError> {
        self.ensure_in_progress()?;
        validate_model(model)?;
        self.model = model.to_string();
        Ok(())
    }

    pub fn scoreboard(&self) -> Scoreboard {
        Scoreboard::compute(&self.entries, self.questions.len())
    }

    fn ensure_in_progress(&self) -> Result<(), AppError> {
        if self.is_completed() {
            return Err(AppError::Conflict(format!(
                "Interview {} is already completed",
                self.id
            )));
        }
        Ok(())
    }

    fn advance(&mut self) {
        let next = self.entries.len();
        self.status = if next >= self.questions.len() {
            SessionStatus::Completed {
                completed_at: Utc::now(),
            }
        } else {
            SessionStatus::InProgress {
                current_index: next,
            }
        };
    }
}

/// Answers must carry some text. The answer itself is recorded as given.
pub fn validate_answer(answer: &str) -> Result<(), AppError> {
    if answer.trim().is_empty() {
        return Err(AppError::Validation("Please enter an answer.".to_string()));
    }
    Ok(())
}

fn validate_model(model: &str) -> Result<(), AppError> {
    if !is_allowed_model(model) {
        return Err(AppError::Validation(format!(
            "model '{model}' is not one of: {}",
            ALLOWED_MODELS.join(", ")
        )));
    }
    Ok(())
}
