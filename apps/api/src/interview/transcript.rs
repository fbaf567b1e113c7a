//! Transcript assembly — the recorded questions, answers and evaluations of a session,
//! plus the score totals and closing summary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::AppError;
use crate::interview::evaluation::{
    Correctness, Evaluation, EvaluationOutcome, MAX_SCORE_PER_QUESTION,
};
use crate::interview::questions::Question;
use crate::interview::session::{Mode, Session};

/// One answered (or skipped) question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub question_key: String,
    pub question: String,
    pub answer: String,
    pub evaluation_raw: String,
    pub evaluation: Evaluation,
    /// Mode in force when the entry was recorded; stamped by `Session::record`.
    #[serde(default)]
    pub mode: Mode,
    pub timestamp: DateTime<Utc>,
}

impl TranscriptEntry {
    pub fn answered(question: &Question, answer: &str, outcome: EvaluationOutcome) -> Self {
        Self {
            question_key: question.key.clone(),
            question: question.text.clone(),
            answer: answer.to_string(),
            evaluation_raw: outcome.raw,
            evaluation: outcome.evaluation,
            mode: Mode::default(),
            timestamp: Utc::now(),
        }
    }

    pub fn skipped(question: &Question) -> Self {
        Self {
            question_key: question.key.clone(),
            question: question.text.clone(),
            answer: String::new(),
            evaluation_raw: "skipped".to_string(),
            evaluation: Evaluation::skipped(),
            mode: Mode::default(),
            timestamp: Utc::now(),
        }
    }

    pub fn is_skipped(&self) -> bool {
        self.evaluation.correctness == Correctness::Skipped
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Scoreboard {
    pub total_score: u32,
    pub max_score: u32,
    pub percentage: f64,
}

impl Scoreboard {
    /// `max_score` counts every question in the session, answered or not.
    pub fn compute(entries: &[TranscriptEntry], question_count: usize) -> Self {
        let total_score = entries.iter().map(|e| e.evaluation.score as u32).sum();
        let max_score = question_count as u32 * MAX_SCORE_PER_QUESTION;
        let percentage = if max_score == 0 {
            0.0
        } else {
            total_score as f64 / max_score as f64 * 100.0
        };
        Self {
            total_score,
            max_score,
            percentage,
        }
    }
}

/// Full record of a completed session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    pub session_id: Uuid,
    pub mode: Mode,
    pub model: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub entries: Vec<TranscriptEntry>,
    #[serde(flatten)]
    pub scoreboard: Scoreboard,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary_error: Option<String>,
}

impl Transcript {
    /// Snapshots a completed session. Fails with `Conflict` while questions remain.
    pub fn from_session(session: &Session) -> Result<Self, AppError> {
        let completed_at = session.completed_at().ok_or_else(|| {
            AppError::Conflict(format!(
                "Interview {} still has {} unanswered question(s)",
                session.id,
                session.remaining()
            ))
        })?;

        Ok(Self {
            session_id: session.id,
            mode: session.mode,
            model: session.model.clone(),
            started_at: session.started_at,
            completed_at,
            entries: session.entries.clone(),
            scoreboard: session.scoreboard(),
            summary: None,
            summary_error: None,
        })
    }

    /// Renders the final report as markdown.
    pub fn render_markdown(&self) -> String {
        let board = &self.scoreboard;
        let mut md = format!("# Excel Interview Report — Session {}\n\n", self.session_id);
        md.push_str(&format!(
            "**Total Score:** {}/{} ({:.1}%)\n\n",
            board.total_score, board.max_score, board.percentage
        ));
        md.push_str(&format!(
            "- **Started (UTC):** {}\n- **Completed (UTC):** {}\n- **Model:** {}\n\n",
            self.started_at.to_rfc3339(),
            self.completed_at.to_rfc3339(),
            self.model
        ));

        for (i, entry) in self.entries.iter().enumerate() {
            let eval = &entry.evaluation;
            md.push_str(&format!("## Q{}: {}\n\n", i + 1, entry.question));
            md.push_str(&format!("**Answer:**\n```\n{}\n```\n", entry.answer));
            md.push_str(&format!(
                "- **Score:** {}\n- **Correctness:** {}\n",
                eval.score,
                correctness_label(eval.correctness)
            ));
            if !eval.rationale.is_empty() {
                md.push_str(&format!("- **Rationale:** {}\n", eval.rationale));
            }
            if !eval.improvements.is_empty() {
                md.push_str("- **Improvements:**\n");
                for item in &eval.improvements {
                    md.push_str(&format!("  - {item}\n"));
                }
            }
            if let Some(canonical) = &eval.canonical_answer {
                md.push_str(&format!("- **Canonical answer:** {canonical}\n"));
            }
            md.push('\n');
        }

        md.push_str("## Constructive Feedback\n\n");
        match (&self.summary, &self.summary_error) {
            (Some(summary), _) => md.push_str(summary),
            (None, Some(err)) => md.push_str(&format!("_{err}_")),
            (None, None) => md.push_str("_No summary available._"),
        }
        md.push('\n');
        md
    }
}

fn correctness_label(c: Correctness) -> &'static str {
    match c {
        Correctness::Correct => "correct",
        Correctness::PartiallyCorrect => "partially correct",
        Correctness::Incorrect => "incorrect",
        Correctness::Skipped => "skipped",
        Correctness::Error => "error",
    }
}
