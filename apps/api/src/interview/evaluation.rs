//! Evaluation dispatch — turns a candidate answer into a structured `Evaluation`.
//!
//! `Evaluator` is the seam between the session flow and the model provider.
//! `AppState` holds an `Arc<dyn Evaluator>`; production wires `LlmEvaluator`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::errors::AppError;
use crate::interview::prompts::{
    EVAL_PROMPT_TEMPLATE, EVAL_SYSTEM, SUMMARY_PROMPT_PREFIX, SUMMARY_SYSTEM,
};
use crate::interview::questions::Question;
use crate::interview::transcript::Transcript;
use crate::llm_client::prompts::JSON_ONLY_INSTRUCTION;
use crate::llm_client::{extract_json_object, ChatParams, LlmClient};

/// Highest score a single answer can earn.
pub const MAX_SCORE_PER_QUESTION: u32 = 10;

const EVAL_MAX_TOKENS: u32 = 350;
const EVAL_TEMPERATURE: f32 = 0.0;
const SUMMARY_MAX_TOKENS: u32 = 400;
const SUMMARY_TEMPERATURE: f32 = 0.2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Correctness {
    Correct,
    PartiallyCorrect,
    Incorrect,
    Skipped,
    Error,
}

impl Correctness {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().replace([' ', '-'], "_").as_str() {
            "correct" => Some(Correctness::Correct),
            "partially_correct" | "partial" | "partly_correct" => {
                Some(Correctness::PartiallyCorrect)
            }
            "incorrect" | "wrong" => Some(Correctness::Incorrect),
            _ => None,
        }
    }

    fn from_score(score: u8) -> Self {
        match score {
            8..=u8::MAX => Correctness::Correct,
            4..=7 => Correctness::PartiallyCorrect,
            _ => Correctness::Incorrect,
        }
    }
}

/// Structured result of grading one answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub correctness: Correctness,
    /// 0 – 10
    pub score: u8,
    pub rationale: String,
    #[serde(default)]
    pub improvements: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub canonical_answer: Option<String>,
}

impl Evaluation {
    pub fn skipped() -> Self {
        Self {
            correctness: Correctness::Skipped,
            score: 0,
            rationale: "skipped".to_string(),
            improvements: vec![],
            canonical_answer: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            correctness: Correctness::Error,
            score: 0,
            rationale: message.into(),
            improvements: vec![],
            canonical_answer: None,
        }
    }
}

/// An evaluation plus the exact text the model returned (or a marker for skip/error).
#[derive(Debug, Clone)]
pub struct EvaluationOutcome {
    pub evaluation: Evaluation,
    pub raw: String,
}

impl EvaluationOutcome {
    pub fn failed(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            raw: format!("ERROR: {message}"),
            evaluation: Evaluation::error(message),
        }
    }
}

/// Lenient shape of the model's JSON. Every field is optional and loosely typed.
#[derive(Debug, Default, Deserialize)]
struct RawEvaluation {
    #[serde(default)]
    correctness: Option<String>,
    #[serde(default)]
    score: Option<Value>,
    #[serde(default)]
    rationale: Option<Value>,
    #[serde(default)]
    improvements: Option<Value>,
    #[serde(default)]
    canonical_answer: Option<Value>,
}

/// Parses model output into an `Evaluation`.
///
/// Accepts fenced or chatty output, a score given as number or numeric string
/// (rounded and clamped to 0..=10), and improvements given as a list or a single string.
/// Text fields given as lists or numbers are flattened to text.
/// Missing correctness is derived from the score.
pub fn parse_evaluation(text: &str) -> Result<Evaluation, serde_json::Error> {
    let raw: RawEvaluation = serde_json::from_str(extract_json_object(text))?;

    let score = raw.score.as_ref().map(normalize_score).unwrap_or(0);
    let correctness = raw
        .correctness
        .as_deref()
        .and_then(Correctness::parse)
        .unwrap_or_else(|| Correctness::from_score(score));
    let improvements = match raw.improvements {
        Some(Value::Array(items)) => items.into_iter().filter_map(value_text).collect(),
        Some(other) => value_text(other).into_iter().collect(),
        None => vec![],
    };

    Ok(Evaluation {
        correctness,
        score,
        rationale: raw.rationale.and_then(value_text).unwrap_or_default(),
        improvements,
        canonical_answer: raw.canonical_answer.and_then(value_text),
    })
}

/// Flattens a loosely typed JSON value to non-blank text. Lists are joined line by line.
fn value_text(value: Value) -> Option<String> {
    let text = match value {
        Value::Null => return None,
        Value::String(s) => s,
        Value::Array(items) => items
            .into_iter()
            .filter_map(value_text)
            .collect::<Vec<_>>()
            .join("\n"),
        other => other.to_string(),
    };
    (!text.trim().is_empty()).then_some(text)
}

fn normalize_score(value: &Value) -> u8 {
    let numeric = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match numeric {
        Some(n) if n.is_finite() => n.round().clamp(0.0, MAX_SCORE_PER_QUESTION as f64) as u8,
        _ => 0,
    }
}

/// Builds the evaluation prompt for one answer.
pub fn make_eval_prompt(question: &str, answer: &str, tags: &[String]) -> String {
    let tags = if tags.is_empty() {
        "general".to_string()
    } else {
        tags.join(", ")
    };
    let mut prompt = EVAL_PROMPT_TEMPLATE
        .replace("{question}", question)
        .replace("{tags}", &tags)
        .replace("{answer}", answer);
    prompt.push_str(JSON_ONLY_INSTRUCTION);
    prompt
}

/// Builds the end-of-interview summary prompt over the transcript entries.
pub fn make_summary_prompt(transcript: &Transcript) -> Result<String, serde_json::Error> {
    let entries = serde_json::to_string_pretty(&transcript.entries)?;
    Ok(format!("{SUMMARY_PROMPT_PREFIX}{entries}"))
}

/// Grades answers and writes the closing summary. Implement this to swap backends
/// without touching the session flow or handlers.
#[async_trait]
pub trait Evaluator: Send + Sync {
    /// Never fails: provider or parse errors come back as an `error` evaluation.
    async fn evaluate(&self, question: &Question, answer: &str, model: &str) -> EvaluationOutcome;

    async fn summarize(&self, transcript: &Transcript, model: &str) -> Result<String, AppError>;
}

/// Evaluator backed by the chat-completions API.
pub struct LlmEvaluator(pub LlmClient);

#[async_trait]
impl Evaluator for LlmEvaluator {
    async fn evaluate(&self, question: &Question, answer: &str, model: &str) -> EvaluationOutcome {
        let prompt = make_eval_prompt(&question.text, answer, &question.tags);
        let params = ChatParams {
            model,
            system: EVAL_SYSTEM,
            prompt: &prompt,
            max_tokens: EVAL_MAX_TOKENS,
            temperature: EVAL_TEMPERATURE,
        };

        let text = match self.0.call_text(params).await {
            Ok(text) => text,
            Err(e) => {
                warn!("Evaluation call failed for question {}: {e}", question.key);
                return EvaluationOutcome::failed(e.to_string());
            }
        };

        match parse_evaluation(&text) {
            Ok(evaluation) => {
                info!(
                    "Evaluated question {}: score={} correctness={:?}",
                    question.key, evaluation.score, evaluation.correctness
                );
                EvaluationOutcome {
                    evaluation,
                    raw: text,
                }
            }
            Err(e) => {
                warn!("Unparsable evaluation for question {}: {e}", question.key);
                EvaluationOutcome {
                    evaluation: Evaluation::error(e.to_string()),
                    raw: format!("ERROR: {e}\n{text}"),
                }
            }
        }
    }

    async fn summarize(&self, transcript: &Transcript, model: &str) -> Result<String, AppError> {
        let prompt = make_summary_prompt(transcript)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Transcript serialization: {e}")))?;
        let params = ChatParams {
            model,
            system: SUMMARY_SYSTEM,
            prompt: &prompt,
            max_tokens: SUMMARY_MAX_TOKENS,
            temperature: SUMMARY_TEMPERATURE,
        };
        self.0
            .call_text(params)
            .await
            .map_err(|e| AppError::Llm(format!("Feedback generation failed: {e}")))
    }
}
