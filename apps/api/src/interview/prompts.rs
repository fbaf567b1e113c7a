// Interview LLM prompt templates.
// All prompts for the interview module are defined here.

pub const EVAL_SYSTEM: &str = "You are a strict JSON-returning Excel interviewer evaluator.";

/// Evaluation prompt. Replace `{question}`, `{answer}` and `{tags}` before sending.
pub const EVAL_PROMPT_TEMPLATE: &str = r#"You are evaluating a candidate's answer in a mock Excel interview.

QUESTION:
{question}

SKILL TAGS: {tags}

CANDIDATE ANSWER:
{answer}

Return a JSON object with this EXACT schema:
{
  "correctness": "correct" | "partially_correct" | "incorrect",
  "score": 0-10 integer,
  "rationale": "one or two sentences explaining the score",
  "improvements": ["short, concrete suggestion"],
  "canonical_answer": "a concise model answer"
}

SCORING:
- 9-10: correct, complete, and shows practical Excel judgement
- 6-8: correct core idea with gaps or imprecise formulas
- 3-5: partially correct, important misconceptions
- 0-2: incorrect, off-topic, or empty

"#;

pub const SUMMARY_SYSTEM: &str = "You are a friendly career coach and Excel expert.";

/// Summary prompt prefix. The pretty-printed transcript JSON is appended.
pub const SUMMARY_PROMPT_PREFIX: &str = "You are an expert interviewer. \
    Given these Q&A evaluations, produce 3 short paragraphs: \
    strengths, weaknesses, and recommended next steps.\n\n";
