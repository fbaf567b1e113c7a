// Interview engine: question bank, session state machine, evaluation dispatch,
// transcript assembly and archiving.
// All LLM calls go through llm_client via evaluation::LlmEvaluator.

pub mod archive;
pub mod evaluation;
pub mod flow;
pub mod handlers;
pub mod prompts;
pub mod questions;
pub mod session;
pub mod store;
pub mod transcript;
