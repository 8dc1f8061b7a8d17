//! Case analysis backed by an external language model.
//!
//! The model only proposes a complexity label, a surcharge percentage, extra
//! services and proposal prose. Prices are always computed deterministically by
//! the caller from the price table; a surcharge outside the supported range is
//! clamped before it leaves this crate.
//!
//! - `llm`: the `LlmClient` seam and its error type
//! - `openai`: reqwest client for OpenAI-compatible chat completion endpoints
//! - `response`: strict extraction of the JSON object from a free-text reply
//! - `analyzer`: `CaseAnalyzer`, which never fails and degrades with a reason

pub mod analyzer;
pub mod llm;
pub mod openai;
pub mod response;

pub use analyzer::CaseAnalyzer;
pub use llm::{CompletionRequest, LlmClient, LlmError};
pub use openai::OpenAiClient;
