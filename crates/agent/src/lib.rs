//! Conversational side of the cotizador.
//!
//! The language model interviews the customer and, once the product is fully described, emits a
//! marker followed by a JSON specification. [`runtime::AgentRuntime`] forwards the chat history
//! to an [`llm::LlmClient`] and hands the model's answer to the quotation engine.
//!
//! The model is strictly a translator. It never decides prices; those come from
//! `cotizador_core`.

pub mod gemini;
pub mod llm;
pub mod prompt;
pub mod runtime;

pub use gemini::{GeminiClient, GenerationConfig};
pub use llm::{
    ChatPart, ChatRole, ChatTurn, CompletionRequest, LlmClient, LlmError, UnconfiguredLlm,
};
pub use runtime::{AgentRuntime, DEFAULT_UPSTREAM_TIMEOUT};
