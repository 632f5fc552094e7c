//! LLM access for prompt enhancement.
//!
//! [`client::OllamaClient`] speaks the Ollama `/api/chat` protocol;
//! [`enhancer::PromptEnhancer`] layers the best-effort rewrite policy
//! on top of it.

pub mod client;
pub mod enhancer;
