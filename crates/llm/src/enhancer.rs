//! Best-effort prompt enhancement.
//!
//! When enabled, the user's prompt is sent to the LLM once with a fixed
//! system instruction asking for a more detailed rewrite. Any failure
//! falls back to the original prompt; enhancement never blocks
//! generation.

use crate::client::{ChatMessage, LlmError, OllamaClient};

/// System instruction sent with every enhancement request.
pub const ENHANCE_SYSTEM_PROMPT: &str = "You are an expert at writing prompts for image generation. \
Your task is to enhance the given prompt by adding more descriptive details, \
artistic style references, and technical parameters that will result in a \
higher quality image. Keep the core subject and intent of the original prompt \
intact while making it more detailed and artistic. Return only the enhanced \
prompt without any explanation or additional text.";

/// Result of one enhancement attempt.
#[derive(Debug)]
pub enum EnhanceOutcome {
    /// Enhancement is switched off; no call was made.
    Disabled(String),
    /// The LLM returned a rewrite.
    Enhanced(String),
    /// The call failed; the original prompt is used.
    FellBack { prompt: String, error: LlmError },
}

impl EnhanceOutcome {
    /// The prompt to submit, whichever way the attempt went.
    pub fn prompt(&self) -> &str {
        match self {
            Self::Disabled(p) | Self::Enhanced(p) => p,
            Self::FellBack { prompt, .. } => prompt,
        }
    }

    pub fn into_prompt(self) -> String {
        match self {
            Self::Disabled(p) | Self::Enhanced(p) => p,
            Self::FellBack { prompt, .. } => prompt,
        }
    }
}

/// Rewrites prompts through an LLM when configured to.
#[derive(Clone)]
pub struct PromptEnhancer {
    client: Option<OllamaClient>,
}

impl PromptEnhancer {
    /// Enhancer that calls `client` for every prompt.
    pub fn new(client: OllamaClient) -> Self {
        Self {
            client: Some(client),
        }
    }

    /// Enhancer that returns every prompt unchanged.
    pub fn disabled() -> Self {
        Self { client: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.client.is_some()
    }

    /// Enhance `original`, falling back to it on any failure.
    pub async fn enhance(&self, original: &str) -> EnhanceOutcome {
        let Some(client) = &self.client else {
            return EnhanceOutcome::Disabled(original.to_string());
        };

        let messages = [
            ChatMessage::system(ENHANCE_SYSTEM_PROMPT),
            ChatMessage::user(format!("Original prompt: {original}")),
        ];

        match client.chat(&messages).await {
            Ok(enhanced) => {
                tracing::info!(model = client.model(), enhanced = %enhanced, "Prompt enhanced");
                EnhanceOutcome::Enhanced(enhanced)
            }
            Err(error) => {
                tracing::warn!(
                    model = client.model(),
                    error = %error,
                    "Prompt enhancement failed, using original prompt",
                );
                EnhanceOutcome::FellBack {
                    prompt: original.to_string(),
                    error,
                }
            }
        }
    }
}
