//! User-facing reply text.
//!
//! Internal failure detail never reaches the chat surface; every hard
//! failure is rendered as one of the fixed messages below.

/// Sent for any hard stage failure.
pub const GENERIC_FAILURE_MESSAGE: &str = "Failed to generate image.";

/// Sent when something outside the staged pipeline goes wrong.
pub const UNEXPECTED_FAILURE_MESSAGE: &str =
    "Sorry, something went wrong while processing your request.";

/// Hint sent when a prompt is empty.
pub const USAGE_MESSAGE: &str = "Please describe the image you want, e.g. `!generate a cat on a windowsill`.";

/// Compose the caption sent alongside a delivered image.
///
/// When enhancement is enabled and actually changed the prompt, the
/// caption labels the rewritten text as the image prompt; otherwise it
/// shows the literal prompt used.
pub fn format_response(original: &str, final_prompt: &str, enhancement_enabled: bool) -> String {
    if enhancement_enabled && original != final_prompt {
        format!("Image prompt: {final_prompt}")
    } else {
        format!("Prompt: {final_prompt}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unchanged_prompt() {
        assert_eq!(format_response("a cat", "a cat", false), "Prompt: a cat");
        assert_eq!(format_response("a cat", "a cat", true), "Prompt: a cat");
    }

    #[test]
    fn enhanced_prompt() {
        assert_eq!(
            format_response("a cat", "a fluffy cat, oil painting", true),
            "Image prompt: a fluffy cat, oil painting"
        );
    }

    #[test]
    fn moderated_prompt_with_enhancement_disabled() {
        assert_eq!(
            format_response("nsfw", "my little pony in a field", false),
            "Prompt: my little pony in a field"
        );
    }
}
