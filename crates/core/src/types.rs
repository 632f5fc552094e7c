//! Request-level types shared by every pipeline stage.

use crate::error::CoreError;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// The chat surface a request arrived on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// A prefixed text command in a shared channel (`!generate ...`).
    Prefix,
    /// Any message sent to the bot in a direct-message channel.
    DirectMessage,
    /// The `/generateimage` slash command.
    Slash,
}

impl Origin {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Prefix => "prefix",
            Self::DirectMessage => "direct_message",
            Self::Slash => "slash",
        }
    }
}

/// Who asked for the image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requester {
    /// Stable platform identifier (used for per-user locking).
    pub id: String,
    /// Display name (used in published artifact names).
    pub name: String,
}

/// One user-initiated image request.
///
/// Built by an entry adapter and never mutated afterwards. The reply
/// capability travels alongside the request as a separate sink so that
/// this type stays plain data.
#[derive(Debug, Clone)]
pub struct Request {
    pub requester: Requester,
    pub origin: Origin,
    /// Prompt text exactly as the user wrote it (trimmed).
    pub prompt: String,
    pub arrived_at: Timestamp,
}

impl Request {
    /// Create a request stamped with the current time.
    ///
    /// Rejects prompts that are empty after trimming.
    pub fn new(requester: Requester, origin: Origin, prompt: &str) -> Result<Self, CoreError> {
        Self::at(requester, origin, prompt, chrono::Utc::now())
    }

    /// Create a request with an explicit arrival time.
    pub fn at(
        requester: Requester,
        origin: Origin,
        prompt: &str,
        arrived_at: Timestamp,
    ) -> Result<Self, CoreError> {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err(CoreError::Validation("prompt must not be empty".to_string()));
        }
        Ok(Self {
            requester,
            origin,
            prompt: prompt.to_string(),
            arrived_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> Requester {
        Requester {
            id: "42".to_string(),
            name: "alice".to_string(),
        }
    }

    #[test]
    fn new_trims_prompt() {
        let req = Request::new(alice(), Origin::Prefix, "  a cat  ").unwrap();
        assert_eq!(req.prompt, "a cat");
        assert_eq!(req.origin, Origin::Prefix);
    }

    #[test]
    fn new_rejects_blank_prompt() {
        assert!(Request::new(alice(), Origin::Slash, "   ").is_err());
        assert!(Request::new(alice(), Origin::DirectMessage, "").is_err());
    }

    #[test]
    fn origin_labels() {
        assert_eq!(Origin::Prefix.as_str(), "prefix");
        assert_eq!(Origin::DirectMessage.as_str(), "direct_message");
        assert_eq!(Origin::Slash.as_str(), "slash");
    }
}
