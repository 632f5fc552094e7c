//! Reply channel back to the surface a request came from.

use async_trait::async_trait;

/// File attached to a reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// One message sent back to the requester.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub content: String,
    pub attachment: Option<Attachment>,
}

impl Reply {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            attachment: None,
        }
    }

    pub fn with_attachment(content: impl Into<String>, attachment: Attachment) -> Self {
        Self {
            content: content.into(),
            attachment: Some(attachment),
        }
    }
}

/// The chat platform refused or failed to deliver a reply.
#[derive(Debug, thiserror::Error)]
#[error("Reply delivery failed: {0}")]
pub struct SinkError(pub String);

/// Platform-specific reply primitive supplied by an entry adapter.
#[async_trait]
pub trait ReplySink: Send + Sync {
    async fn send_reply(&self, reply: Reply) -> Result<(), SinkError>;
}
