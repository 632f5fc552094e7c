//! Reply sinks backed by the Discord REST API.

use std::sync::Arc;

use async_trait::async_trait;
use serenity::builder::{CreateAttachment, CreateInteractionResponseFollowup, CreateMessage};
use serenity::http::Http;
use serenity::model::application::CommandInteraction;
use serenity::model::id::{ChannelId, MessageId};

use imagebot_pipeline::sink::{Reply, ReplySink, SinkError};

/// Replies to the requester's message in the channel it arrived in.
pub struct ChannelSink {
    http: Arc<Http>,
    channel_id: ChannelId,
    reply_to: MessageId,
}

impl ChannelSink {
    pub fn new(http: Arc<Http>, channel_id: ChannelId, reply_to: MessageId) -> Self {
        Self {
            http,
            channel_id,
            reply_to,
        }
    }
}

/// Build a message that references `reply_to` so the chat client threads it.
pub fn channel_message(reply: Reply, channel_id: ChannelId, reply_to: MessageId) -> CreateMessage {
    let mut message = CreateMessage::new()
        .content(reply.content)
        .reference_message((channel_id, reply_to));
    if let Some(attachment) = reply.attachment {
        message = message.add_file(CreateAttachment::bytes(attachment.bytes, attachment.filename));
    }
    message
}

#[async_trait]
impl ReplySink for ChannelSink {
    async fn send_reply(&self, reply: Reply) -> Result<(), SinkError> {
        let message = channel_message(reply, self.channel_id, self.reply_to);
        self.channel_id
            .send_message(&self.http, message)
            .await
            .map(|_| ())
            .map_err(|e| SinkError(e.to_string()))
    }
}

/// Answers a deferred slash command with a follow-up message.
pub struct FollowupSink {
    http: Arc<Http>,
    command: CommandInteraction,
}

impl FollowupSink {
    pub fn new(http: Arc<Http>, command: CommandInteraction) -> Self {
        Self { http, command }
    }
}

#[async_trait]
impl ReplySink for FollowupSink {
    async fn send_reply(&self, reply: Reply) -> Result<(), SinkError> {
        let mut followup = CreateInteractionResponseFollowup::new().content(reply.content);
        if let Some(attachment) = reply.attachment {
            followup = followup.add_file(CreateAttachment::bytes(attachment.bytes, attachment.filename));
        }
        self.command
            .create_followup(&self.http, followup)
            .await
            .map(|_| ())
            .map_err(|e| SinkError(e.to_string()))
    }
}
