use std::sync::Arc;

use serenity::async_trait;
use serenity::model::application::Interaction;
use serenity::model::channel::Message;
use serenity::model::gateway::Ready;
use serenity::prelude::{Context, EventHandler};
use tokio_util::sync::CancellationToken;

use imagebot_core::response::USAGE_MESSAGE;
use imagebot_core::types::{Origin, Request, Requester};
use imagebot_pipeline::coordinator::RequestCoordinator;

use crate::commands;
use crate::sink::ChannelSink;

/// Serenity event handler that feeds chat messages into the pipeline.
pub struct Handler {
    coordinator: Arc<RequestCoordinator>,
    command_prefix: String,
    shutdown: CancellationToken,
}

impl Handler {
    pub fn new(
        coordinator: Arc<RequestCoordinator>,
        command_prefix: String,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            coordinator,
            command_prefix,
            shutdown,
        }
    }
}

#[async_trait]
impl EventHandler for Handler {
    async fn ready(&self, ctx: Context, ready: Ready) {
        tracing::info!(name = %ready.user.name, guilds = ready.guilds.len(), "Discord bot connected");
        commands::register(&ctx).await;
    }

    async fn message(&self, ctx: Context, msg: Message) {
        if msg.author.bot || msg.author.id == ctx.cache.current_user().id {
            return;
        }

        let is_direct = msg.guild_id.is_none();
        let Some((origin, prompt)) = route_message(&msg.content, &self.command_prefix, is_direct)
        else {
            return;
        };

        let requester = Requester {
            id: msg.author.id.to_string(),
            name: msg.author.name.clone(),
        };
        let request = match Request::new(requester, origin, prompt) {
            Ok(request) => request,
            Err(e) => {
                tracing::debug!(error = %e, origin = origin.as_str(), "Rejected message");
                if let Err(e) = msg.channel_id.say(&ctx.http, USAGE_MESSAGE).await {
                    tracing::warn!(error = %e, "Failed to send usage hint");
                }
                return;
            }
        };

        let typing = msg.channel_id.start_typing(&ctx.http);
        let sink = ChannelSink::new(Arc::clone(&ctx.http), msg.channel_id, msg.id);
        self.coordinator.handle(&request, &sink, &self.shutdown).await;
        typing.stop();
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        if let Interaction::Command(command) = interaction {
            if command.data.name == commands::COMMAND_NAME {
                commands::handle(&self.coordinator, &ctx, &command, &self.shutdown).await;
            }
        }
    }
}

/// Strip `prefix` from `content` and return the trimmed remainder.
pub fn extract_prefix_prompt<'a>(content: &'a str, prefix: &str) -> Option<&'a str> {
    content.strip_prefix(prefix).map(str::trim)
}

/// Decide whether a chat message is an image request.
///
/// A prefixed message is a request anywhere. In a direct-message
/// channel every message is a request, prefix or not.
pub fn route_message<'a>(content: &'a str, prefix: &str, is_direct: bool) -> Option<(Origin, &'a str)> {
    if let Some(prompt) = extract_prefix_prompt(content, prefix) {
        return Some((Origin::Prefix, prompt));
    }
    is_direct.then(|| (Origin::DirectMessage, content.trim()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PREFIX: &str = "!generate ";

    #[test]
    fn prefix_is_stripped_and_trimmed() {
        assert_eq!(extract_prefix_prompt("!generate  a red fox ", PREFIX), Some("a red fox"));
        assert_eq!(extract_prefix_prompt("!generate ", PREFIX), Some(""));
        assert_eq!(extract_prefix_prompt("!generatea fox", PREFIX), None);
        assert_eq!(extract_prefix_prompt("please !generate a fox", PREFIX), None);
    }

    #[test]
    fn guild_messages_need_the_prefix() {
        assert_eq!(route_message("hello there", PREFIX, false), None);
        assert_eq!(
            route_message("!generate a fox", PREFIX, false),
            Some((Origin::Prefix, "a fox"))
        );
    }

    #[test]
    fn direct_messages_are_always_requests() {
        assert_eq!(
            route_message(" a fox in snow ", PREFIX, true),
            Some((Origin::DirectMessage, "a fox in snow"))
        );
        assert_eq!(
            route_message("!generate a fox", PREFIX, true),
            Some((Origin::Prefix, "a fox"))
        );
    }

    #[test]
    fn bare_prefix_yields_empty_prompt() {
        let (_, prompt) = route_message("!generate    ", PREFIX, false).unwrap();
        assert!(prompt.is_empty());
    }
}
