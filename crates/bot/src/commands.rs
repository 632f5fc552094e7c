//! The `/generateimage` slash command.
//!
//! Registered globally from `ready()`. Interactions are deferred first so
//! Discord shows a "thinking" state, then answered with a single
//! follow-up once the pipeline finishes.

use std::sync::Arc;
use std::time::Duration;

use serenity::builder::{
    CreateCommand, CreateCommandOption, CreateInteractionResponse,
    CreateInteractionResponseMessage,
};
use serenity::model::application::{Command, CommandInteraction, CommandOptionType};
use serenity::prelude::Context;
use tokio_util::sync::CancellationToken;

use imagebot_core::response::USAGE_MESSAGE;
use imagebot_core::types::{Origin, Request, Requester};
use imagebot_pipeline::coordinator::RequestCoordinator;

use crate::sink::FollowupSink;

pub const COMMAND_NAME: &str = "generateimage";
const PROMPT_OPTION: &str = "prompt";

/// How long Discord accepts follow-ups after a deferred response.
pub const FOLLOWUP_WINDOW: Duration = Duration::from_secs(15 * 60);

fn definition() -> CreateCommand {
    CreateCommand::new(COMMAND_NAME)
        .description("Generate an image from a text prompt")
        .add_option(
            CreateCommandOption::new(
                CommandOptionType::String,
                PROMPT_OPTION,
                "Describe the image to generate",
            )
            .required(true),
        )
}

/// Register the global slash command. Failure is logged and ignored.
pub async fn register(ctx: &Context) {
    match Command::set_global_commands(&ctx.http, vec![definition()]).await {
        Ok(commands) => tracing::info!(count = commands.len(), "Registered slash commands"),
        Err(e) => tracing::warn!(error = %e, "Failed to register slash commands"),
    }
}

/// Run one `/generateimage` interaction through the pipeline.
pub async fn handle(
    coordinator: &RequestCoordinator,
    ctx: &Context,
    command: &CommandInteraction,
    shutdown: &CancellationToken,
) {
    let prompt = command
        .data
        .options
        .iter()
        .find(|o| o.name == PROMPT_OPTION)
        .and_then(|o| o.value.as_str())
        .unwrap_or("");

    let requester = Requester {
        id: command.user.id.to_string(),
        name: command.user.name.clone(),
    };
    let request = match Request::new(requester, Origin::Slash, prompt) {
        Ok(request) => request,
        Err(e) => {
            tracing::debug!(error = %e, "Rejected slash command");
            respond_ephemeral(ctx, command, USAGE_MESSAGE).await;
            return;
        }
    };

    if let Err(e) = command.defer(&ctx.http).await {
        tracing::warn!(error = %e, "Failed to defer interaction");
        return;
    }

    let cancel = deadline_token(shutdown, FOLLOWUP_WINDOW);
    let sink = FollowupSink::new(Arc::clone(&ctx.http), command.clone());
    coordinator.handle(&request, &sink, &cancel).await;
    cancel.cancel();
}

/// Child of `parent` that also cancels itself once `window` elapses.
pub fn deadline_token(parent: &CancellationToken, window: Duration) -> CancellationToken {
    let token = parent.child_token();
    let timer = token.clone();
    tokio::spawn(async move {
        tokio::select! {
            _ = timer.cancelled() => {}
            _ = tokio::time::sleep(window) => {
                tracing::warn!(window_secs = window.as_secs(), "Follow-up window expired");
                timer.cancel();
            }
        }
    });
    token
}

async fn respond_ephemeral(ctx: &Context, command: &CommandInteraction, content: &str) {
    let response = CreateInteractionResponse::Message(
        CreateInteractionResponseMessage::new()
            .content(content)
            .ephemeral(true),
    );
    if let Err(e) = command.create_response(&ctx.http, response).await {
        tracing::warn!(error = %e, "Failed to send ephemeral response");
    }
}
