//! `imagebot` -- Discord image generation bot.
//!
//! Accepts `!generate <prompt>` messages, direct messages, and the
//! `/generateimage` slash command, runs each through moderation, optional
//! LLM enhancement, and a ComfyUI job, then replies with the image and
//! archives a copy to object storage.
//!
//! See [`imagebot_bot::config::BotConfig::from_env`] for the environment
//! variables.

use std::sync::Arc;

use anyhow::Context as _;
use serenity::model::gateway::GatewayIntents;
use serenity::Client;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use imagebot_bot::config::{BotConfig, LogFormat, StorageConfig};
use imagebot_bot::handler::Handler;
use imagebot_cloud::local::LocalStorageProvider;
use imagebot_cloud::provider::StorageProvider;
use imagebot_cloud::s3::S3StorageProvider;
use imagebot_comfyui::api::ComfyUIApi;
use imagebot_comfyui::seed::RandomSeed;
use imagebot_core::moderation::ModerationFilter;
use imagebot_llm::client::OllamaClient;
use imagebot_llm::enhancer::PromptEnhancer;
use imagebot_pipeline::coordinator::RequestCoordinator;
use imagebot_pipeline::fetcher::ArtifactFetcher;
use imagebot_pipeline::orchestrator::{GenerationOrchestrator, PollConfig};
use imagebot_pipeline::publisher::ArtifactPublisher;

const DEFAULT_LOG_FILTER: &str = "imagebot=info,imagebot_bot=info,imagebot_pipeline=info,\
imagebot_comfyui=info,imagebot_llm=info,imagebot_cloud=info,imagebot_core=info,serenity=warn";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = BotConfig::from_env();
    init_tracing(config.as_ref().map_or(LogFormat::Text, |c| c.log_format));
    let config = config.context("Invalid configuration")?;

    tracing::info!(
        comfyui = %config.comfyui_url,
        enhance_prompt = config.enhance_prompt,
        serialize_per_user = config.serialize_per_user,
        "Starting imagebot",
    );

    let coordinator = Arc::new(build_coordinator(&config).await?);

    let shutdown = CancellationToken::new();
    let handler = Handler::new(coordinator, config.command_prefix.clone(), shutdown.clone());

    let intents = GatewayIntents::GUILDS
        | GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::DIRECT_MESSAGES
        | GatewayIntents::MESSAGE_CONTENT;

    let mut client = Client::builder(&config.discord_token, intents)
        .event_handler(handler)
        .await
        .context("Failed to build Discord client")?;

    let shard_manager = Arc::clone(&client.shard_manager);
    tokio::spawn(async move {
        shutdown_signal().await;
        shutdown.cancel();
        shard_manager.shutdown_all().await;
    });

    client.start().await.context("Discord gateway error")?;

    tracing::info!("Shutdown complete");
    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into());
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
    }
}

/// Wire every pipeline stage from configuration.
///
/// One HTTP client is shared by the ComfyUI and Ollama clients.
async fn build_coordinator(config: &BotConfig) -> anyhow::Result<RequestCoordinator> {
    let http = reqwest::Client::builder()
        .timeout(config.http_timeout)
        .build()
        .context("Failed to build HTTP client")?;

    let comfyui = ComfyUIApi::with_client(http.clone(), config.comfyui_url.clone());

    let enhancer = if config.enhance_prompt {
        PromptEnhancer::new(OllamaClient::with_client(
            http,
            config.ollama_url.clone(),
            config.ollama_model.clone(),
        ))
    } else {
        PromptEnhancer::disabled()
    };

    let storage: Arc<dyn StorageProvider> = match &config.storage {
        StorageConfig::S3 {
            bucket,
            prefix,
            endpoint_url,
        } => Arc::new(
            S3StorageProvider::from_env(bucket.clone(), prefix, endpoint_url.as_deref()).await,
        ),
        StorageConfig::Local { dir } => Arc::new(LocalStorageProvider::new(dir.clone())),
    };
    tracing::info!(destination = %storage.destination(), "Storage configured");

    let orchestrator = GenerationOrchestrator::new(
        comfyui.clone(),
        config.checkpoint_name.clone(),
        Arc::new(RandomSeed),
        PollConfig {
            interval: config.poll_interval,
            timeout: config.poll_timeout,
        },
    );

    let fetcher = ArtifactFetcher::new(comfyui, config.staging_dir.clone()).with_context(|| {
        format!(
            "Failed to create staging directory {}",
            config.staging_dir.display()
        )
    })?;

    let moderation = Arc::new(ModerationFilter::load(&config.nsfw_keywords_file));

    let coordinator = RequestCoordinator::new(
        moderation,
        enhancer,
        orchestrator,
        fetcher,
        ArtifactPublisher::new(storage),
    );

    Ok(if config.serialize_per_user {
        coordinator.with_user_locks()
    } else {
        coordinator
    })
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), shutting down");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, shutting down");
        }
    }
}
