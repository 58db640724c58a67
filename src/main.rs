mod bilibili;
mod config;
mod error;
mod message;

use std::sync::Arc;

use poise::serenity_prelude as serenity;
use tokio::signal::unix::{signal, SignalKind};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::bilibili::{
    extract_link, resolve_link, IncomingMessage, VideoEmbedder, VideoId, NO_REFERENCE,
};
use crate::config::{Config, CONFIG_FILE};
use crate::error::BotError;
use crate::message::{SendMessage, SendableMessage, VideoCaption};

pub type Error = Box<dyn std::error::Error + Send + Sync>;
pub type PoiseContext<'a> = poise::Context<'a, Data, Error>;

pub struct Data {
    embedder: Arc<VideoEmbedder>,
}

/// Registers slash commands in this guild or globally
#[poise::command(prefix_command, hide_in_help, owners_only)]
async fn register(ctx: PoiseContext<'_>) -> Result<(), Error> {
    poise::builtins::register_application_commands_buttons(ctx).await?;
    tracing::info!("Registering...");
    Ok(())
}

/// Show this help menu
#[poise::command(slash_command, prefix_command, track_edits)]
async fn help(
    ctx: PoiseContext<'_>,
    #[description = "Specific command to show help about"]
    #[autocomplete = "poise::builtins::autocomplete_command"]
    command: Option<String>,
) -> Result<(), Error> {
    poise::builtins::help(ctx, command.as_deref(), Default::default()).await?;
    Ok(())
}

/// Post the video behind a bilibili link, share text or BV/av id
#[poise::command(slash_command, prefix_command)]
async fn bili(
    ctx: PoiseContext<'_>,
    #[description = "Link, share text or video id"]
    #[rest]
    text: String,
) -> Result<(), Error> {
    ctx.defer().await?;

    // An explicit command doesn't need a site hint for a bare id
    let link = extract_link(&IncomingMessage::new(&text, ""))
        .map(|link| link.url)
        .or_else(|| VideoId::parse(text.trim()).map(|id| id.page_url()));
    let Some(link) = link else {
        SendMessage::Normal(NO_REFERENCE).send_msg(ctx).await?;
        return Ok(());
    };

    let embedder = &ctx.data().embedder;
    match resolve_link(&embedder.client, link).await {
        Ok(video) => {
            embedder
                .send_video(&ctx.serenity_context().http, ctx.channel_id(), None, &video)
                .await?;
            VideoCaption::new(&video).send_msg(ctx).await?;
        }
        Err(e) => {
            SendMessage::Error(e).send_msg(ctx).await?;
        }
    }
    Ok(())
}

async fn event_handler(
    ctx: &serenity::Context,
    event: &poise::Event<'_>,
    _framework: poise::FrameworkContext<'_, Data, Error>,
    data: &Data,
) -> Result<(), Error> {
    if let poise::Event::Message { new_message } = event {
        // Never react to bots, including our own captions
        if new_message.author.bot {
            return Ok(());
        }
        data.embedder
            .clone()
            .reply_video_embed(ctx.http.clone(), new_message.clone())
            .await;
    }
    Ok(())
}

async fn on_error(error: poise::FrameworkError<'_, Data, Error>) {
    match error {
        poise::FrameworkError::Setup { error, .. } => panic!("Failed to start bot: {:?}", error),
        poise::FrameworkError::Command { error, ctx } => {
            tracing::error!("Error in command `{}`: {:?}", ctx.command().name, error);
            if let Err(e) = ctx.say(bilibili::INTERNAL_ERROR).await {
                tracing::error!("Error while reporting command error: {}", e);
            }
        }
        error => {
            if let Err(e) = poise::builtins::on_error(error).await {
                tracing::error!("Error while handling error: {}", e)
            }
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,bili_embed_bot=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match Config::get_config() {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("Error reading {}: {}", CONFIG_FILE, e);
            std::process::exit(1);
        }
    };
    if config.discord_token.is_empty() {
        tracing::error!("{}", BotError::ConfigToken);
        std::process::exit(1);
    }

    let embedder = match VideoEmbedder::new(&config) {
        Ok(e) => Arc::new(e),
        Err(e) => {
            tracing::error!("{}", e);
            std::process::exit(1);
        }
    };
    tracing::info!(
        "Using video API at {} with quality {}",
        config.api_base,
        config.quality
    );

    let commands = vec![register(), help(), bili()];

    // Configure Poise options
    let options = poise::FrameworkOptions {
        commands,
        prefix_options: poise::PrefixFrameworkOptions {
            prefix: Some(config.prefix.clone()),
            ..Default::default()
        },
        on_error: |error| Box::pin(on_error(error)),
        pre_command: |ctx| {
            Box::pin(async move {
                tracing::info!(
                    "command {} called by {}#{:04}",
                    ctx.command().qualified_name,
                    ctx.author().name,
                    ctx.author().discriminator
                );
            })
        },
        event_handler: |ctx, event, framework, data| {
            Box::pin(event_handler(ctx, event, framework, data))
        },
        ..Default::default()
    };

    let framework = poise::Framework::builder()
        .options(options)
        .token(config.discord_token.clone())
        .intents(
            serenity::GatewayIntents::non_privileged() | serenity::GatewayIntents::MESSAGE_CONTENT,
        )
        .setup(move |_ctx, _ready, _framework| {
            let embedder = embedder.clone();
            Box::pin(async move { Ok(Data { embedder }) })
        })
        .build()
        .await;
    let framework = match framework {
        Ok(f) => f,
        Err(e) => {
            tracing::error!("Error creating client: {:?}", e);
            std::process::exit(1);
        }
    };

    // Register signal handlers
    for kind in [SignalKind::terminate(), SignalKind::interrupt()] {
        let mut stream = match signal(kind) {
            Ok(s) => s,
            Err(e) => {
                tracing::error!("Error creating signal handler: {}", e);
                std::process::exit(1);
            }
        };
        let shard_manager = framework.shard_manager().clone();
        tokio::spawn(async move {
            stream.recv().await;
            tracing::info!("Received signal, exiting");
            shard_manager.lock().await.shutdown_all().await;
        });
    }

    if let Err(why) = framework.start().await {
        tracing::error!("Client ended: {:?}", why);
    }
}
