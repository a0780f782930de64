use anyhow::Result;
use clap::Parser;
use dotenv::dotenv;
use poise::serenity_prelude as serenity;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

/// Discord bot that onboards new guild members: grade, server and nickname
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Force re-sync of slash commands to every guild (use when commands aren't showing up)
    #[arg(long, short = 's')]
    sync_commands: bool,

    /// Register commands per-guild instead of globally (faster for testing)
    #[arg(long)]
    guild_commands: bool,

    /// Specific guild ID to register commands to (overrides DISCORD_GUILD_ID)
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    guild_id: Option<u64>,

    /// Onboarding config file (overrides ONBOARDING_CONFIG)
    #[arg(long)]
    config: Option<String>,
}

mod commands;
mod config;
mod error;
mod events;
mod logging;
mod messages;
mod onboarding;
mod ui;
mod web;

use config::{OnboardingConfig, Settings};
use events::{
    handle_interaction, handle_member_add, handle_member_update, handle_message,
    log_guild_readiness,
};
use onboarding::{
    create_session_store, create_shared_onboarding_flow, spawn_session_sweeper,
    SharedOnboardingFlow,
};

type Error = Box<dyn std::error::Error + Send + Sync>;
type Context<'a> = poise::Context<'a, Data, Error>;

/// Shared application state
pub struct Data {
    pub config: Arc<OnboardingConfig>,
    pub onboarding: SharedOnboardingFlow,
}

async fn event_handler(
    ctx: &serenity::Context,
    event: &serenity::FullEvent,
    _framework: poise::FrameworkContext<'_, Data, Error>,
    data: &Data,
) -> Result<(), Error> {
    match event {
        serenity::FullEvent::InteractionCreate { interaction } => {
            if let Err(e) = handle_interaction(ctx, interaction, data).await {
                error!("Failed to handle interaction: {}", e);
            }
        }
        serenity::FullEvent::GuildMemberAddition { new_member } => {
            if let Err(e) = handle_member_add(ctx, new_member, data).await {
                error!("Failed to handle new member: {}", e);
            }
        }
        serenity::FullEvent::GuildMemberUpdate {
            old_if_available,
            new,
            event,
        } => {
            if let Err(e) =
                handle_member_update(ctx, old_if_available.as_ref(), new.as_ref(), event, data)
                    .await
            {
                error!("Failed to handle member update: {}", e);
            }
        }
        serenity::FullEvent::Message { new_message } => {
            if let Err(e) = handle_message(ctx, new_message, data).await {
                error!("Failed to handle message: {}", e);
            }
        }
        _ => {}
    }
    Ok(())
}

fn load_onboarding_config(path: &str) -> OnboardingConfig {
    match OnboardingConfig::load_or_default(path) {
        Ok(config) => {
            info!("Loaded onboarding config from {}", path);
            config
        }
        Err(e) => {
            error!("{}; using default onboarding config", e);
            OnboardingConfig::default()
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let args = Args::parse();

    let log_buffer = logging::create_log_buffer(logging::DEFAULT_LOG_CAPACITY);

    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_level(true),
        )
        .with(tracing_subscriber::filter::LevelFilter::INFO)
        .with(logging::LogCaptureLayer::new(log_buffer.clone()))
        .init();

    let settings = Settings::from_env()?;
    let config_path = args.config.clone().unwrap_or_else(|| settings.config_path.clone());
    let onboarding_config = Arc::new(load_onboarding_config(&config_path));

    let sessions = create_session_store(onboarding_config.session_ttl());
    let sweeper = spawn_session_sweeper(sessions.clone(), onboarding_config.sweep_interval());
    let onboarding = create_shared_onboarding_flow(onboarding_config.clone(), sessions.clone());

    let sync_commands = args.sync_commands;
    let guild_commands = args.guild_commands;
    let target_guild_id = args.guild_id.or(settings.guild_id);

    if let Some(gid) = target_guild_id {
        info!("Registering commands to guild {} only", gid);
    } else if guild_commands || sync_commands {
        info!("Will register commands per-guild (faster for testing)");
    } else {
        info!("Registering commands globally by default (takes up to 1 hour to propagate)");
    }

    let web_state = web::AppState {
        sessions: sessions.clone(),
        log_buffer: log_buffer.clone(),
        started_at: Instant::now(),
    };
    let web_config = web::WebServerConfig::new(settings.port);
    // Pollers should see the process while the gateway is still connecting
    tokio::spawn(async move {
        if let Err(e) = web::start_web_server(web_config, web_state).await {
            error!("Liveness server error: {}", e);
        }
    });

    let data_config = onboarding_config.clone();

    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: commands::all(),
            event_handler: |ctx, event, framework, data| {
                Box::pin(event_handler(ctx, event, framework, data))
            },
            pre_command: |ctx| {
                Box::pin(async move {
                    info!(
                        "Command '{}' invoked by {} (ID: {}) in {}",
                        ctx.command().qualified_name,
                        ctx.author().name,
                        ctx.author().id,
                        ctx.guild_id().map(|g| g.to_string()).unwrap_or_else(|| "DM".to_string())
                    );
                })
            },
            post_command: |ctx| {
                Box::pin(async move {
                    info!(
                        "Command '{}' completed for {}",
                        ctx.command().qualified_name,
                        ctx.author().name
                    );
                })
            },
            on_error: |error| {
                Box::pin(async move {
                    match error {
                        poise::FrameworkError::Command { error, ctx, .. } => {
                            error!("Error in command '{}': {}", ctx.command().qualified_name, error);
                            let _ = ctx
                                .send(poise::CreateReply::default()
                                    .content(format!("⚠️ 처리 중 오류: {}", error))
                                    .ephemeral(true))
                                .await;
                        }
                        poise::FrameworkError::MissingBotPermissions { missing_permissions, ctx, .. } => {
                            error!("Bot missing permissions for '{}': {:?}", ctx.command().qualified_name, missing_permissions);
                            let _ = ctx.say(format!("봇에 필요한 권한이 없습니다: {}", missing_permissions)).await;
                        }
                        poise::FrameworkError::MissingUserPermissions { missing_permissions, ctx, .. } => {
                            warn!("User {} missing permissions for '{}': {:?}", ctx.author().name, ctx.command().qualified_name, missing_permissions);
                        }
                        poise::FrameworkError::GuildOnly { ctx, .. } => {
                            warn!("Command '{}' is guild-only, used in DM by {}", ctx.command().qualified_name, ctx.author().name);
                        }
                        other => {
                            error!("Other framework error: {}", other);
                        }
                    }
                })
            },
            ..Default::default()
        })
        .setup(move |ctx, ready, framework| {
            Box::pin(async move {
                info!("Bot logged in as: {}", ready.user.name);

                let guild_ids: Vec<serenity::GuildId> = ready.guilds.iter().map(|g| g.id).collect();
                if guild_ids.is_empty() {
                    warn!("Bot is not in any guilds");
                } else {
                    log_guild_readiness(ctx, &guild_ids, &data_config).await;
                }

                let commands = &framework.options().commands;
                if let Some(gid) = target_guild_id {
                    let guild_id = serenity::GuildId::new(gid);
                    match poise::builtins::register_in_guild(ctx, commands, guild_id).await {
                        Ok(()) => info!("Registered {} commands for guild {}", commands.len(), guild_id),
                        Err(e) => error!("Failed to register commands for guild {}: {}", guild_id, e),
                    }
                } else if guild_commands || sync_commands {
                    for guild_id in &guild_ids {
                        match poise::builtins::register_in_guild(ctx, commands, *guild_id).await {
                            Ok(()) => info!("Registered {} commands for guild {}", commands.len(), guild_id),
                            Err(e) => error!("Failed to register commands for guild {}: {}", guild_id, e),
                        }
                    }
                } else {
                    match poise::builtins::register_globally(ctx, commands).await {
                        Ok(()) => info!(
                            "Registered {} commands globally (may take up to 1 hour to propagate)",
                            commands.len()
                        ),
                        Err(e) => error!("Failed to register commands globally: {}", e),
                    }
                }

                Ok(Data {
                    config: data_config,
                    onboarding,
                })
            })
        })
        .build();

    let intents = serenity::GatewayIntents::non_privileged()
        | serenity::GatewayIntents::GUILD_MEMBERS;
    info!("Requesting privileged intents: [\"GUILD_MEMBERS\"]");

    let mut client = serenity::ClientBuilder::new(&settings.token, intents)
        .framework(framework)
        .await?;

    let shard_manager = client.shard_manager.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl+C, shutting down");
            shard_manager.shutdown_all().await;
        }
    });

    info!("Starting bot...");
    let result = client.start().await;

    sweeper.abort();
    let abandoned = sessions.len();
    sessions.clear();
    if abandoned > 0 {
        info!("Dropped {} unfinished signup(s) on shutdown", abandoned);
    }

    if let Err(e) = result {
        let err_str = e.to_string();
        if err_str.contains("Disallowed") || err_str.contains("intents") {
            error!("Failed to start bot: {}", e);
            error!("Enable the GUILD_MEMBERS privileged intent: https://discord.com/developers/applications -> Your App -> Bot -> Privileged Gateway Intents");
            return Err(anyhow::anyhow!("Disallowed gateway intents: GUILD_MEMBERS"));
        }
        return Err(e.into());
    }
    warn!("Bot ended.");

    Ok(())
}
