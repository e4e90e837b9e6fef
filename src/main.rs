use anyhow::Result;
use serenity::{model::gateway::GatewayIntents, Client};
use songbird::{SerenityInit, Songbird};
use std::sync::Arc;
use tracing::{error, info};

mod audio;
mod bot;
mod config;
mod error;
mod sources;
mod ui;

use crate::audio::{
    player::{PlaybackController, PlayerSettings},
    voice::SongbirdSink,
};
use crate::bot::QueueBot;
use crate::config::Config;
use crate::sources::YtDlpResolver;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("tunequeue=debug".parse()?)
                .add_directive("serenity=info".parse()?)
                .add_directive("songbird=info".parse()?),
        )
        .init();

    info!("🎵 Starting tunequeue v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::load()?;

    if std::env::args().any(|arg| arg == "--health-check") {
        return health_check(&config).await;
    }

    info!("{}", config.summary());

    let intents = GatewayIntents::GUILDS | GatewayIntents::GUILD_VOICE_STATES;

    let songbird = Songbird::serenity();
    let resolver = Arc::new(YtDlpResolver::new(config.ytdlp_path.clone()));
    let sink = Arc::new(SongbirdSink::new(songbird.clone(), config.default_volume));
    let (controller, updates) =
        PlaybackController::new(resolver, sink, PlayerSettings::from(&config));

    let config = Arc::new(config);
    let handler = QueueBot::new(config.clone(), controller);

    let mut client = Client::builder(&config.discord_token, intents)
        .event_handler(handler)
        .register_songbird_with(songbird)
        .await?;

    tokio::spawn(bot::events::forward_updates(client.http.clone(), updates));

    let shard_manager = client.shard_manager.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Could not listen for Ctrl+C: {:?}", e);
            return;
        }
        info!("⚠️ Shutdown signal received, closing...");
        shard_manager.shutdown_all().await;
    });

    info!("🚀 Bot started");
    if let Err(why) = client.start().await {
        error!("Client error: {:?}", why);
    }

    Ok(())
}

async fn health_check(config: &Config) -> Result<()> {
    let resolver = YtDlpResolver::new(config.ytdlp_path.clone());
    match resolver.version().await {
        Ok(version) => {
            println!("OK (yt-dlp {})", version);
            Ok(())
        }
        Err(e) => anyhow::bail!("Extractor unavailable: {}", e),
    }
}
