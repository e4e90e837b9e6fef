//! # Bot Module
//!
//! Discord front end for the playback controller.
//!
//! - Slash command registration ([`commands`])
//! - Command dispatch and replies ([`handlers`])
//! - Asynchronous announcements from the controller ([`events`])
//!
//! The [`QueueBot`] struct implements Serenity's [`EventHandler`] trait. It
//! owns no playback state itself; everything goes through the shared
//! [`PlaybackController`].

use anyhow::Result;
use serenity::{
    all::{Context, EventHandler, GuildId, Interaction, Ready, VoiceState},
    async_trait,
};
use std::sync::Arc;
use tracing::{error, info, warn};

pub mod commands;
pub mod events;
pub mod handlers;

use crate::{audio::player::PlaybackController, config::Config};

pub struct QueueBot {
    config: Arc<Config>,
    pub controller: Arc<PlaybackController>,
}

impl QueueBot {
    pub fn new(config: Arc<Config>, controller: Arc<PlaybackController>) -> Self {
        Self { config, controller }
    }

    /// Registers slash commands with Discord.
    ///
    /// With `GUILD_ID` set the commands go to that guild only (visible
    /// almost immediately), otherwise they are registered globally.
    async fn register_commands(&self, ctx: &Context) -> Result<()> {
        info!("📝 Registering slash commands...");

        match self.config.guild_id {
            Some(guild_id) => {
                let guild_id = GuildId::from(guild_id);

                if !ctx.cache.guilds().contains(&guild_id) {
                    warn!("⚠️ Bot is not a member of the configured guild: {}", guild_id);
                    return Ok(());
                }

                commands::register_guild_commands(ctx, guild_id)
                    .await
                    .map_err(|e| {
                        error!("❌ Error registering guild commands: {:?}", e);
                        anyhow::anyhow!("Could not register guild commands. Check the 'applications.commands' scope.")
                    })?;
                info!("✅ Guild commands registered for: {}", guild_id);
            }
            None => {
                commands::register_global_commands(ctx).await.map_err(|e| {
                    error!("❌ Error registering global commands: {:?}", e);
                    anyhow::anyhow!("Could not register global commands. Check the 'applications.commands' scope.")
                })?;
                info!("✅ Global commands registered");
            }
        }

        Ok(())
    }
}

#[async_trait]
impl EventHandler for QueueBot {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("🤖 {} is online!", ready.user.name);
        info!("📊 Connected to {} guilds", ready.guilds.len());

        if let Err(e) = self.register_commands(&ctx).await {
            error!("Error registering commands: {:?}", e);
        }
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        if let Interaction::Command(command_interaction) = interaction {
            if let Err(e) = handlers::handle_command(&ctx, command_interaction, self).await {
                error!("Error handling command: {:?}", e);
            }
        }
    }

    /// Resets the guild's session when the bot is removed from voice by
    /// someone else (kicked, channel deleted).
    async fn voice_state_update(&self, ctx: Context, old: Option<VoiceState>, new: VoiceState) {
        let current_user_id = ctx.cache.current_user().id;
        if new.user_id != current_user_id || old.is_none() || new.channel_id.is_some() {
            return;
        }

        if let Some(guild_id) = new.guild_id {
            info!("🔌 Bot disconnected from voice in guild {}", guild_id);
            self.controller.handle_disconnected(guild_id).await;
        }
    }
}
