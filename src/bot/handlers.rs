use anyhow::Result;
use serenity::{
    builder::{CreateInteractionResponse, CreateInteractionResponseMessage, EditInteractionResponse},
    model::{
        application::CommandInteraction,
        id::{ChannelId, GuildId, UserId},
    },
    prelude::Context,
};
use tracing::{info, warn};

use crate::{
    audio::player::Requester,
    bot::QueueBot,
    error::PlaybackError,
    ui::messages,
};

/// Dispatches slash commands
pub async fn handle_command(ctx: &Context, command: CommandInteraction, bot: &QueueBot) -> Result<()> {
    let Some(guild_id) = command.guild_id else {
        return respond(ctx, &command, "❌ This command only works inside a server.", true).await;
    };

    info!(
        "📝 Command /{} used by {} in guild {}",
        command.data.name, command.user.name, guild_id
    );

    match command.data.name.as_str() {
        "play" => handle_play(ctx, &command, guild_id, bot).await,
        "skip" => {
            let reply = match bot.controller.skip(guild_id).await {
                Ok(track) => messages::skipped(&track),
                Err(e) => messages::error(&e),
            };
            respond(ctx, &command, reply, false).await
        }
        "queue" => {
            let page = integer_option(&command, "page").unwrap_or(1).max(1) as usize;
            let snapshot = bot.controller.snapshot(guild_id).await;
            respond(ctx, &command, messages::queue(&snapshot, page), false).await
        }
        "remove" => {
            let index = queue_index(integer_option(&command, "number").unwrap_or(0));
            let reply = match bot.controller.remove_at(guild_id, index).await {
                Ok(track) => messages::removed(&track),
                Err(e) => messages::error(&e),
            };
            respond(ctx, &command, reply, false).await
        }
        "stop" => {
            let reply = match bot.controller.stop(guild_id).await {
                Ok(cleared) => messages::stopped(cleared),
                Err(e) => messages::error(&e),
            };
            respond(ctx, &command, reply, false).await
        }
        _ => respond(ctx, &command, "❌ Unknown command", true).await,
    }
}

/// Two-phase: acknowledge first, resolution can take several seconds.
async fn handle_play(ctx: &Context, command: &CommandInteraction, guild_id: GuildId, bot: &QueueBot) -> Result<()> {
    let url = string_option(command, "url")
        .ok_or_else(|| anyhow::anyhow!("Missing url option"))?
        .to_string();

    let requester = Requester {
        user_id: command.user.id,
        voice_channel: user_voice_channel(ctx, guild_id, command.user.id),
        text_channel: command.channel_id,
    };

    if requester.voice_channel.is_none() {
        let reply = messages::error(&PlaybackError::NotInVoiceChannel);
        return respond(ctx, command, reply, true).await;
    }

    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Defer(CreateInteractionResponseMessage::new()),
        )
        .await?;

    let reply = match bot.controller.enqueue(guild_id, requester, &url).await {
        Ok(outcome) => messages::enqueued(&outcome),
        Err(e) => {
            warn!("Could not enqueue '{}' in guild {}: {}", url, guild_id, e);
            messages::error(&e)
        }
    };

    command
        .edit_response(&ctx.http, EditInteractionResponse::new().content(reply))
        .await?;

    Ok(())
}

async fn respond(
    ctx: &Context,
    command: &CommandInteraction,
    content: impl Into<String>,
    ephemeral: bool,
) -> Result<()> {
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new()
                    .content(content)
                    .ephemeral(ephemeral),
            ),
        )
        .await?;

    Ok(())
}

// Helpers

fn user_voice_channel(ctx: &Context, guild_id: GuildId, user_id: UserId) -> Option<ChannelId> {
    let guild = guild_id.to_guild_cached(&ctx.cache)?;
    guild
        .voice_states
        .get(&user_id)
        .and_then(|voice_state| voice_state.channel_id)
}

fn string_option<'a>(command: &'a CommandInteraction, name: &str) -> Option<&'a str> {
    command
        .data
        .options
        .iter()
        .find(|opt| opt.name == name)
        .and_then(|opt| opt.value.as_str())
}

fn integer_option(command: &CommandInteraction, name: &str) -> Option<i64> {
    command
        .data
        .options
        .iter()
        .find(|opt| opt.name == name)
        .and_then(|opt| opt.value.as_i64())
}

/// Negative numbers map to 0, which the queue rejects as out of range.
fn queue_index(raw: i64) -> usize {
    usize::try_from(raw).unwrap_or(0)
}
