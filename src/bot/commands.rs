use anyhow::Result;
use serenity::{
    builder::{CreateCommand, CreateCommandOption},
    model::{application::CommandOptionType, id::GuildId},
    prelude::Context,
};

/// Registers the commands globally
pub async fn register_global_commands(ctx: &Context) -> Result<()> {
    for command in all_commands() {
        ctx.http.create_global_command(&command).await?;
    }

    Ok(())
}

/// Registers the commands for a single guild (development)
pub async fn register_guild_commands(ctx: &Context, guild_id: GuildId) -> Result<()> {
    guild_id.set_commands(&ctx.http, all_commands()).await?;

    Ok(())
}

fn all_commands() -> Vec<CreateCommand> {
    vec![
        play_command(),
        skip_command(),
        queue_command(),
        remove_command(),
        stop_command(),
    ]
}

fn play_command() -> CreateCommand {
    CreateCommand::new("play")
        .description("Play the music at a URL or search term")
        .add_option(
            CreateCommandOption::new(CommandOptionType::String, "url", "URL or search term")
                .required(true),
        )
}

fn skip_command() -> CreateCommand {
    CreateCommand::new("skip").description("Skip the current track and play the next one")
}

fn queue_command() -> CreateCommand {
    CreateCommand::new("queue")
        .description("Show the queue")
        .add_option(
            CreateCommandOption::new(CommandOptionType::Integer, "page", "Page number")
                .min_int_value(1),
        )
}

fn remove_command() -> CreateCommand {
    CreateCommand::new("remove")
        .description("Remove a track from the queue by its number")
        .add_option(
            CreateCommandOption::new(CommandOptionType::Integer, "number", "Position in the queue")
                .required(true),
        )
}

fn stop_command() -> CreateCommand {
    CreateCommand::new("stop").description("Stop the music and make the bot leave")
}
