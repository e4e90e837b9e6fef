use anyhow::Result;
use serenity::{builder::CreateMessage, http::Http, model::id::ChannelId};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::{audio::player::PlaybackUpdate, ui::messages};

/// Posts controller announcements (next track, failed advance) to the text
/// channel of the guild's last `/play`. Runs until the controller is gone.
pub async fn forward_updates(http: Arc<Http>, mut updates: mpsc::UnboundedReceiver<PlaybackUpdate>) {
    while let Some(update) = updates.recv().await {
        let Some(text) = messages::update(&update.kind) else {
            debug!("Nothing to announce for guild {}", update.guild_id);
            continue;
        };

        let Some(channel_id) = update.channel else {
            debug!("No announce channel for guild {}", update.guild_id);
            continue;
        };

        if let Err(e) = send_announcement(&http, channel_id, text).await {
            error!("Error sending announcement to {}: {:?}", channel_id, e);
        }
    }

    info!("📪 Playback update stream closed");
}

async fn send_announcement(http: &Arc<Http>, channel_id: ChannelId, text: String) -> Result<()> {
    channel_id
        .send_message(http, CreateMessage::new().content(text))
        .await?;
    Ok(())
}
