//! Reply and announcement text. Every command produces exactly one of these.

use std::time::Duration;

use crate::{
    audio::{
        player::{Enqueued, PlayerState, QueueSnapshot, UpdateKind},
        queue::{QueuePage, TrackRef},
    },
    error::PlaybackError,
};

/// Pending tracks shown per `/queue` page.
pub const QUEUE_PAGE_SIZE: usize = 10;

pub fn enqueued(outcome: &Enqueued) -> String {
    match outcome {
        Enqueued::Started(track) => format!("🎵 Now playing: {}", track_line(track)),
        Enqueued::Queued { track, position } => {
            format!("➕ Added to queue (#{}): {}", position, track_line(track))
        }
    }
}

pub fn skipped(track: &TrackRef) -> String {
    format!("⏭️ Skipped **{}**. Moving on to the next track.", track.title)
}

pub fn removed(track: &TrackRef) -> String {
    format!("🗑️ Removed from queue: **{}**", track.title)
}

pub fn stopped(cleared: usize) -> String {
    if cleared == 0 {
        "⏹️ Playback stopped and the bot left the voice channel.".to_string()
    } else {
        format!(
            "⏹️ Playback stopped and the bot left the voice channel ({} queued tracks cleared).",
            cleared
        )
    }
}

pub fn queue(snapshot: &QueueSnapshot, page: usize) -> String {
    let mut out = String::new();

    if let Some(current) = &snapshot.now_playing {
        out.push_str(&format!("🎶 Now playing: {}\n\n", track_line(current)));
    } else if snapshot.state == PlayerState::Transitioning {
        out.push_str("⏳ Loading the next track...\n\n");
    }

    if snapshot.pending.is_empty() {
        out.push_str("📭 The queue is empty.");
        return out;
    }

    let page = QueuePage::from_tracks(&snapshot.pending, page, QUEUE_PAGE_SIZE);
    out.push_str("📜 Queue:\n");
    for (position, track) in &page.items {
        out.push_str(&format!("{}. {}\n", position, track_line(track)));
    }
    if page.total_pages > 1 {
        out.push_str(&format!(
            "\nPage {}/{} ({} tracks)",
            page.current_page, page.total_pages, page.total_items
        ));
    }

    out.trim_end().to_string()
}

/// Announcement for an automatic transition; `None` when there is nothing
/// worth posting.
pub fn update(kind: &UpdateKind) -> Option<String> {
    match kind {
        UpdateKind::NowPlaying(track) => Some(format!("🎵 Playing next: {}", track_line(track))),
        UpdateKind::QueueFinished => None,
        UpdateKind::AdvanceFailed { track, .. } => {
            Some(format!("❌ Could not play the next track: **{}**", track.title))
        }
    }
}

pub fn error(err: &PlaybackError) -> String {
    match err {
        PlaybackError::NotInVoiceChannel => "❌ You must join a voice channel first.".to_string(),
        PlaybackError::ResolutionFailed { .. } => {
            "❌ Cannot play that. Check that the URL is valid.".to_string()
        }
        PlaybackError::ResolutionTimeout { .. } => {
            "⌛ Looking up that track took too long. Please try again.".to_string()
        }
        PlaybackError::NothingPlaying => "❌ Nothing is playing right now.".to_string(),
        PlaybackError::OutOfRange { len: 0, .. } => "❌ The queue is empty.".to_string(),
        PlaybackError::OutOfRange { index, len } => {
            format!("❌ Invalid number {}. Pick a number between 1 and {}.", index, len)
        }
        PlaybackError::NotConnected => "❌ The bot is not in a voice channel.".to_string(),
        PlaybackError::QueueFull { max } => format!("❌ The queue is full (max {} tracks).", max),
        PlaybackError::Voice(e) => format!("❌ Voice connection problem: {}", e),
    }
}

fn track_line(track: &TrackRef) -> String {
    match track.duration {
        Some(duration) => format!("**{}** ({})", track.title, format_duration(duration)),
        None => format!("**{}**", track.title),
    }
}

fn format_duration(duration: Duration) -> String {
    let total_seconds = duration.as_secs();
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{}:{:02}", minutes, seconds)
    }
}
