//! Error types for the playback core.
//!
//! Every failure raised by a [`PlaybackController`](crate::audio::player::PlaybackController)
//! operation is scoped to a single guild and a single operation. Nothing here is
//! retried automatically; the command layer turns each variant into one reply.

use std::time::Duration;
use thiserror::Error;

/// Failures of the playback state machine, one per user-visible outcome.
#[derive(Debug, Error)]
pub enum PlaybackError {
    /// The requesting user is not in a voice channel of this guild.
    #[error("you must join a voice channel first")]
    NotInVoiceChannel,

    /// The resolver errored or returned nothing playable.
    #[error("could not resolve `{locator}`: {reason}")]
    ResolutionFailed { locator: String, reason: String },

    /// The resolver did not answer in time.
    #[error("resolving `{locator}` timed out after {}s", .timeout.as_secs())]
    ResolutionTimeout { locator: String, timeout: Duration },

    #[error("nothing is playing right now")]
    NothingPlaying,

    /// 1-based index outside `1..=len`.
    #[error("index {index} is out of range (queue has {len} tracks)")]
    OutOfRange { index: usize, len: usize },

    #[error("the bot is not connected to a voice channel")]
    NotConnected,

    #[error("the queue is full (max {max} tracks)")]
    QueueFull { max: usize },

    #[error(transparent)]
    Voice(#[from] VoiceError),
}

/// Failures reported by a [`MediaResolver`](crate::sources::MediaResolver).
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("failed to run extractor: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("extractor exited with {status}: {stderr}")]
    Extractor { status: String, stderr: String },

    #[error("invalid extractor output: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("no playable entry found")]
    NoPlayableEntry,
}

/// Failures reported by a [`VoiceSink`](crate::audio::voice::VoiceSink).
#[derive(Debug, Error)]
pub enum VoiceError {
    #[error("failed to join voice channel: {0}")]
    Join(String),

    #[error("failed to leave voice channel: {0}")]
    Leave(String),

    #[error("no voice call for this guild")]
    NoCall,

    #[error("track control failed: {0}")]
    Track(String),
}
