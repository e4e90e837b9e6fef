use async_trait::async_trait;
use dashmap::DashMap;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serenity::model::id::{ChannelId, GuildId};
use songbird::{
    input::{HttpRequest, Input},
    tracks::{ControlError, PlayMode, TrackHandle, TrackState},
    Event, EventContext, EventHandler as VoiceEventHandler, Songbird, TrackEvent,
};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::{error::VoiceError, sources::StreamHandle};

/// Handle to a live voice connection, returned by [`VoiceSink::connect`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoiceConnection {
    pub guild_id: GuildId,
    pub channel_id: ChannelId,
}

/// Completion signal for one play of one track.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackEnded {
    pub guild_id: GuildId,
    pub play_id: u64,
}

/// Callback handed to [`VoiceSink::play`]. Firing it queues a [`TrackEnded`]
/// for the controller; firing it more than once is harmless.
#[derive(Debug, Clone)]
pub struct TrackEndNotifier {
    ended: TrackEnded,
    tx: mpsc::UnboundedSender<TrackEnded>,
}

impl TrackEndNotifier {
    pub(crate) fn new(guild_id: GuildId, play_id: u64, tx: mpsc::UnboundedSender<TrackEnded>) -> Self {
        Self {
            ended: TrackEnded { guild_id, play_id },
            tx,
        }
    }

    pub fn notify(&self) {
        if self.tx.send(self.ended).is_err() {
            debug!("Controller gone, dropping end of play {}", self.ended.play_id);
        }
    }
}

/// Live audio output into a voice channel.
///
/// `stop` must end the current stream in a way that fires the notifier given
/// to `play`, exactly like a natural end of the track.
#[async_trait]
pub trait VoiceSink: Send + Sync {
    async fn connect(&self, guild_id: GuildId, channel_id: ChannelId) -> Result<VoiceConnection, VoiceError>;

    async fn play(
        &self,
        connection: &VoiceConnection,
        stream: StreamHandle,
        on_ended: TrackEndNotifier,
    ) -> Result<(), VoiceError>;

    async fn stop(&self, connection: &VoiceConnection) -> Result<(), VoiceError>;

    async fn disconnect(&self, connection: &VoiceConnection) -> Result<(), VoiceError>;

    async fn is_playing(&self, connection: &VoiceConnection) -> bool;
}

/// [`VoiceSink`] backed by songbird.
pub struct SongbirdSink {
    manager: Arc<Songbird>,
    http: reqwest::Client,
    volume: f32,
    current_tracks: DashMap<GuildId, TrackHandle>,
}

impl SongbirdSink {
    pub fn new(manager: Arc<Songbird>, volume: f32) -> Self {
        Self {
            manager,
            http: reqwest::Client::new(),
            volume: volume.clamp(0.0, 2.0),
            current_tracks: DashMap::new(),
        }
    }

    fn input_for(&self, stream: StreamHandle) -> Input {
        let mut headers = HeaderMap::new();
        for (name, value) in &stream.headers {
            match (HeaderName::from_bytes(name.as_bytes()), HeaderValue::from_str(value)) {
                (Ok(name), Ok(value)) => {
                    headers.insert(name, value);
                }
                _ => debug!("Skipping invalid stream header {}", name),
            }
        }

        HttpRequest::new_with_headers(self.http.clone(), stream.url, headers).into()
    }

    fn current_track(&self, guild_id: GuildId) -> Option<TrackHandle> {
        self.current_tracks.get(&guild_id).map(|t| t.clone())
    }
}

#[async_trait]
impl VoiceSink for SongbirdSink {
    async fn connect(&self, guild_id: GuildId, channel_id: ChannelId) -> Result<VoiceConnection, VoiceError> {
        self.manager
            .join(guild_id, channel_id)
            .await
            .map_err(|e| VoiceError::Join(e.to_string()))?;

        info!("🔊 Connected to voice channel {} in guild {}", channel_id, guild_id);
        Ok(VoiceConnection { guild_id, channel_id })
    }

    async fn play(
        &self,
        connection: &VoiceConnection,
        stream: StreamHandle,
        on_ended: TrackEndNotifier,
    ) -> Result<(), VoiceError> {
        let call = self.manager.get(connection.guild_id).ok_or(VoiceError::NoCall)?;
        let input = self.input_for(stream);

        let track_handle = {
            let mut call = call.lock().await;
            call.play_input(input)
        };

        track_handle
            .set_volume(self.volume)
            .map_err(|e| VoiceError::Track(e.to_string()))?;

        // Errored tracks never reach End, so both advance the queue.
        for event in [TrackEvent::End, TrackEvent::Error] {
            track_handle
                .add_event(
                    Event::Track(event),
                    TrackEndHandler {
                        notifier: on_ended.clone(),
                    },
                )
                .map_err(|e| VoiceError::Track(e.to_string()))?;
        }

        self.current_tracks.insert(connection.guild_id, track_handle);
        Ok(())
    }

    async fn stop(&self, connection: &VoiceConnection) -> Result<(), VoiceError> {
        if let Some(track) = self.current_track(connection.guild_id) {
            track.stop().map_err(|e| VoiceError::Track(e.to_string()))?;
            info!("⏹️ Track stopped in guild {}", connection.guild_id);
        }
        Ok(())
    }

    async fn disconnect(&self, connection: &VoiceConnection) -> Result<(), VoiceError> {
        self.current_tracks.remove(&connection.guild_id);

        self.manager
            .remove(connection.guild_id)
            .await
            .map_err(|e| VoiceError::Leave(e.to_string()))?;

        info!("👋 Disconnected from voice in guild {}", connection.guild_id);
        Ok(())
    }

    async fn is_playing(&self, connection: &VoiceConnection) -> bool {
        let Some(track) = self.current_track(connection.guild_id) else {
            return false;
        };

        let live = track_is_live(track.get_info().await);
        if !live {
            self.current_tracks.remove(&connection.guild_id);
        }
        live
    }
}

/// A handle whose track already ended answers with `ControlError::Finished`.
fn track_is_live(info: Result<TrackState, ControlError>) -> bool {
    match info {
        Ok(state) => matches!(state.playing, PlayMode::Play | PlayMode::Pause),
        Err(ControlError::Finished) => false,
        Err(e) => {
            warn!("Could not read track state: {:?}", e);
            false
        }
    }
}

/// Songbird event handler that forwards track completion to the controller.
struct TrackEndHandler {
    notifier: TrackEndNotifier,
}

#[async_trait]
impl VoiceEventHandler for TrackEndHandler {
    async fn act(&self, _ctx: &EventContext<'_>) -> Option<Event> {
        debug!("Track finished, signalling controller...");
        self.notifier.notify();
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn notifier_carries_guild_and_play_id() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let notifier = TrackEndNotifier::new(GuildId::new(5), 42, tx);

        notifier.notify();
        notifier.clone().notify();

        let expected = TrackEnded {
            guild_id: GuildId::new(5),
            play_id: 42,
        };
        assert_eq!(rx.recv().await, Some(expected));
        assert_eq!(rx.recv().await, Some(expected));
    }

    #[test]
    fn finished_or_stopped_tracks_are_not_live() {
        assert!(!track_is_live(Err(ControlError::Finished)));
        assert!(!track_is_live(Ok(TrackState {
            playing: PlayMode::Stop,
            ..Default::default()
        })));
        assert!(!track_is_live(Ok(TrackState {
            playing: PlayMode::End,
            ..Default::default()
        })));
        assert!(track_is_live(Ok(TrackState {
            playing: PlayMode::Play,
            ..Default::default()
        })));
    }

    #[test]
    fn notifier_without_receiver_does_not_panic() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        TrackEndNotifier::new(GuildId::new(1), 1, tx).notify();
    }
}
