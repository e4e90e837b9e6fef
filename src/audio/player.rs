use dashmap::DashMap;
use serenity::model::id::{ChannelId, GuildId, UserId};
use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Weak,
    },
    time::Duration,
};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};

use crate::{
    audio::{
        queue::{GuildQueue, TrackRef},
        voice::{TrackEndNotifier, TrackEnded, VoiceConnection, VoiceSink},
    },
    config::Config,
    error::PlaybackError,
    sources::{MediaResolver, ResolvedTrack},
};

/// Playback state of one guild.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerState {
    /// Nothing streaming; the voice connection may still be open.
    Idle,
    Playing,
    /// Current track was stopped and its end signal has not been handled yet,
    /// or the next track is being resolved.
    Transitioning,
}

#[derive(Debug, Clone)]
pub struct PlayerSettings {
    pub resolve_timeout: Duration,
    pub max_queue_size: usize,
    /// Keep advancing past tracks that fail to resolve instead of halting.
    pub skip_failed_tracks: bool,
}

impl Default for PlayerSettings {
    fn default() -> Self {
        Self {
            resolve_timeout: Duration::from_secs(30),
            max_queue_size: 1000,
            skip_failed_tracks: false,
        }
    }
}

impl From<&Config> for PlayerSettings {
    fn from(config: &Config) -> Self {
        Self {
            resolve_timeout: Duration::from_secs(config.resolve_timeout_secs),
            max_queue_size: config.max_queue_size,
            skip_failed_tracks: config.skip_failed_tracks,
        }
    }
}

/// Who asked for a track, and from where.
#[derive(Debug, Clone, Copy)]
pub struct Requester {
    pub user_id: UserId,
    /// Voice channel the user currently sits in, if any.
    pub voice_channel: Option<ChannelId>,
    /// Text channel that receives announcements for automatic advances.
    pub text_channel: ChannelId,
}

/// Outcome of a successful [`PlaybackController::enqueue`].
#[derive(Debug, Clone, PartialEq)]
pub enum Enqueued {
    Started(TrackRef),
    Queued { track: TrackRef, position: usize },
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueueSnapshot {
    pub state: PlayerState,
    pub now_playing: Option<TrackRef>,
    pub pending: Vec<TrackRef>,
}

/// Something the controller did on its own, after a track ended.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackUpdate {
    pub guild_id: GuildId,
    /// Text channel of the most recent `enqueue` in this guild.
    pub channel: Option<ChannelId>,
    pub kind: UpdateKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum UpdateKind {
    NowPlaying(TrackRef),
    QueueFinished,
    AdvanceFailed { track: TrackRef, reason: String },
}

#[derive(Debug)]
struct GuildSession {
    queue: GuildQueue,
    current: Option<TrackRef>,
    state: PlayerState,
    connection: Option<VoiceConnection>,
    /// Play whose end signal is awaited; any other id is stale.
    play_id: Option<u64>,
    announce_channel: Option<ChannelId>,
}

impl GuildSession {
    fn new(max_queue_size: usize) -> Self {
        Self {
            queue: GuildQueue::new(max_queue_size),
            current: None,
            state: PlayerState::Idle,
            connection: None,
            play_id: None,
            announce_channel: None,
        }
    }

    fn reset(&mut self) -> usize {
        self.current = None;
        self.play_id = None;
        self.state = PlayerState::Idle;
        self.queue.clear()
    }
}

/// Per-guild sequential playback: resolve, play, advance on completion.
///
/// Every operation on a guild runs under that guild's mutex, including the
/// resolver and sink calls, so user commands and completion signals for the
/// same guild never interleave. Guilds do not block each other.
pub struct PlaybackController {
    resolver: Arc<dyn MediaResolver>,
    sink: Arc<dyn VoiceSink>,
    settings: PlayerSettings,
    sessions: DashMap<GuildId, Arc<Mutex<GuildSession>>>,
    ended_tx: mpsc::UnboundedSender<TrackEnded>,
    updates_tx: mpsc::UnboundedSender<PlaybackUpdate>,
    next_id: AtomicU64,
}

impl PlaybackController {
    /// Builds the controller and spawns the task that consumes completion
    /// signals. The returned receiver yields [`PlaybackUpdate`]s.
    pub fn new(
        resolver: Arc<dyn MediaResolver>,
        sink: Arc<dyn VoiceSink>,
        settings: PlayerSettings,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<PlaybackUpdate>) {
        let (ended_tx, ended_rx) = mpsc::unbounded_channel();
        let (updates_tx, updates_rx) = mpsc::unbounded_channel();

        let controller = Arc::new(Self {
            resolver,
            sink,
            settings,
            sessions: DashMap::new(),
            ended_tx,
            updates_tx,
            next_id: AtomicU64::new(1),
        });

        tokio::spawn(completion_loop(Arc::downgrade(&controller), ended_rx));

        (controller, updates_rx)
    }

    /// Resolves `locator` and either starts it or appends it to the queue.
    pub async fn enqueue(
        &self,
        guild_id: GuildId,
        requester: Requester,
        locator: &str,
    ) -> Result<Enqueued, PlaybackError> {
        let channel_id = requester.voice_channel.ok_or(PlaybackError::NotInVoiceChannel)?;

        let session = self.session(guild_id);
        let mut session = session.lock().await;
        session.announce_channel = Some(requester.text_channel);

        if session.connection.is_none() {
            let connection = self.sink.connect(guild_id, channel_id).await?;
            session.connection = Some(connection);
        }

        session.queue.ensure_capacity()?;

        let resolved = self.resolve(locator).await?;
        let track = TrackRef::new(self.next_id(), locator, resolved.title.clone(), requester.user_id)
            .with_duration(resolved.duration);

        if session.state != PlayerState::Idle {
            let position = session.queue.append(track.clone())?;
            return Ok(Enqueued::Queued { track, position });
        }

        if session.queue.is_empty() {
            self.start(guild_id, &mut session, track.clone(), resolved).await?;
            return Ok(Enqueued::Started(track));
        }

        // Tracks left behind by a halted advance go first. Failed leftovers
        // are skipped so this call ends with something playing or an empty queue.
        session.queue.append(track.clone())?;
        self.advance(guild_id, &mut session, true).await;

        if session.current.as_ref().is_some_and(|c| c.id == track.id) {
            return Ok(Enqueued::Started(track));
        }
        match session.queue.position_of(track.id) {
            Some(position) => Ok(Enqueued::Queued { track, position }),
            None => Err(PlaybackError::ResolutionFailed {
                locator: locator.to_string(),
                reason: "stream could not be resolved when its turn came".to_string(),
            }),
        }
    }

    /// Stops the current stream; the sink's end signal performs the advance.
    pub async fn skip(&self, guild_id: GuildId) -> Result<TrackRef, PlaybackError> {
        let session = self.existing_session(guild_id).ok_or(PlaybackError::NothingPlaying)?;
        let mut session = session.lock().await;

        let (Some(connection), Some(current)) = (session.connection, session.current.clone()) else {
            return Err(PlaybackError::NothingPlaying);
        };
        if session.state != PlayerState::Playing || !self.sink.is_playing(&connection).await {
            return Err(PlaybackError::NothingPlaying);
        }

        self.sink.stop(&connection).await?;
        session.state = PlayerState::Transitioning;

        info!("⏭️ Skipped in guild {}: {}", guild_id, current.title);
        Ok(current)
    }

    /// Removes a pending track by 1-based index; the current track is never touched.
    pub async fn remove_at(&self, guild_id: GuildId, index: usize) -> Result<TrackRef, PlaybackError> {
        let Some(session) = self.existing_session(guild_id) else {
            return Err(PlaybackError::OutOfRange { index, len: 0 });
        };
        let mut session = session.lock().await;
        session.queue.remove_at(index)
    }

    pub async fn snapshot(&self, guild_id: GuildId) -> QueueSnapshot {
        let Some(session) = self.existing_session(guild_id) else {
            return QueueSnapshot {
                state: PlayerState::Idle,
                now_playing: None,
                pending: Vec::new(),
            };
        };
        let session = session.lock().await;
        QueueSnapshot {
            state: session.state,
            now_playing: session.current.clone(),
            pending: session.queue.list(),
        }
    }

    pub async fn state(&self, guild_id: GuildId) -> PlayerState {
        match self.existing_session(guild_id) {
            Some(session) => session.lock().await.state,
            None => PlayerState::Idle,
        }
    }

    /// Disconnects and clears the pending queue. Returns how many queued
    /// tracks were dropped.
    pub async fn stop(&self, guild_id: GuildId) -> Result<usize, PlaybackError> {
        let session = self.existing_session(guild_id).ok_or(PlaybackError::NotConnected)?;
        let mut session = session.lock().await;

        let connection = session.connection.take().ok_or(PlaybackError::NotConnected)?;
        let cleared = session.reset();

        self.sink.disconnect(&connection).await?;

        info!("⏹️ Playback stopped in guild {} ({} queued tracks dropped)", guild_id, cleared);
        Ok(cleared)
    }

    /// The bot was removed from voice by someone else.
    pub async fn handle_disconnected(&self, guild_id: GuildId) {
        let Some(session) = self.existing_session(guild_id) else {
            return;
        };
        let mut session = session.lock().await;

        if session.connection.take().is_none() {
            return;
        }
        let cleared = session.reset();
        info!("🔌 Voice connection lost in guild {}, session reset ({} tracks dropped)", guild_id, cleared);
    }

    /// Handles a completion signal from the sink.
    pub async fn on_track_ended(&self, ended: TrackEnded) {
        let Some(session) = self.existing_session(ended.guild_id) else {
            return;
        };
        let mut session = session.lock().await;

        if session.play_id != Some(ended.play_id) {
            debug!("Ignoring stale end signal for play {} in guild {}", ended.play_id, ended.guild_id);
            return;
        }

        if let Some(finished) = &session.current {
            debug!("🏁 Finished in guild {}: {}", ended.guild_id, finished.title);
        }
        self.advance(ended.guild_id, &mut session, self.settings.skip_failed_tracks)
            .await;
    }

    /// Pops and plays the next track, or goes idle. With `skip_failed` a
    /// track that cannot be played is dropped and the next one is tried.
    async fn advance(&self, guild_id: GuildId, session: &mut GuildSession, skip_failed: bool) {
        session.current = None;
        session.play_id = None;

        loop {
            let Some(next) = session.queue.pop_front() else {
                session.state = PlayerState::Idle;
                info!("📭 Queue finished in guild {}", guild_id);
                self.publish(guild_id, session, UpdateKind::QueueFinished);
                return;
            };

            session.state = PlayerState::Transitioning;
            let result = match self.resolve(&next.locator).await {
                Ok(resolved) => self.start(guild_id, session, next.clone(), resolved).await,
                Err(e) => Err(e),
            };

            match result {
                Ok(()) => {
                    self.publish(guild_id, session, UpdateKind::NowPlaying(next));
                    return;
                }
                Err(e) => {
                    warn!("❌ Could not play next track '{}' in guild {}: {}", next.title, guild_id, e);
                    self.publish(
                        guild_id,
                        session,
                        UpdateKind::AdvanceFailed {
                            track: next,
                            reason: e.to_string(),
                        },
                    );
                    if !skip_failed {
                        session.state = PlayerState::Idle;
                        return;
                    }
                }
            }
        }
    }

    async fn start(
        &self,
        guild_id: GuildId,
        session: &mut GuildSession,
        track: TrackRef,
        resolved: ResolvedTrack,
    ) -> Result<(), PlaybackError> {
        let connection = session.connection.ok_or(PlaybackError::NotConnected)?;
        let play_id = self.next_id();
        let on_ended = TrackEndNotifier::new(guild_id, play_id, self.ended_tx.clone());

        self.sink.play(&connection, resolved.stream, on_ended).await?;

        info!("🎵 Now playing in guild {}: {}", guild_id, track.title);
        session.current = Some(track);
        session.play_id = Some(play_id);
        session.state = PlayerState::Playing;
        Ok(())
    }

    async fn resolve(&self, locator: &str) -> Result<ResolvedTrack, PlaybackError> {
        let timeout = self.settings.resolve_timeout;
        match tokio::time::timeout(timeout, self.resolver.resolve(locator)).await {
            Ok(Ok(resolved)) => Ok(resolved),
            Ok(Err(e)) => {
                warn!("Resolution failed for '{}': {}", locator, e);
                Err(PlaybackError::ResolutionFailed {
                    locator: locator.to_string(),
                    reason: e.to_string(),
                })
            }
            Err(_) => {
                warn!("Resolution timed out for '{}'", locator);
                Err(PlaybackError::ResolutionTimeout {
                    locator: locator.to_string(),
                    timeout,
                })
            }
        }
    }

    fn publish(&self, guild_id: GuildId, session: &GuildSession, kind: UpdateKind) {
        let update = PlaybackUpdate {
            guild_id,
            channel: session.announce_channel,
            kind,
        };
        if self.updates_tx.send(update).is_err() {
            debug!("No listener for playback updates");
        }
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    fn session(&self, guild_id: GuildId) -> Arc<Mutex<GuildSession>> {
        self.sessions
            .entry(guild_id)
            .or_insert_with(|| Arc::new(Mutex::new(GuildSession::new(self.settings.max_queue_size))))
            .clone()
    }

    fn existing_session(&self, guild_id: GuildId) -> Option<Arc<Mutex<GuildSession>>> {
        self.sessions.get(&guild_id).map(|s| s.clone())
    }
}

/// Feeds completion signals into the controller, one task per signal so a
/// slow resolution in one guild does not hold up the others.
async fn completion_loop(controller: Weak<PlaybackController>, mut ended_rx: mpsc::UnboundedReceiver<TrackEnded>) {
    while let Some(ended) = ended_rx.recv().await {
        let Some(controller) = controller.upgrade() else {
            break;
        };
        tokio::spawn(async move {
            controller.on_track_ended(ended).await;
        });
    }
    debug!("Completion loop finished");
}
