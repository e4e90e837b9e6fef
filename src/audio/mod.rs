//! # Audio Module
//!
//! Queue-driven sequential playback, one independent session per guild.
//!
//! ## Architecture
//!
//! ### [`queue`] - QueueStore
//! - FIFO list of resolved [`queue::TrackRef`]s per guild
//! - 1-based removal, paging for listings
//!
//! ### [`player`] - PlaybackController
//! - Owns what is playing now and the voice connection handle
//! - Drives `Idle -> Playing -> Transitioning -> Playing | Idle`
//! - Serializes every mutation of a guild behind one mutex
//!
//! ### [`voice`] - VoiceSink
//! - Connect, play, stop, disconnect against songbird
//! - Reports track completion as a [`voice::TrackEnded`] signal
//!
//! ## Flow
//!
//! ```text
//! /play  -> enqueue -> resolve -> play now | append
//! sink end signal -> on_track_ended -> pop -> resolve -> play | idle
//! /skip  -> sink.stop -> (end signal, same path as above)
//! ```

pub mod player;
pub mod queue;
pub mod voice;
