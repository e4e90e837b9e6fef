//! # Sources Module
//!
//! Turns a locator (URL or search term) into something the voice sink can
//! stream. The playback core only sees the [`MediaResolver`] trait; the
//! production implementation shells out to yt-dlp ([`ytdlp::YtDlpResolver`]).

pub mod ytdlp;

use async_trait::async_trait;
use std::time::Duration;

use crate::error::ResolveError;

pub use ytdlp::YtDlpResolver;

/// Resolves a locator into a playable stream plus display metadata.
///
/// Implementations are network-bound and may be slow; callers wrap them in a
/// timeout. A single call never expands a playlist, it yields one track.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MediaResolver: Send + Sync {
    async fn resolve(&self, locator: &str) -> Result<ResolvedTrack, ResolveError>;
}

/// Output of a successful resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedTrack {
    pub title: String,
    pub duration: Option<Duration>,
    /// Canonical page URL when the extractor reports one.
    pub page_url: Option<String>,
    pub stream: StreamHandle,
}

/// Opaque locator for the audio bytes, handed untouched to the voice sink.
///
/// Direct media URLs expire, so a handle is consumed by one play and queued
/// tracks are resolved again when their turn comes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamHandle {
    pub url: String,
    /// Extra request headers the media host expects (user agent, cookies).
    pub headers: Vec<(String, String)>,
}

impl StreamHandle {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: Vec::new(),
        }
    }

    pub fn with_headers(mut self, headers: Vec<(String, String)>) -> Self {
        self.headers = headers;
        self
    }
}
