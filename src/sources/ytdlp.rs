use async_process::Command;
use async_trait::async_trait;
use serde::Deserialize;
use std::{collections::HashMap, time::Duration};
use tokio::sync::Semaphore;
use tracing::{debug, info};
use url::Url;

use super::{MediaResolver, ResolvedTrack, StreamHandle};
use crate::error::ResolveError;

/// Concurrent extractor processes allowed at once.
const MAX_CONCURRENT_EXTRACTIONS: usize = 3;

/// yt-dlp backed resolver.
pub struct YtDlpResolver {
    binary: String,
    rate_limiter: Semaphore,
}

/// Subset of the yt-dlp JSON we care about.
#[derive(Debug, Deserialize)]
struct YtDlpInfo {
    title: Option<String>,
    url: Option<String>,
    webpage_url: Option<String>,
    duration: Option<f64>,
    #[serde(default)]
    http_headers: HashMap<String, String>,
    entries: Option<Vec<Option<YtDlpInfo>>>,
}

impl YtDlpResolver {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            rate_limiter: Semaphore::new(MAX_CONCURRENT_EXTRACTIONS),
        }
    }

    /// Runs `yt-dlp --version`; used by the health check.
    pub async fn version(&self) -> Result<String, ResolveError> {
        let output = Command::new(&self.binary).arg("--version").output().await?;

        if !output.status.success() {
            return Err(ResolveError::Extractor {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

#[async_trait]
impl MediaResolver for YtDlpResolver {
    async fn resolve(&self, locator: &str) -> Result<ResolvedTrack, ResolveError> {
        let _permit = self.rate_limiter.acquire().await.ok();
        let target = extractor_target(locator);

        info!("🔍 Resolving with yt-dlp: {}", target);

        let output = Command::new(&self.binary)
            .args([
                "--no-playlist",
                "--dump-single-json",
                "--format",
                "bestaudio/best",
                "--no-check-certificate",
                "--force-ipv4",
                "--quiet",
                "--no-warnings",
                "--",
            ])
            .arg(&target)
            .kill_on_drop(true)
            .output()
            .await?;

        if !output.status.success() {
            return Err(ResolveError::Extractor {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let resolved = parse_output(locator, &String::from_utf8_lossy(&output.stdout))?;
        debug!("🎯 Stream resolved for '{}' ({:?})", resolved.title, resolved.page_url);
        Ok(resolved)
    }
}

/// URLs go to the extractor as-is; anything else becomes a single-result search.
fn extractor_target(locator: &str) -> String {
    let locator = locator.trim();
    match Url::parse(locator) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => locator.to_string(),
        _ => format!("ytsearch1:{}", locator),
    }
}

fn parse_output(locator: &str, stdout: &str) -> Result<ResolvedTrack, ResolveError> {
    let mut info: YtDlpInfo = serde_json::from_str(stdout.trim())?;

    // Searches and playlists come wrapped; only the first entry is played.
    let entry = match info.entries.take() {
        Some(entries) => entries
            .into_iter()
            .flatten()
            .next()
            .ok_or(ResolveError::NoPlayableEntry)?,
        None => info,
    };

    let stream_url = entry.url.ok_or(ResolveError::NoPlayableEntry)?;

    let mut headers: Vec<(String, String)> = entry.http_headers.into_iter().collect();
    headers.sort();

    Ok(ResolvedTrack {
        title: entry.title.unwrap_or_else(|| locator.to_string()),
        duration: entry
            .duration
            .filter(|secs| secs.is_finite() && *secs > 0.0)
            .map(Duration::from_secs_f64),
        page_url: entry.webpage_url,
        stream: StreamHandle::new(stream_url).with_headers(headers),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn urls_pass_through_and_terms_become_searches() {
        assert_eq!(
            extractor_target("https://www.youtube.com/watch?v=dQw4w9WgXcQ"),
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ"
        );
        assert_eq!(extractor_target("  lofi beats "), "ytsearch1:lofi beats");
        assert_eq!(extractor_target("ftp://host/file.mp3"), "ytsearch1:ftp://host/file.mp3");
    }

    #[test]
    fn parses_single_video() {
        let json = r#"{
            "title": "Song A",
            "url": "https://media.example/a.webm",
            "webpage_url": "https://youtu.be/a",
            "duration": 212.0,
            "http_headers": {"User-Agent": "ua", "Accept": "*/*"}
        }"#;

        let track = parse_output("https://youtu.be/a", json).unwrap();

        assert_eq!(track.title, "Song A");
        assert_eq!(track.duration, Some(Duration::from_secs(212)));
        assert_eq!(track.page_url.as_deref(), Some("https://youtu.be/a"));
        assert_eq!(track.stream.url, "https://media.example/a.webm");
        assert_eq!(
            track.stream.headers,
            vec![
                ("Accept".to_string(), "*/*".to_string()),
                ("User-Agent".to_string(), "ua".to_string()),
            ]
        );
    }

    #[test]
    fn takes_first_entry_of_search_result() {
        let json = r#"{
            "title": "lofi",
            "entries": [
                null,
                {"title": "First", "url": "https://media.example/1"},
                {"title": "Second", "url": "https://media.example/2"}
            ]
        }"#;

        let track = parse_output("lofi", json).unwrap();
        assert_eq!(track.title, "First");
        assert_eq!(track.stream.url, "https://media.example/1");
        assert_eq!(track.duration, None);
    }

    #[test]
    fn empty_search_is_not_playable() {
        let err = parse_output("nothing", r#"{"title": "x", "entries": []}"#).unwrap_err();
        assert!(matches!(err, ResolveError::NoPlayableEntry));
    }

    #[test]
    fn entry_without_stream_url_is_not_playable() {
        let err = parse_output("x", r#"{"title": "x"}"#).unwrap_err();
        assert!(matches!(err, ResolveError::NoPlayableEntry));
    }

    #[test]
    fn missing_title_falls_back_to_locator() {
        let track = parse_output("some search", r#"{"url": "https://m/1"}"#).unwrap();
        assert_eq!(track.title, "some search");
    }

    #[test]
    fn garbage_output_is_a_parse_error() {
        let err = parse_output("x", "ERROR: nope").unwrap_err();
        assert!(matches!(err, ResolveError::Parse(_)));
    }
}
