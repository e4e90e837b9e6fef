use anyhow::Result;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    // Discord
    pub discord_token: String,
    pub guild_id: Option<u64>, // Register commands in one guild (development)

    // Audio
    pub default_volume: f32,
    pub max_queue_size: usize,

    // Resolution
    pub ytdlp_path: String,
    pub resolve_timeout_secs: u64,
    pub skip_failed_tracks: bool,
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            // Discord
            discord_token: std::env::var("DISCORD_TOKEN")?,
            guild_id: std::env::var("GUILD_ID").ok().and_then(|s| s.parse().ok()),

            // Audio
            default_volume: std::env::var("DEFAULT_VOLUME")
                .unwrap_or_else(|_| "0.5".to_string())
                .parse()?,
            max_queue_size: std::env::var("MAX_QUEUE_SIZE")
                .unwrap_or_else(|_| "1000".to_string())
                .parse()?,

            // Resolution
            ytdlp_path: std::env::var("YTDLP_PATH").unwrap_or_else(|_| "yt-dlp".to_string()),
            resolve_timeout_secs: std::env::var("RESOLVE_TIMEOUT_SECS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()?,
            skip_failed_tracks: std::env::var("SKIP_FAILED_TRACKS")
                .unwrap_or_else(|_| "false".to_string())
                .parse()?,
        };

        config.validate()?;

        Ok(config)
    }

    /// Sanity checks on values that would otherwise fail much later.
    ///
    /// - Volume must be between 0.0 and 2.0
    /// - Queue size and resolve timeout must be greater than 0
    /// - The token and extractor path must not be blank
    pub fn validate(&self) -> Result<()> {
        if self.discord_token.trim().is_empty() {
            anyhow::bail!("DISCORD_TOKEN must not be empty");
        }

        if !(0.0..=2.0).contains(&self.default_volume) {
            anyhow::bail!("Default volume must be between 0.0 and 2.0, got: {}", self.default_volume);
        }

        if self.max_queue_size == 0 {
            anyhow::bail!("Max queue size must be greater than 0");
        }

        if self.resolve_timeout_secs == 0 {
            anyhow::bail!("Resolve timeout must be greater than 0");
        }

        if self.ytdlp_path.trim().is_empty() {
            anyhow::bail!("YTDLP_PATH must not be empty");
        }

        Ok(())
    }

    /// Summary for logging; never includes the token.
    pub fn summary(&self) -> String {
        format!(
            "Config Summary:\n  \
            Commands: {}\n  \
            Audio: {}% vol, {} max queue\n  \
            Resolver: {} ({}s timeout, skip failed={})",
            self.guild_id.map_or("global".to_string(), |id| format!("guild {}", id)),
            (self.default_volume * 100.0) as u32,
            self.max_queue_size,
            self.ytdlp_path,
            self.resolve_timeout_secs,
            self.skip_failed_tracks
        )
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            // Discord (no defaults - must be provided)
            discord_token: String::new(),
            guild_id: None,

            default_volume: 0.5,
            max_queue_size: 1000,

            ytdlp_path: "yt-dlp".to_string(),
            resolve_timeout_secs: 30,
            skip_failed_tracks: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> Config {
        Config {
            discord_token: "token".to_string(),
            ..Config::default()
        }
    }

    #[test]
    fn defaults_with_token_are_valid() {
        assert!(valid().validate().is_ok());
    }

    #[test]
    fn empty_token_is_rejected() {
        assert!(Config::default().validate().is_err());
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        let cases = [
            Config { default_volume: 2.5, ..valid() },
            Config { default_volume: -0.1, ..valid() },
            Config { max_queue_size: 0, ..valid() },
            Config { resolve_timeout_secs: 0, ..valid() },
            Config { ytdlp_path: " ".to_string(), ..valid() },
        ];

        for config in cases {
            assert!(config.validate().is_err(), "accepted {:?}", config);
        }
    }

    #[test]
    fn summary_hides_token() {
        let config = Config {
            discord_token: "super-secret".to_string(),
            guild_id: Some(42),
            ..Config::default()
        };

        let summary = config.summary();
        assert!(!summary.contains("super-secret"));
        assert!(summary.contains("guild 42"));
        assert!(summary.contains("50% vol"));
    }
}
