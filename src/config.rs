use serde::Deserialize;
use std::env;
use std::str::FromStr;

use crate::models::{PlayerSession, Resolution, RetryPolicy};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub api: ApiConfig,
    pub camera: CameraConfig,
    pub decode: DecodeConfig,
    pub entry: EntryConfig,
    pub telemetry: TelemetryConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApiConfig {
    pub base_url: String,
    pub player_id: Option<String>,
    pub access_token: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CameraConfig {
    pub acquisition_timeout_ms: u64,
    pub profile_retry_delay_ms: u64,
    pub playback_max_attempts: u32,
    pub playback_retry_delay_ms: u64,
    pub readiness_poll_ms: u64,
    pub target_width: u32,
    pub target_height: u32,
    pub probe_timeout_ms: u64,
    pub user_agent: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DecodeConfig {
    pub interval_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EntryConfig {
    pub path_marker: String,
    pub redirect_delay_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TelemetryConfig {
    pub rust_log: String,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            acquisition_timeout_ms: 10_000,
            profile_retry_delay_ms: 300,
            playback_max_attempts: 3,
            playback_retry_delay_ms: 500,
            readiness_poll_ms: 100,
            target_width: 1280,
            target_height: 720,
            probe_timeout_ms: 1_000,
            user_agent: String::new(),
        }
    }
}

impl Default for DecodeConfig {
    fn default() -> Self {
        Self { interval_ms: 100 }
    }
}

impl Default for EntryConfig {
    fn default() -> Self {
        Self {
            path_marker: "/tournament/".to_string(),
            redirect_delay_ms: 1_500,
        }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            rust_log: "info".to_string(),
        }
    }
}

impl CameraConfig {
    pub fn target_resolution(&self) -> Resolution {
        Resolution {
            width: self.target_width,
            height: self.target_height,
        }
    }

    pub fn playback_retry(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.playback_max_attempts.max(1),
            delay_ms: self.playback_retry_delay_ms,
        }
    }
}

impl ApiConfig {
    /// The logged-in player, when a player id is configured.
    pub fn player_session(&self) -> Option<PlayerSession> {
        self.player_id.as_ref().map(|player_id| PlayerSession {
            player_id: player_id.clone(),
            access_token: self.access_token.clone(),
        })
    }
}

fn optional_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parsed_var<T>(name: &str, default: T) -> Result<T, anyhow::Error>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match optional_var(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("{} is invalid: {}", name, e)),
        None => Ok(default),
    }
}

impl Config {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let camera_defaults = CameraConfig::default();
        let decode_defaults = DecodeConfig::default();
        let entry_defaults = EntryConfig::default();

        let base_url = env::var("API_BASE_URL")?;
        let player_id = optional_var("PLAYER_ID");
        let access_token = optional_var("API_TOKEN");
        let acquisition_timeout_ms =
            parsed_var("ACQUISITION_TIMEOUT_MS", camera_defaults.acquisition_timeout_ms)?;
        let profile_retry_delay_ms =
            parsed_var("PROFILE_RETRY_DELAY_MS", camera_defaults.profile_retry_delay_ms)?;
        let playback_max_attempts =
            parsed_var("PLAYBACK_MAX_ATTEMPTS", camera_defaults.playback_max_attempts)?;
        let playback_retry_delay_ms =
            parsed_var("PLAYBACK_RETRY_DELAY_MS", camera_defaults.playback_retry_delay_ms)?;
        let readiness_poll_ms = parsed_var("READINESS_POLL_MS", camera_defaults.readiness_poll_ms)?;
        let target_width = parsed_var("TARGET_WIDTH", camera_defaults.target_width)?;
        let target_height = parsed_var("TARGET_HEIGHT", camera_defaults.target_height)?;
        let probe_timeout_ms = parsed_var("PROBE_TIMEOUT_MS", camera_defaults.probe_timeout_ms)?;
        let user_agent = optional_var("SCANNER_USER_AGENT").unwrap_or_default();
        let interval_ms = parsed_var("DECODE_INTERVAL_MS", decode_defaults.interval_ms)?;
        let path_marker = optional_var("ENTRY_PATH_MARKER").unwrap_or(entry_defaults.path_marker);
        let redirect_delay_ms = parsed_var("REDIRECT_DELAY_MS", entry_defaults.redirect_delay_ms)?;
        let rust_log = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        Ok(Config {
            api: ApiConfig {
                base_url,
                player_id,
                access_token,
            },
            camera: CameraConfig {
                acquisition_timeout_ms,
                profile_retry_delay_ms,
                playback_max_attempts,
                playback_retry_delay_ms,
                readiness_poll_ms,
                target_width,
                target_height,
                probe_timeout_ms,
                user_agent,
            },
            decode: DecodeConfig { interval_ms },
            entry: EntryConfig {
                path_marker,
                redirect_delay_ms,
            },
            telemetry: TelemetryConfig { rust_log },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_camera_defaults() {
        let camera = CameraConfig::default();
        assert_eq!(camera.acquisition_timeout_ms, 10_000);
        assert_eq!(camera.target_resolution(), Resolution { width: 1280, height: 720 });
        assert_eq!(camera.playback_retry().max_attempts, 3);
    }

    #[test]
    fn test_playback_retry_has_at_least_one_attempt() {
        let camera = CameraConfig {
            playback_max_attempts: 0,
            ..CameraConfig::default()
        };
        assert_eq!(camera.playback_retry().max_attempts, 1);
    }

    #[test]
    fn test_player_session() {
        let api = ApiConfig {
            base_url: "http://localhost:3000".to_string(),
            player_id: Some("42".to_string()),
            access_token: Some("token".to_string()),
        };
        let session = api.player_session().unwrap();
        assert_eq!(session.player_id, "42");
        assert_eq!(session.access_token.as_deref(), Some("token"));

        let anonymous = ApiConfig {
            player_id: None,
            ..api
        };
        assert!(anonymous.player_session().is_none());
    }

    #[test]
    fn test_entry_defaults() {
        let entry = EntryConfig::default();
        assert_eq!(entry.path_marker, "/tournament/");
        assert_eq!(entry.redirect_delay_ms, 1_500);
    }
}
