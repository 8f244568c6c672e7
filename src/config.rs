//! Application-level configuration loading: catalog location, round timings, and retention caps.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "TUNE_ROOMS_CONFIG_PATH";
/// Song list consulted when the configuration does not name one.
const DEFAULT_CATALOG_PATH: &str = "song_choices.json";

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    /// JSON song list backing the catalog.
    pub catalog_path: PathBuf,
    /// Resolve missing preview URLs through the iTunes search API.
    pub preview_lookup: bool,
    /// Candidates tried per fetch before the catalog reports exhaustion.
    pub fetch_attempts: usize,
    /// Words that may not appear anywhere in a player name (case-insensitive).
    pub banned_names: Vec<String>,
    /// Timings and limits of a game.
    pub rules: GameRules,
    /// Caps on per-room history and empty-room reaping.
    pub retention: RetentionPolicy,
    /// How long a fresh connection may take to send `player_init`.
    pub handshake_timeout: Duration,
}

/// Timings and limits applied to every room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameRules {
    /// Rounds (reveal windows) per game.
    pub max_rounds: u32,
    /// Seconds granted for round 0.
    pub base_round_secs: u32,
    /// Extra seconds granted per round index.
    pub round_step_secs: u32,
    /// Pause between the end of a round and the start of the next one.
    pub next_round_delay: Duration,
    /// Period of the round countdown.
    pub tick: Duration,
}

impl GameRules {
    /// Seconds on the clock when `round` begins.
    pub fn round_duration(&self, round: u32) -> u32 {
        round * self.round_step_secs + self.base_round_secs
    }
}

impl Default for GameRules {
    fn default() -> Self {
        Self {
            max_rounds: 6,
            base_round_secs: 30,
            round_step_secs: 5,
            next_round_delay: Duration::from_millis(1500),
            tick: Duration::from_secs(1),
        }
    }
}

/// Bounds on data a room keeps around between games.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    /// Disconnected players remembered for reconnection; the oldest is evicted first.
    pub recent_players: usize,
    /// Finished songs excluded from future picks; the oldest is evicted first.
    pub previous_songs: usize,
    /// Rooms without players for this long are removed from the registry.
    pub empty_room_ttl: Duration,
    /// Period of the empty-room sweep.
    pub sweep_interval: Duration,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            recent_players: 64,
            previous_songs: 500,
            empty_room_ttl: Duration::from_secs(15 * 60),
            sweep_interval: Duration::from_secs(60),
        }
    }
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let app_config: Self = raw.into();
                    info!(
                        path = %path.display(),
                        catalog = %app_config.catalog_path.display(),
                        "loaded configuration"
                    );
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            catalog_path: PathBuf::from(DEFAULT_CATALOG_PATH),
            preview_lookup: true,
            fetch_attempts: 8,
            banned_names: default_banned_names(),
            rules: GameRules::default(),
            retention: RetentionPolicy::default(),
            handshake_timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    catalog_path: Option<PathBuf>,
    preview_lookup: Option<bool>,
    fetch_attempts: Option<usize>,
    banned_names: Option<Vec<String>>,
    rules: RawRules,
    retention: RawRetention,
    handshake_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct RawRules {
    max_rounds: Option<u32>,
    base_round_secs: Option<u32>,
    round_step_secs: Option<u32>,
    next_round_delay_ms: Option<u64>,
    tick_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct RawRetention {
    recent_players: Option<usize>,
    previous_songs: Option<usize>,
    empty_room_ttl_secs: Option<u64>,
    sweep_interval_secs: Option<u64>,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let defaults = Self::default();
        Self {
            catalog_path: value.catalog_path.unwrap_or(defaults.catalog_path),
            preview_lookup: value.preview_lookup.unwrap_or(defaults.preview_lookup),
            fetch_attempts: value
                .fetch_attempts
                .filter(|attempts| *attempts > 0)
                .unwrap_or(defaults.fetch_attempts),
            banned_names: value
                .banned_names
                .map(|names| names.into_iter().map(|name| name.to_lowercase()).collect())
                .unwrap_or(defaults.banned_names),
            rules: value.rules.into(),
            retention: value.retention.into(),
            handshake_timeout: value
                .handshake_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.handshake_timeout),
        }
    }
}

impl From<RawRules> for GameRules {
    fn from(value: RawRules) -> Self {
        let defaults = Self::default();
        Self {
            max_rounds: value
                .max_rounds
                .filter(|rounds| *rounds > 0)
                .unwrap_or(defaults.max_rounds),
            base_round_secs: value.base_round_secs.unwrap_or(defaults.base_round_secs),
            round_step_secs: value.round_step_secs.unwrap_or(defaults.round_step_secs),
            next_round_delay: value
                .next_round_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.next_round_delay),
            tick: value
                .tick_ms
                .filter(|ms| *ms > 0)
                .map(Duration::from_millis)
                .unwrap_or(defaults.tick),
        }
    }
}

impl From<RawRetention> for RetentionPolicy {
    fn from(value: RawRetention) -> Self {
        let defaults = Self::default();
        Self {
            recent_players: value.recent_players.unwrap_or(defaults.recent_players),
            previous_songs: value.previous_songs.unwrap_or(defaults.previous_songs),
            empty_room_ttl: value
                .empty_room_ttl_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.empty_room_ttl),
            sweep_interval: value
                .sweep_interval_secs
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
                .unwrap_or(defaults.sweep_interval),
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

fn default_banned_names() -> Vec<String> {
    ["admin", "host", "server", "moderator", "administator"]
        .into_iter()
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_duration_grows_by_step() {
        let rules = GameRules::default();
        assert_eq!(rules.round_duration(0), 30);
        assert_eq!(rules.round_duration(2), 40);
        assert_eq!(rules.round_duration(5), 55);
    }

    #[test]
    fn partial_config_keeps_defaults() {
        let raw: RawConfig = serde_json::from_str(
            r#"{"catalogPath": "songs.json", "rules": {"nextRoundDelayMs": 10}, "bannedNames": ["Root"]}"#,
        )
        .unwrap();
        let config = AppConfig::from(raw);

        assert_eq!(config.catalog_path, PathBuf::from("songs.json"));
        assert_eq!(config.rules.next_round_delay, Duration::from_millis(10));
        assert_eq!(config.rules.max_rounds, 6);
        assert_eq!(config.banned_names, vec!["root".to_string()]);
        assert_eq!(config.retention, RetentionPolicy::default());
    }

    #[test]
    fn zero_values_fall_back_to_defaults() {
        let raw: RawConfig =
            serde_json::from_str(r#"{"fetchAttempts": 0, "rules": {"maxRounds": 0, "tickMs": 0}}"#)
                .unwrap();
        let config = AppConfig::from(raw);

        assert_eq!(config.fetch_attempts, 8);
        assert_eq!(config.rules.max_rounds, 6);
        assert_eq!(config.rules.tick, Duration::from_secs(1));
    }
}
