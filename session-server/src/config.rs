//! Hot-reloadable session configuration (spec §5, §7).
//!
//! Mirrors the teacher's `GameConfig.json` + `/reload` pattern: settings live
//! in a JSON file on disk, are read once at startup, and can be refreshed at
//! runtime through an HTTP endpoint without restarting the process.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::sync::RwLock;

use mahjong_core::{GameRules, Settings as CoreSettings};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimerConfig {
    /// Starting bank, per seat, in milliseconds.
    pub bank_millis: u64,
    /// Flat amount added back to the bank after every turn.
    pub turn_increment_millis: u64,
    /// Extra bank granted at the start of every new round.
    pub round_bonus_millis: u64,
    /// Fixed window a seat gets to respond to a call prompt.
    pub call_response_millis: u64,
    /// Fixed window between round end and the next round starting.
    pub round_advance_millis: u64,
}

impl Default for TimerConfig {
    fn default() -> Self {
        TimerConfig {
            bank_millis: 300_000,
            turn_increment_millis: 5_000,
            round_bonus_millis: 10_000,
            call_response_millis: 7_000,
            round_advance_millis: 10_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    pub rules: GameRulesConfig,
    pub starting_score: i64,
    pub timers: TimerConfig,
    /// Seconds of no inbound traffic (not even a ping) before the heartbeat
    /// monitor reaps a connection.
    pub idle_timeout_secs: u64,
    /// Seconds a disconnected human seat is held open for reconnect before
    /// being permanently replaced by AI.
    pub reconnect_grace_secs: u64,
    /// Seconds a pending game waits for its expected humans to connect
    /// before starting with AI substitutes, or cancelling if nobody joined.
    pub pending_game_timeout_secs: u64,
    pub kan_dora_revealed_immediately_for_closed_kan: bool,
    pub kan_dora_revealed_immediately_for_open_kan: bool,
    pub four_kans_min_distinct_seats_to_continue: u8,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub enum GameRulesConfig {
    Hanchan,
    Tonpuusen,
}

impl From<GameRulesConfig> for GameRules {
    fn from(value: GameRulesConfig) -> Self {
        match value {
            GameRulesConfig::Hanchan => GameRules::Hanchan,
            GameRulesConfig::Tonpuusen => GameRules::Tonpuusen,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            rules: GameRulesConfig::Hanchan,
            starting_score: 25_000,
            timers: TimerConfig::default(),
            idle_timeout_secs: 120,
            reconnect_grace_secs: 60,
            pending_game_timeout_secs: 30,
            kan_dora_revealed_immediately_for_closed_kan: true,
            kan_dora_revealed_immediately_for_open_kan: true,
            four_kans_min_distinct_seats_to_continue: 2,
        }
    }
}

impl SessionConfig {
    pub fn core_settings(&self) -> CoreSettings {
        CoreSettings {
            rules: self.rules.into(),
            starting_score: self.starting_score,
            kan_dora_revealed_immediately_for_closed_kan: self.kan_dora_revealed_immediately_for_closed_kan,
            kan_dora_revealed_immediately_for_open_kan: self.kan_dora_revealed_immediately_for_open_kan,
            four_kans_min_distinct_seats_to_continue: self.four_kans_min_distinct_seats_to_continue,
        }
    }
}

/// Shared, hot-reloadable configuration handle.
#[derive(Default)]
pub struct ConfigStore {
    pub current: RwLock<SessionConfig>,
}

/// Reloads `path` from disk and swaps it into `store`. Kept separate from
/// `ConfigStore` itself the way the teacher separates `Room`/`AppState` from
/// `reload_config`, so the I/O boundary is a single free function.
pub async fn reload_config(store: &Arc<ConfigStore>, path: &str) -> Result<SessionConfig, String> {
    let json_content = fs::read_to_string(path)
        .await
        .map_err(|e| format!("Failed to read {}: {}", path, e))?;
    let parsed: SessionConfig =
        serde_json::from_str(&json_content).map_err(|e| format!("Failed to parse {}: {}", path, e))?;
    let mut current = store.current.write().await;
    *current = parsed.clone();
    Ok(parsed)
}
