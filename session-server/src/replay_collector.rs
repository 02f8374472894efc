//! Per-game append-only event journal (spec §4.6).
//!
//! Flushed to disk as JSON-lines on `GameEnded`, dropped unflushed on
//! abandonment. Persistence failures are swallowed — a journal write must
//! never block socket close or game cleanup (spec §6 "Replay persistence
//! failure").

use std::collections::HashMap;
use std::path::PathBuf;

use mahjong_core::GameEvent;
use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

const REPLAY_FORMAT_VERSION: u32 = 1;

#[derive(Serialize)]
struct ReplayHeader {
    version: u32,
    game_id: String,
}

/// A journal line. `CallPrompt`, `Error`, and `Furiten` are deliberately
/// absent here: the replay can always reconstruct them from the events that
/// are kept, so recording them would only bloat the file.
#[derive(Serialize)]
#[serde(tag = "kind")]
enum ReplayRecord {
    Header(ReplayHeader),
    Event(GameEvent),
}

struct Journal {
    lines: Vec<String>,
}

/// Holds one journal per live game. The directory replay files land in is
/// fixed at construction so tests can point it at a scratch dir.
pub struct ReplayCollector {
    games: Mutex<HashMap<String, Journal>>,
    output_dir: PathBuf,
}

impl Default for ReplayCollector {
    fn default() -> Self {
        ReplayCollector { games: Mutex::new(HashMap::new()), output_dir: PathBuf::from("replays") }
    }
}

impl ReplayCollector {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        ReplayCollector { games: Mutex::new(HashMap::new()), output_dir: output_dir.into() }
    }

    /// Opens a journal for a newly started game, writing the header record.
    pub async fn start_game(&self, game_id: &str) {
        let header = ReplayRecord::Header(ReplayHeader { version: REPLAY_FORMAT_VERSION, game_id: game_id.to_string() });
        let line = serde_json::to_string(&header).unwrap_or_default();
        let mut games = self.games.lock().await;
        games.insert(game_id.to_string(), Journal { lines: vec![line] });
    }

    /// Appends every kept event from one orchestrator transition. Events
    /// that the replay can reconstruct on its own (`FuritenChanged`,
    /// `IppatsuCleared`, the pure-engine bookkeeping variants) are filtered
    /// before they ever reach the journal.
    pub async fn record(&self, game_id: &str, events: &[GameEvent]) {
        let mut games = self.games.lock().await;
        let Some(journal) = games.get_mut(game_id) else { return };
        for event in events {
            if !Self::is_replayable(event) {
                continue;
            }
            let record = ReplayRecord::Event(event.clone());
            if let Ok(line) = serde_json::to_string(&record) {
                journal.lines.push(line);
            }
        }
    }

    fn is_replayable(event: &GameEvent) -> bool {
        !matches!(event, GameEvent::FuritenChanged { .. } | GameEvent::IppatsuCleared { .. })
    }

    /// Flushes the journal to `<output_dir>/<game_id>.jsonl` and drops the
    /// in-memory entry. Any I/O error is logged and swallowed.
    pub async fn finish_game(&self, game_id: &str) {
        let journal = self.games.lock().await.remove(game_id);
        let Some(journal) = journal else { return };
        if let Err(err) = self.flush(game_id, &journal).await {
            tracing::warn!(game_id, %err, "failed to persist replay journal");
        }
    }

    /// Drops an in-progress journal without writing anything, for games
    /// abandoned before completion.
    pub async fn abandon_game(&self, game_id: &str) {
        self.games.lock().await.remove(game_id);
    }

    async fn flush(&self, game_id: &str, journal: &Journal) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.output_dir).await?;
        let path = self.output_dir.join(format!("{game_id}.jsonl"));
        let mut file = tokio::fs::File::create(path).await?;
        for line in &journal.lines {
            file.write_all(line.as_bytes()).await?;
            file.write_all(b"\n").await?;
        }
        file.flush().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mahjong_core::Tile;

    #[tokio::test]
    async fn filters_furiten_but_keeps_discards() {
        let collector = ReplayCollector::new(std::env::temp_dir().join("replay-collector-test"));
        collector.start_game("g1").await;
        collector
            .record(
                "g1",
                &[
                    GameEvent::TileDrawn { seat: 0 },
                    GameEvent::FuritenChanged { seat: 0, furiten: true },
                    GameEvent::TileDiscarded { seat: 0, tile: Tile::new(0), riichi_declaration: false },
                ],
            )
            .await;
        let games = collector.games.lock().await;
        let journal = games.get("g1").unwrap();
        // header + two kept events, furiten dropped.
        assert_eq!(journal.lines.len(), 3);
    }

    #[tokio::test]
    async fn abandon_drops_without_flushing() {
        let dir = std::env::temp_dir().join("replay-collector-abandon-test");
        let collector = ReplayCollector::new(&dir);
        collector.start_game("g2").await;
        collector.abandon_game("g2").await;
        assert!(!dir.join("g2.jsonl").exists());
    }
}
