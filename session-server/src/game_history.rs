//! Game-history persistence seam (spec §6 "Persisted state").
//!
//! A concrete in-memory store rather than a trait object: the corpus has
//! no precedent for the `async fn` in a `dyn`-safe trait that a real
//! storage-backend seam would need, so swapping this for a persistent
//! implementation later means replacing the type directly, the same way
//! [`crate::replay_collector::ReplayCollector`] is a concrete struct with
//! its output location as a constructor argument.

use std::collections::HashMap;

use tokio::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    Completed,
    Abandoned,
}

#[derive(Debug, Clone)]
pub struct GameHistoryRecord {
    pub game_id: String,
    pub started_at: u64,
    pub game_type: String,
    pub ended_at: Option<u64>,
    pub end_reason: Option<EndReason>,
    pub num_rounds: Option<u32>,
    pub standings: Option<Vec<(u8, String, i64)>>,
}

/// Keeps every record in memory for the life of the process.
#[derive(Default)]
pub struct GameHistoryStore {
    records: Mutex<HashMap<String, GameHistoryRecord>>,
}

impl GameHistoryStore {
    pub async fn create_game(&self, game_id: &str, started_at: u64, game_type: &str) {
        let mut records = self.records.lock().await;
        records.insert(
            game_id.to_string(),
            GameHistoryRecord {
                game_id: game_id.to_string(),
                started_at,
                game_type: game_type.to_string(),
                ended_at: None,
                end_reason: None,
                num_rounds: None,
                standings: None,
            },
        );
    }

    pub async fn finish_game(
        &self,
        game_id: &str,
        ended_at: u64,
        end_reason: EndReason,
        num_rounds: Option<u32>,
        standings: Option<Vec<(u8, String, i64)>>,
    ) {
        let mut records = self.records.lock().await;
        if let Some(record) = records.get_mut(game_id) {
            record.ended_at = Some(ended_at);
            record.end_reason = Some(end_reason);
            record.num_rounds = num_rounds;
            record.standings = standings;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn records_lifecycle() {
        let store = GameHistoryStore::default();
        store.create_game("g1", 100, "hanchan").await;
        store.finish_game("g1", 200, EndReason::Completed, Some(8), Some(vec![(0, "a".into(), 30000)])).await;
        let records = store.records.lock().await;
        let record = records.get("g1").unwrap();
        assert_eq!(record.ended_at, Some(200));
        assert_eq!(record.end_reason, Some(EndReason::Completed));
    }
}
