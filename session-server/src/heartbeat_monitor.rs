//! Idle-connection reaping (spec §4.4, §4.6).
//!
//! Generalizes the teacher's `cleanup_dead_rooms` watchdog (`main.rs`): that
//! task swept one flat `rooms` map every twenty minutes for channels the
//! host had already dropped. Here the same polled-sweep shape runs far more
//! often and checks last-traffic timestamps instead of channel liveness,
//! since a seat can go idle without its socket ever actually closing.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::session_manager::AppState;

/// Runs forever, waking on `interval` to close any seat that hasn't sent so
/// much as a `Ping` within `idle_timeout`. Intended to be spawned once at
/// startup alongside the timer-expiry consumer.
pub async fn run(app: Arc<AppState>, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        ticker.tick().await;
        let idle_timeout = Duration::from_secs(app.config.current.read().await.idle_timeout_secs);
        let games: Vec<_> = app.registry.active_games.lock().await.values().cloned().collect();
        for game in games {
            let idle_seats: Vec<u8> = {
                let last_seen = game.last_seen.lock().await;
                (0..4u8).filter(|&seat| last_seen[seat as usize].elapsed() >= idle_timeout).collect()
            };
            for seat in idle_seats {
                let was_connected = game.lock.lock().await.seat(seat).connected;
                if !was_connected {
                    continue;
                }
                tracing::info!(game_id = %game.game_id, seat, "reaping idle seat");
                app.leave_game(&game, seat).await;
            }
        }
    }
}

/// Marks `seat` as having sent traffic just now; called from the connection
/// read loop on every inbound message, `Ping` included.
pub async fn touch(game: &crate::models::ActiveGame, seat: u8) {
    game.last_seen.lock().await[seat as usize] = Instant::now();
}
