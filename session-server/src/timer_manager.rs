//! Per-game chess-clock and fixed-duration timers (spec §4.5).
//!
//! Generalizes the teacher's `backbone-lib::timer::Timer` — a polled,
//! id-keyed list updated once per frame — into the async-native equivalent:
//! one `tokio::time::sleep` task per live timer, cancelled by dropping a
//! oneshot sender. Expiries are reported on an mpsc channel rather than
//! calling back directly into the orchestrator, so this module stays
//! ignorant of `GameOrchestrator`/`AppState` the same way `Timer` stayed
//! ignorant of whatever used its `update_and_get_list` output.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tokio::sync::{Mutex, mpsc, oneshot};

use crate::config::TimerConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutKind {
    /// A seat's chess-clock ran out mid-turn; default action is tsumogiri
    /// (discard whatever was just drawn).
    Turn,
    /// A seat never answered a call prompt in time; default action is pass.
    Meld,
    /// A seat never confirmed the next round; default action is a synthetic
    /// confirm on their behalf.
    RoundAdvance,
}

#[derive(Debug, Clone)]
pub struct TimeoutEvent {
    pub game_id: String,
    pub seat: u8,
    pub kind: TimeoutKind,
}

struct LiveTimer {
    kind: TimeoutKind,
    started_at: Instant,
    /// Seconds of the elapsed duration that do not draw from bank (the turn
    /// increment for [`TimeoutKind::Turn`], the full fixed duration for the
    /// other two kinds).
    free_seconds: f64,
    cancel: oneshot::Sender<()>,
}

#[derive(Default)]
struct GameTimers {
    bank_seconds: [f64; 4],
    live: HashMap<u8, LiveTimer>,
}

/// Per-game, per-seat timer state plus the dispatch channel timeouts are
/// reported on. One instance lives in `AppState`, shared across every game.
pub struct TimerManager {
    games: Mutex<HashMap<String, GameTimers>>,
    tx: mpsc::UnboundedSender<TimeoutEvent>,
    rx: Mutex<Option<mpsc::UnboundedReceiver<TimeoutEvent>>>,
}

impl Default for TimerManager {
    fn default() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        TimerManager { games: Mutex::new(HashMap::new()), tx, rx: Mutex::new(Some(rx)) }
    }
}

impl TimerManager {
    /// Takes ownership of the expiry stream. Called exactly once at startup
    /// by the task that drives timeouts into the orchestrator; panics if
    /// called twice since there can only ever be one consumer.
    pub async fn take_receiver(&self) -> mpsc::UnboundedReceiver<TimeoutEvent> {
        self.rx.lock().await.take().expect("timeout receiver already taken")
    }

    pub async fn register_game(&self, game_id: &str, starting_bank_seconds: f64) {
        let mut games = self.games.lock().await;
        games.insert(
            game_id.to_string(),
            GameTimers { bank_seconds: [starting_bank_seconds; 4], live: HashMap::new() },
        );
    }

    pub async fn remove_game(&self, game_id: &str) {
        // Dropping every `LiveTimer` drops its cancel sender, which wakes
        // the corresponding sleeping task with a closed channel and it exits
        // without firing.
        self.games.lock().await.remove(game_id);
    }

    /// Starts (replacing any existing) turn timer for `seat`: `turn_increment`
    /// is free, after which the seat's own bank drains.
    pub async fn start_turn_timer(&self, game_id: &str, seat: u8, turn_increment: Duration) {
        let mut games = self.games.lock().await;
        let Some(state) = games.get_mut(game_id) else { return };
        let bank = Duration::from_secs_f64(state.bank_seconds[seat as usize].max(0.0));
        let total = turn_increment + bank;
        self.spawn_timer(state, game_id, seat, TimeoutKind::Turn, turn_increment.as_secs_f64(), total);
    }

    /// Stops the seat's turn timer (if any) and deducts any bank consumed
    /// past the free increment. Called on `Discard`.
    pub async fn stop_turn_timer(&self, game_id: &str, seat: u8) {
        let mut games = self.games.lock().await;
        let Some(state) = games.get_mut(game_id) else { return };
        if let Some(timer) = state.live.remove(&seat) {
            if timer.kind == TimeoutKind::Turn {
                let elapsed = timer.started_at.elapsed().as_secs_f64();
                let consumed = (elapsed - timer.free_seconds).max(0.0);
                state.bank_seconds[seat as usize] = (state.bank_seconds[seat as usize] - consumed).max(0.0);
            }
        }
    }

    pub async fn start_meld_timer(&self, game_id: &str, seat: u8, duration: Duration) {
        let mut games = self.games.lock().await;
        let Some(state) = games.get_mut(game_id) else { return };
        self.spawn_timer(state, game_id, seat, TimeoutKind::Meld, duration.as_secs_f64(), duration);
    }

    pub async fn cancel_meld_timer(&self, game_id: &str, seat: u8) {
        self.cancel_if_kind(game_id, seat, TimeoutKind::Meld).await;
    }

    pub async fn start_round_advance_timer(&self, game_id: &str, seat: u8, duration: Duration) {
        let mut games = self.games.lock().await;
        let Some(state) = games.get_mut(game_id) else { return };
        self.spawn_timer(state, game_id, seat, TimeoutKind::RoundAdvance, duration.as_secs_f64(), duration);
    }

    pub async fn cancel_round_advance_timer(&self, game_id: &str, seat: u8) {
        self.cancel_if_kind(game_id, seat, TimeoutKind::RoundAdvance).await;
    }

    /// Cancellation is idempotent: removing an absent timer is a no-op, as
    /// it is whenever resolution races a timer that already fired.
    async fn cancel_if_kind(&self, game_id: &str, seat: u8, kind: TimeoutKind) {
        let mut games = self.games.lock().await;
        let Some(state) = games.get_mut(game_id) else { return };
        if state.live.get(&seat).is_some_and(|t| t.kind == kind) {
            state.live.remove(&seat);
        }
    }

    /// Adds `round_bonus` to every seat's bank, called once on round start.
    pub async fn apply_round_bonus(&self, game_id: &str, round_bonus: Duration) {
        let mut games = self.games.lock().await;
        let Some(state) = games.get_mut(game_id) else { return };
        for bank in state.bank_seconds.iter_mut() {
            *bank += round_bonus.as_secs_f64();
        }
    }

    /// Captures a disconnecting seat's remaining bank for `SessionData`,
    /// cancelling any live timer for that seat in the process.
    pub async fn capture_remaining_bank(&self, game_id: &str, seat: u8) -> f64 {
        let mut games = self.games.lock().await;
        let Some(state) = games.get_mut(game_id) else { return 0.0 };
        if let Some(timer) = state.live.remove(&seat) {
            if timer.kind == TimeoutKind::Turn {
                let elapsed = timer.started_at.elapsed().as_secs_f64();
                let consumed = (elapsed - timer.free_seconds).max(0.0);
                state.bank_seconds[seat as usize] = (state.bank_seconds[seat as usize] - consumed).max(0.0);
            }
        }
        state.bank_seconds[seat as usize]
    }

    /// Restores a reconnecting seat's bank; a fresh turn timer is started
    /// separately by the caller once it knows whether it's this seat's turn.
    pub async fn restore_bank(&self, game_id: &str, seat: u8, remaining_seconds: f64) {
        let mut games = self.games.lock().await;
        if let Some(state) = games.get_mut(game_id) {
            state.bank_seconds[seat as usize] = remaining_seconds;
        }
    }

    fn spawn_timer(
        &self,
        state: &mut GameTimers,
        game_id: &str,
        seat: u8,
        kind: TimeoutKind,
        free_seconds: f64,
        fire_after: Duration,
    ) {
        state.live.remove(&seat);
        let (cancel_tx, cancel_rx) = oneshot::channel();
        let tx = self.tx.clone();
        let event = TimeoutEvent { game_id: game_id.to_string(), seat, kind };
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(fire_after) => {
                    let _ = tx.send(event);
                }
                _ = cancel_rx => {}
            }
        });
        state.live.insert(seat, LiveTimer { kind, started_at: Instant::now(), free_seconds, cancel: cancel_tx });
    }
}

impl From<&TimerConfig> for TurnDurations {
    fn from(config: &TimerConfig) -> Self {
        TurnDurations {
            bank: Duration::from_millis(config.bank_millis),
            turn_increment: Duration::from_millis(config.turn_increment_millis),
            round_bonus: Duration::from_millis(config.round_bonus_millis),
            call_response: Duration::from_millis(config.call_response_millis),
            round_advance: Duration::from_millis(config.round_advance_millis),
        }
    }
}

/// Convenience bundle so callers don't have to convert every field by hand.
pub struct TurnDurations {
    pub bank: Duration,
    pub turn_increment: Duration,
    pub round_bonus: Duration,
    pub call_response: Duration,
    pub round_advance: Duration,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stop_turn_timer_deducts_only_bank_time() {
        let mgr = TimerManager::default();
        mgr.register_game("g1", 300.0).await;
        mgr.start_turn_timer("g1", 0, Duration::from_millis(50)).await;
        tokio::time::sleep(Duration::from_millis(10)).await;
        mgr.stop_turn_timer("g1", 0).await;
        let games = mgr.games.lock().await;
        // Elapsed time was well under the free increment, so nothing should
        // have been drawn from bank.
        assert!((games.get("g1").unwrap().bank_seconds[0] - 300.0).abs() < 0.01);
    }

    #[tokio::test]
    async fn cancel_is_idempotent() {
        let mgr = TimerManager::default();
        mgr.register_game("g1", 300.0).await;
        mgr.cancel_meld_timer("g1", 2).await;
        mgr.cancel_meld_timer("g1", 2).await;
    }

    #[tokio::test]
    async fn turn_timer_expiry_is_reported() {
        let mgr = TimerManager::default();
        mgr.register_game("g1", 0.0).await;
        mgr.start_turn_timer("g1", 1, Duration::from_millis(5)).await;
        let mut rx = mgr.take_receiver().await;
        let event = rx.recv().await.expect("timer should fire");
        assert_eq!(event.seat, 1);
        assert_eq!(event.kind, TimeoutKind::Turn);
    }
}
