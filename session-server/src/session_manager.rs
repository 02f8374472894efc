//! Top-level session registry and lock discipline (spec §4.2, §5).
//!
//! Grounded on the Python reference's `manager.py` (`leave_game`,
//! `_replace_with_ai_player`, `_process_invalid_action`), cross-checked
//! against the teacher's `websocket()` shutdown-outside-lock pattern: every
//! function here that closes a socket does so only after releasing the
//! per-game lock, to avoid a disconnect handler re-entering a lock its own
//! caller still holds.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use mahjong_core::deal_new_round;
use protocol::ServerEvent;
use rand::Rng;
use tokio::sync::Mutex;

use crate::config::ConfigStore;
use crate::errors::SessionError;
use crate::game_history::GameHistoryStore;
use crate::models::{
    ActiveGame, PendingGame, PendingGameMutable, PlayerInfo, Room, RoomMember, RoomMutable, SeatSender,
    SessionRegistry,
};
use crate::replay_collector::ReplayCollector;
use crate::timer_manager::TimerManager;

/// Everything one websocket connection needs handed to it after it's bound
/// to a seat.
pub struct SeatHandle {
    pub game: Arc<ActiveGame>,
    pub seat: u8,
    pub session_token: String,
}

pub struct AppState {
    pub registry: SessionRegistry,
    pub config: Arc<ConfigStore>,
    pub timers: TimerManager,
    pub replays: ReplayCollector,
    pub history: GameHistoryStore,
}

impl AppState {
    pub fn new(config: Arc<ConfigStore>) -> Self {
        AppState {
            registry: SessionRegistry::default(),
            config,
            timers: TimerManager::default(),
            replays: ReplayCollector::default(),
            history: GameHistoryStore::default(),
        }
    }

    /// Creates a pending game (spec's `POST /games`): one ticket per human
    /// seat, AI fills out the remainder. Takes `app` by `Arc` rather than
    /// `&self` so the timeout task below can outlive this call.
    pub async fn create_pending_game(
        app: &Arc<AppState>,
        game_id: String,
        players: Vec<(String, String, String)>,
        num_ai_players: u8,
    ) -> Arc<PendingGame> {
        let mut player_infos = Vec::new();
        let mut tickets = HashMap::new();
        for (seat, (name, user_id, ticket)) in players.into_iter().enumerate() {
            player_infos.push(PlayerInfo { user_id, name, is_ai: false });
            tickets.insert(ticket, seat as u8);
        }
        for i in 0..num_ai_players {
            player_infos.push(PlayerInfo {
                user_id: format!("ai-{i}"),
                name: format!("AI {}", i + 1),
                is_ai: true,
            });
        }
        let (started_tx, _) = tokio::sync::watch::channel(None);
        let pending = Arc::new(PendingGame {
            game_id: game_id.clone(),
            players: player_infos,
            mutable: Mutex::new(PendingGameMutable { tickets, connected_seats: Vec::new(), senders: HashMap::new() }),
            started: started_tx,
        });
        app.registry.pending_games.lock().await.insert(game_id.clone(), pending.clone());

        let timeout_secs = app.config.current.read().await.pending_game_timeout_secs;
        let app = app.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_secs(timeout_secs)).await;
            app.expire_pending_game(&game_id).await;
        });

        pending
    }

    /// Fires once a pending game's join window (spec §4.4 point 3) elapses.
    /// If nobody ever joined, the game is cancelled outright; otherwise it
    /// starts right away with AI filling in for every ticket holder who
    /// never connected. A no-op if the game already started or was already
    /// expired (lost the race against [`Self::join_with_ticket`]).
    async fn expire_pending_game(&self, game_id: &str) {
        let Some(pending) = self.registry.pending_games.lock().await.remove(game_id) else {
            return;
        };
        let (connected_seats, senders) = {
            let mutable = pending.mutable.lock().await;
            let senders: Vec<(u8, SeatSender)> = mutable.senders.iter().map(|(s, snd)| (*s, snd.clone())).collect();
            (mutable.connected_seats.clone(), senders)
        };
        if connected_seats.is_empty() {
            tracing::info!(game_id, "pending game timed out with no players connected, cancelling");
            return;
        }
        tracing::info!(
            game_id,
            connected = connected_seats.len(),
            expected = pending.players.iter().filter(|p| !p.is_ai).count(),
            "pending game timed out, starting with AI filling missing seats"
        );
        let mut players = pending.players.clone();
        for (seat, player) in players.iter_mut().enumerate() {
            if !player.is_ai && !connected_seats.contains(&(seat as u8)) {
                player.is_ai = true;
            }
        }
        let active = self.start_active_game(pending.game_id.clone(), players).await;
        for (seat, sender) in senders {
            self.bind_seat_sender(&active, seat, sender).await;
        }
        let _ = pending.started.send(Some(active.clone()));
        crate::game_orchestrator::GameOrchestrator::kickoff(self, &active).await;
    }

    /// Redeems a join ticket. Binds `sender` against the seat immediately;
    /// once every expected human has joined the table starts right away and
    /// every bound sender gets folded onto the new [`ActiveGame`] at once. A
    /// seat that joins before the rest of the table blocks here until that
    /// happens instead of erroring.
    pub async fn join_with_ticket(
        &self,
        ticket: &str,
        sender: SeatSender,
    ) -> Result<(Arc<ActiveGame>, u8, String), SessionError> {
        let mut found: Option<(Arc<PendingGame>, u8)> = None;
        {
            let pending_games = self.registry.pending_games.lock().await;
            for game in pending_games.values() {
                let mutable = game.mutable.lock().await;
                if let Some(&seat) = mutable.tickets.get(ticket) {
                    found = Some((game.clone(), seat));
                    break;
                }
            }
        }
        let (pending, seat) = found.ok_or_else(|| SessionError::UnknownTicket(ticket.to_string()))?;

        let all_connected = {
            let mut mutable = pending.mutable.lock().await;
            if !mutable.connected_seats.contains(&seat) {
                mutable.connected_seats.push(seat);
            }
            mutable.senders.insert(seat, sender);
            mutable.connected_seats.len() >= pending.players.iter().filter(|p| !p.is_ai).count()
        };

        if all_connected {
            self.registry.pending_games.lock().await.remove(&pending.game_id);
            let active = self.start_active_game(pending.game_id.clone(), pending.players.clone()).await;
            let senders: Vec<(u8, SeatSender)> = pending.mutable.lock().await.senders.drain().collect();
            for (s, snd) in senders {
                self.bind_seat_sender(&active, s, snd).await;
            }
            let _ = pending.started.send(Some(active.clone()));
            crate::game_orchestrator::GameOrchestrator::kickoff(self, &active).await;
            let session_token = active.session_tokens.read().await[seat as usize].clone();
            Ok((active, seat, session_token))
        } else {
            let mut rx = pending.started.subscribe();
            let active = loop {
                if let Some(active) = rx.borrow().clone() {
                    break active;
                }
                if rx.changed().await.is_err() {
                    return Err(SessionError::GameNotFound(pending.game_id.clone()));
                }
            };
            let session_token = active.session_tokens.read().await[seat as usize].clone();
            Ok((active, seat, session_token))
        }
    }

    /// Deals the first round and registers a game as active, shared by both
    /// the ticketed `POST /games` path and the legacy room path once every
    /// seat is accounted for.
    async fn start_active_game(&self, game_id: String, players: Vec<PlayerInfo>) -> Arc<ActiveGame> {
        let settings = self.config.current.read().await.core_settings();
        let seed: u64 = rand::thread_rng().gen();
        let scores = [settings.starting_score; 4];
        let state =
            deal_new_round(game_id.clone(), settings, seed, mahjong_core::Wind::East, 1, 0, 0, 0, scores);
        let session_tokens: [String; 4] = std::array::from_fn(|_| generate_token());
        let active = Arc::new(ActiveGame {
            game_id: game_id.clone(),
            players,
            lock: Mutex::new(state),
            seat_senders: tokio::sync::RwLock::new(std::array::from_fn(|_| None)),
            session_tokens: tokio::sync::RwLock::new(session_tokens),
            pending_riichi: tokio::sync::RwLock::new([false; 4]),
            pending_claims: Mutex::new(Vec::new()),
            offense_counts: Mutex::new([0; 4]),
            round_confirmations: Mutex::new([false; 4]),
            last_seen: Mutex::new(std::array::from_fn(|_| Instant::now())),
            disconnect_deadlines: Mutex::new([None; 4]),
        });
        self.registry.active_games.lock().await.insert(game_id.clone(), active.clone());
        self.timers.register_game(&game_id, self.config.current.read().await.timers.bank_millis as f64 / 1000.0).await;
        self.replays.start_game(&game_id).await;
        self.history
            .create_game(&game_id, unix_timestamp(), rules_label(&self.config.current.read().await.rules))
            .await;
        active
    }

    /// Creates a fresh room for the legacy, non-ticketed lobby path (spec
    /// §4.4): human players join directly over the websocket and ready up;
    /// the last ready flip starts the game.
    pub async fn create_room(&self, num_ai_players: u8) -> Arc<Room> {
        let room_id = generate_token();
        let room = Arc::new(Room {
            room_id: room_id.clone(),
            num_ai_players,
            mutable: Mutex::new(RoomMutable::default()),
            transitioning: std::sync::atomic::AtomicBool::new(false),
        });
        self.registry.rooms.lock().await.insert(room_id, room.clone());
        room
    }

    pub async fn find_room(&self, room_id: &str) -> Option<Arc<Room>> {
        self.registry.rooms.lock().await.get(room_id).cloned()
    }

    pub async fn broadcast_room(&self, room: &Arc<Room>, event: ServerEvent) {
        let mutable = room.mutable.lock().await;
        for member in &mutable.members {
            let _ = member.sender.send(event.clone());
        }
    }

    /// Current human roster of a not-yet-started room, for the `RoomJoined`
    /// ack - AI seats aren't reflected here since they don't exist until the
    /// room actually starts.
    pub async fn room_roster(&self, room: &Arc<Room>) -> Vec<protocol::PlayerInfoWire> {
        let starting_score = self.config.current.read().await.starting_score;
        let mutable = room.mutable.lock().await;
        mutable
            .members
            .iter()
            .enumerate()
            .map(|(seat, m)| protocol::PlayerInfoWire {
                seat: seat as u8,
                name: m.name.clone(),
                score: starting_score,
                is_ai: false,
            })
            .collect()
    }

    /// Removes a seat from a room that has not yet transitioned to a started
    /// game. A no-op if the room already started (the seat's departure is
    /// then handled by [`Self::leave_game`] instead) or no longer exists.
    pub async fn leave_room(&self, room: &Arc<Room>, seat: u8) {
        if room.transitioning.load(std::sync::atomic::Ordering::SeqCst) {
            return;
        }
        let mut mutable = room.mutable.lock().await;
        if (seat as usize) < mutable.members.len() {
            mutable.members.remove(seat as usize);
        }
        if mutable.members.is_empty() {
            drop(mutable);
            self.registry.rooms.lock().await.remove(&room.room_id);
        }
    }

    /// Adds `name` to `room`'s roster, seated in join order.
    pub async fn join_room(&self, room: &Arc<Room>, name: String, sender: SeatSender) -> Result<u8, SessionError> {
        let mut mutable = room.mutable.lock().await;
        if room.transitioning.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(SessionError::RoomFull(room.room_id.clone()));
        }
        let max_humans = 4 - room.num_ai_players as usize;
        if mutable.members.len() >= max_humans {
            return Err(SessionError::RoomFull(room.room_id.clone()));
        }
        mutable.members.push(RoomMember { name, ready: false, sender });
        Ok((mutable.members.len() - 1) as u8)
    }

    /// Flips a room member's ready flag; if every human in the room is now
    /// ready, transitions the room into a started [`ActiveGame`] and returns
    /// it so the caller can broadcast `GameStarting`.
    pub async fn set_ready(&self, room: &Arc<Room>, seat: u8, ready: bool) -> Option<Arc<ActiveGame>> {
        let all_ready = {
            let mut mutable = room.mutable.lock().await;
            if let Some(member) = mutable.members.get_mut(seat as usize) {
                member.ready = ready;
            }
            !mutable.members.is_empty() && mutable.members.iter().all(|m| m.ready)
        };
        if !all_ready {
            return None;
        }
        if room
            .transitioning
            .compare_exchange(false, true, std::sync::atomic::Ordering::SeqCst, std::sync::atomic::Ordering::SeqCst)
            .is_err()
        {
            return None;
        }
        let mutable = room.mutable.lock().await;
        let mut players: Vec<PlayerInfo> = mutable
            .members
            .iter()
            .enumerate()
            .map(|(i, m)| PlayerInfo { user_id: format!("room-{}-{}", room.room_id, i), name: m.name.clone(), is_ai: false })
            .collect();
        let senders: Vec<SeatSender> = mutable.members.iter().map(|m| m.sender.clone()).collect();
        for i in 0..room.num_ai_players {
            players.push(PlayerInfo { user_id: format!("ai-{i}"), name: format!("AI {}", i + 1), is_ai: true });
        }
        drop(mutable);
        let game_id = format!("room-{}", room.room_id);
        let active = self.start_active_game(game_id, players).await;
        for (seat, sender) in senders.into_iter().enumerate() {
            self.bind_seat_sender(&active, seat as u8, sender).await;
        }
        self.registry.rooms.lock().await.remove(&room.room_id);
        Some(active)
    }

    pub async fn find_active_game(&self, game_id: &str) -> Option<Arc<ActiveGame>> {
        self.registry.active_games.lock().await.get(game_id).cloned()
    }

    /// Validates a reconnect attempt and restores the seat to human control.
    /// The caller still has to rebind the outbound sender (the new
    /// connection's) and ask the orchestrator for a snapshot/resume.
    pub async fn reconnect(
        &self,
        game_id: &str,
        session_token: &str,
    ) -> Result<(Arc<ActiveGame>, u8), SessionError> {
        let game = self
            .find_active_game(game_id)
            .await
            .ok_or_else(|| SessionError::GameNotFound(game_id.to_string()))?;
        let tokens = game.session_tokens.read().await;
        let seat = tokens
            .iter()
            .position(|t| t == session_token)
            .ok_or_else(|| SessionError::ReconnectSessionNotFound(game_id.to_string()))?;
        drop(tokens);
        {
            let mut state = game.lock.lock().await;
            if state.seats[seat].connected {
                return Err(SessionError::ReconnectNotDisconnected { game_id: game_id.to_string(), seat: seat as u8 });
            }
            let deadline = game.disconnect_deadlines.lock().await[seat];
            if deadline.is_some_and(|deadline| Instant::now() > deadline) {
                return Err(SessionError::ReconnectGracePeriodExpired { game_id: game_id.to_string(), seat: seat as u8 });
            }
            state.seats[seat].connected = true;
            state.seats[seat].is_ai = false;
        }
        game.disconnect_deadlines.lock().await[seat] = None;
        Ok((game, seat as u8))
    }

    /// Registers (or replaces) the live outbound sender for a seat.
    pub async fn bind_seat_sender(&self, game: &Arc<ActiveGame>, seat: u8, sender: SeatSender) {
        let mut senders = game.seat_senders.write().await;
        senders[seat as usize] = Some(sender);
    }

    /// Handles a disconnect (spec §4.4): captures the seat's remaining bank
    /// time, marks it disconnected, and immediately hands it to the default
    /// AI substitute so the table keeps moving — a human may still reclaim
    /// the seat later via [`Self::reconnect`]. Socket closing is the
    /// caller's job, done only after this returns, never while holding
    /// `game.lock` (releasing it first is what lets `drive_ai` re-acquire
    /// it below without deadlocking).
    pub async fn leave_game(&self, game: &Arc<ActiveGame>, seat: u8) {
        self.timers.capture_remaining_bank(&game.game_id, seat).await;
        {
            let mut state = game.lock.lock().await;
            state.seats[seat as usize].connected = false;
            state.seats[seat as usize].is_ai = true;
        }
        let grace_secs = self.config.current.read().await.reconnect_grace_secs;
        game.disconnect_deadlines.lock().await[seat as usize] =
            Some(Instant::now() + std::time::Duration::from_secs(grace_secs));
        let mut senders = game.seat_senders.write().await;
        senders[seat as usize] = None;
        drop(senders);
        self.broadcast(game, ServerEvent::PlayerLeft { player_name: game.players[seat as usize].name.clone() })
            .await;
        crate::game_orchestrator::GameOrchestrator::drive_ai(self, game).await;
    }

    pub async fn broadcast(&self, game: &Arc<ActiveGame>, event: ServerEvent) {
        let senders = game.seat_senders.read().await;
        for sender in senders.iter().flatten() {
            let _ = sender.send(event.clone());
        }
    }

    pub async fn send_to_seat(&self, game: &Arc<ActiveGame>, seat: u8, event: ServerEvent) {
        let senders = game.seat_senders.read().await;
        if let Some(sender) = &senders[seat as usize] {
            let _ = sender.send(event);
        }
    }
}

fn generate_token() -> String {
    let mut rng = rand::thread_rng();
    (0..24).map(|_| format!("{:x}", rng.gen_range(0..16))).collect()
}

pub(crate) fn unix_timestamp() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

fn rules_label(rules: &crate::config::GameRulesConfig) -> &'static str {
    match rules {
        crate::config::GameRulesConfig::Hanchan => "hanchan",
        crate::config::GameRulesConfig::Tonpuusen => "tonpuusen",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    async fn test_app() -> Arc<AppState> {
        let config = Arc::new(ConfigStore::default());
        {
            let mut current = config.current.write().await;
            current.pending_game_timeout_secs = 3600;
            current.reconnect_grace_secs = 3600;
        }
        Arc::new(AppState::new(config))
    }

    fn players(names: &[&str]) -> Vec<(String, String, String)> {
        names
            .iter()
            .enumerate()
            .map(|(i, name)| (name.to_string(), format!("user-{i}"), format!("ticket-{i}")))
            .collect()
    }

    #[tokio::test]
    async fn join_with_ticket_blocks_first_seat_until_table_fills() {
        let app = test_app().await;
        AppState::create_pending_game(&app, "g1".into(), players(&["alice", "bob"]), 2).await;

        let waiter_app = app.clone();
        let waiter = tokio::spawn(async move {
            let (tx0, _rx0) = mpsc::unbounded_channel();
            waiter_app.join_with_ticket("ticket-0", tx0).await
        });

        // Alice alone doesn't complete the table (2 humans expected), so her
        // join stays pending on the watch channel until bob shows up too.
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        let (tx1, _rx1) = mpsc::unbounded_channel();
        let (bob_game, bob_seat, _) = app.join_with_ticket("ticket-1", tx1).await.unwrap();
        assert_eq!(bob_seat, 1);

        let (alice_game, alice_seat, _) = waiter.await.unwrap().unwrap();
        assert_eq!(alice_seat, 0);
        assert_eq!(alice_game.game_id, bob_game.game_id);
    }

    #[tokio::test]
    async fn reconnect_rejects_seat_past_grace_period() {
        let app = test_app().await;
        {
            let mut current = app.config.current.write().await;
            current.reconnect_grace_secs = 0;
        }
        AppState::create_pending_game(&app, "g1".into(), players(&["alice"]), 3).await;
        let (tx, _rx) = mpsc::unbounded_channel();
        let (game, seat, token) = app.join_with_ticket("ticket-0", tx).await.unwrap();
        assert_eq!(seat, 0);

        app.leave_game(&game, seat).await;
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;

        let err = app.reconnect(&game.game_id, &token).await.unwrap_err();
        assert!(matches!(err, SessionError::ReconnectGracePeriodExpired { .. }));
    }

    #[tokio::test]
    async fn reconnect_restores_seat_within_grace_period() {
        let app = test_app().await;
        AppState::create_pending_game(&app, "g1".into(), players(&["alice"]), 3).await;
        let (tx, _rx) = mpsc::unbounded_channel();
        let (game, seat, token) = app.join_with_ticket("ticket-0", tx).await.unwrap();

        app.leave_game(&game, seat).await;
        let (restored_game, restored_seat) = app.reconnect(&game.game_id, &token).await.unwrap();
        assert_eq!(restored_seat, seat);
        assert!(restored_game.lock.lock().await.seats[seat as usize].connected);
    }

    #[tokio::test]
    async fn pending_game_timeout_fills_missing_seats_with_ai() {
        let config = Arc::new(ConfigStore::default());
        {
            let mut current = config.current.write().await;
            current.pending_game_timeout_secs = 0;
        }
        let app = Arc::new(AppState::new(config));
        AppState::create_pending_game(&app, "g1".into(), players(&["alice", "bob"]), 2).await;

        let (tx, _rx) = mpsc::unbounded_channel();
        let (game, seat, _token) = app.join_with_ticket("ticket-0", tx).await.unwrap();
        assert_eq!(seat, 0);

        // `join_with_ticket` itself blocks alice until the table fills, so it
        // only returns once the timeout task has stepped in for bob's seat.
        assert!(!game.players[0].is_ai);
        assert!(game.players[1].is_ai);
        assert!(game.players[2].is_ai);
        assert!(game.players[3].is_ai);
    }
}
