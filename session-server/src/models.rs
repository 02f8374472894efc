//! In-memory session registry types (spec §4, §5).
//!
//! `Room`/`AppState` in the teacher's relay server held raw byte channels
//! for a pass-through host; here the equivalent registry entries own an
//! actual [`mahjong_core::GameState`] behind a per-game lock plus the
//! connection bookkeeping the orchestrator needs to route events.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use mahjong_core::GameState;
use protocol::ServerEvent;
use tokio::sync::{Mutex, RwLock, mpsc};

pub type PlayerId = String;

#[derive(Debug, Clone)]
pub struct PlayerInfo {
    pub user_id: PlayerId,
    pub name: String,
    pub is_ai: bool,
}

/// A seat's one-shot outbound channel: the connection task owns the other
/// end and forwards everything it receives onto the actual socket.
pub type SeatSender = mpsc::UnboundedSender<ServerEvent>;

#[derive(Default)]
pub struct PendingGameMutable {
    /// Maps a one-time join ticket to the seat it authenticates.
    pub tickets: HashMap<String, u8>,
    pub connected_seats: Vec<u8>,
    /// Outbound senders bound as each human connects, forwarded onto the
    /// [`ActiveGame`] once every expected human has joined and the table
    /// actually starts.
    pub senders: HashMap<u8, SeatSender>,
}

/// A game waiting for all human seats to connect, created by the lobby's
/// `POST /games` endpoint before any websocket exists. A seat that joins
/// before every other human has connected blocks on [`Self::started`]
/// rather than erroring.
pub struct PendingGame {
    pub game_id: String,
    pub players: Vec<PlayerInfo>,
    pub mutable: Mutex<PendingGameMutable>,
    pub started: tokio::sync::watch::Sender<Option<Arc<ActiveGame>>>,
}

/// A live, in-progress game: the orchestrator mutates `state` under `lock`
/// for every inbound action; `seat_senders` is how results get pushed back
/// out to sockets without the orchestrator knowing anything about axum.
pub struct ActiveGame {
    pub game_id: String,
    pub players: Vec<PlayerInfo>,
    pub lock: Mutex<GameState>,
    pub seat_senders: RwLock<[Option<SeatSender>; 4]>,
    /// Per-seat session tokens, handed out on join and presented again on
    /// reconnect.
    pub session_tokens: RwLock<[String; 4]>,
    /// Set by a standalone `DeclareRiichi` action and consumed by the next
    /// `Discard` from the same seat (the wire protocol keeps the two
    /// separate; the pure engine bundles them into one transition).
    pub pending_riichi: RwLock<[bool; 4]>,
    /// Buffered non-pass claims for the call window currently open on
    /// `state.round.phase`, resolved by [`mahjong_core::call_resolution`]
    /// once every eligible seat has responded.
    pub pending_claims: Mutex<Vec<(u8, mahjong_core::call_resolution::CallClaim)>>,
    /// Consecutive invalid actions per seat; three strikes disconnects.
    pub offense_counts: Mutex<[u32; 4]>,
    /// Explicit `ConfirmRound` acks once `round.phase == RoundEnded`; AI
    /// seats are marked true as soon as the round ends. Reset on every new
    /// round deal.
    pub round_confirmations: Mutex<[bool; 4]>,
    /// Last inbound traffic (including bare pings) per seat, read by the
    /// heartbeat monitor to reap idle connections.
    pub last_seen: Mutex<[Instant; 4]>,
    /// Set when a seat disconnects, to `now + reconnect_grace_secs`; past
    /// this point [`crate::session_manager::AppState::reconnect`] refuses
    /// the seat and its AI substitute is permanent for the rest of the game.
    pub disconnect_deadlines: Mutex<[Option<Instant>; 4]>,
}

#[derive(Default)]
pub struct SessionRegistry {
    pub pending_games: Mutex<HashMap<String, Arc<PendingGame>>>,
    pub active_games: Mutex<HashMap<String, Arc<ActiveGame>>>,
    pub rooms: Mutex<HashMap<String, Arc<Room>>>,
}

#[derive(Default)]
pub struct RoomMutable {
    /// Connection-order roster; index is the eventual seat assignment.
    pub members: Vec<RoomMember>,
}

pub struct RoomMember {
    pub name: String,
    pub ready: bool,
    pub sender: SeatSender,
}

/// Pre-game gathering created by `POST /rooms` (spec §4.4's legacy lobby
/// path): players join directly over the websocket and ready up, and the
/// last ready flip starts the game under the room lock.
pub struct Room {
    pub room_id: String,
    pub num_ai_players: u8,
    pub mutable: Mutex<RoomMutable>,
    /// Set while flipping to a started game, so a racing join is rejected
    /// instead of landing in a room that is about to disappear.
    pub transitioning: std::sync::atomic::AtomicBool,
}
