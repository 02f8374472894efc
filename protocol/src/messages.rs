//! Client <-> server message bodies (spec §6).

use serde::{Deserialize, Serialize};

use crate::ErrorCode;

/// A tile id in 0..135 (four copies x 34 distinct types, `tile_id / 4` is
/// the tile type).
pub type TileId = u8;

/// A seat index, always in 0..4.
pub type Seat = u8;

/// Messages a client may send.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    /// Bind this connection to a pending game; the ticket doubles as the
    /// session token.
    JoinGame { game_ticket: String },
    /// Resume a previously bound session after a disconnect.
    Reconnect { game_id: String, session_token: String },
    /// Lobby path (legacy/alternative to the ticketed `JoinGame` flow):
    /// join a room created by `POST /rooms`.
    JoinRoom { room_id: String, name: String },
    /// Flip this connection's ready flag in its room; the last ready flip
    /// transitions the room to a started game.
    SetReady { ready: bool },
    /// A game action dispatched to the orchestrator.
    GameAction {
        action: GameActionKind,
        data: GameActionData,
    },
    /// Free-text chat, relayed without interpretation.
    ChatMessage { text: String },
    /// Heartbeat.
    Ping,
}

/// The closed set of in-round actions a seat may send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameActionKind {
    Discard,
    DeclareRiichi,
    DeclareTsumo,
    CallRon,
    CallPon,
    CallChi,
    CallKan,
    Pass,
    CallKyuushu,
    ConfirmRound,
}

/// The tagged payload union for [`ClientMessage::GameAction`]. Most
/// variants carry nothing beyond the discriminant; the ones in spec §6 that
/// carry data are represented explicitly, everything else is `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct GameActionData {
    pub tile_id: Option<TileId>,
    pub sequence_tiles: Option<(TileId, TileId)>,
    pub kan_type: Option<KanTypeWire>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KanTypeWire {
    Closed,
    Open,
    Added,
}

/// Who receives a [`ServerEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventTarget {
    Broadcast,
    Seat(Seat),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MeldTypeWire {
    Pon,
    Chi,
    ClosedKan,
    OpenKan,
    AddedKan,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CallTypeWire {
    Meld,
    Ron,
    Chankan,
}

/// A single caller entry attached to a `CallPrompt` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallerWire {
    pub seat: Seat,
    pub meld_type: Option<MeldTypeWire>,
    /// Chi sequence options available to this seat, each a pair of the
    /// caller's own tiles that complete the run with the discard.
    pub chi_options: Vec<(TileId, TileId)>,
}

/// A player roster entry, sent on `GameStarted`/`RoundStarted`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerInfoWire {
    pub seat: Seat,
    pub name: String,
    pub score: i64,
    pub is_ai: bool,
}

/// Envelope for everything the server pushes to clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    // --- room / session lifecycle ---
    RoomJoined { room_id: String, players: Vec<PlayerInfoWire> },
    PlayerJoined { player_name: String },
    PlayerLeft { player_name: String },
    PlayerReadyChanged { player_name: String, ready: bool },
    GameStarting { game_id: String },
    GameReconnected { snapshot: ReconnectSnapshotWire },
    PlayerReconnected { seat: Seat },
    RoomLeft,
    GameLeft,
    Pong,
    Error { code: ErrorCode, message: String },
    /// Relayed `ChatMessage`, uninterpreted and unpersisted.
    Chat { seat: Seat, text: String },

    // --- game lifecycle (spec §6) ---
    GameStarted { game_id: String, players: Vec<PlayerInfoWire> },
    RoundStarted {
        seat: Seat,
        round_wind: u8,
        round_number: u32,
        dealer_seat: Seat,
        current_seat: Seat,
        dora_indicators: Vec<TileId>,
        honba: u32,
        riichi_sticks: u32,
        my_tiles: Vec<TileId>,
        players: Vec<PlayerInfoWire>,
    },
    Draw {
        seat: Seat,
        tile_id: TileId,
        /// Only the owning seat's frame carries this; stripped on replay
        /// and on retransmission to every other recipient.
        available_actions: Option<Vec<AvailableActionWire>>,
    },
    Discard { seat: Seat, tile_id: TileId, is_tsumogiri: bool, is_riichi: bool },
    Meld {
        meld_type: MeldTypeWire,
        caller_seat: Seat,
        tile_ids: Vec<TileId>,
        from_seat: Option<Seat>,
        called_tile_id: Option<TileId>,
    },
    CallPrompt { call_type: CallTypeWire, tile_id: TileId, from_seat: Seat, callers: Vec<CallerWire> },
    RiichiDeclared { seat: Seat },
    DoraRevealed { tile_id: TileId },
    Furiten { seat: Seat, is_furiten: bool },
    RoundEnd { result: RoundResultWire },
    GameEnded { winner_seat: Option<Seat>, standings: Vec<StandingWire>, num_rounds: u32 },
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub enum AvailableActionWire {
    Discard,
    DeclareTsumo,
    CallKyuushu,
    CallKan { kan_type: KanTypeWire, tile_id: TileId },
    DeclareRiichi { tile_id: TileId },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StandingWire {
    pub seat: Seat,
    pub name: String,
    pub score: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconnectSnapshotWire {
    pub seat: Seat,
    pub round_wind: u8,
    pub round_number: u32,
    pub dealer_seat: Seat,
    pub current_seat: Seat,
    pub dora_indicators: Vec<TileId>,
    pub honba: u32,
    pub riichi_sticks: u32,
    pub my_tiles: Vec<TileId>,
    pub melds: Vec<(Seat, MeldTypeWire, Vec<TileId>)>,
    pub discards: Vec<(Seat, TileId)>,
    pub players: Vec<PlayerInfoWire>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum RoundResultWire {
    Tsumo { winner_seat: Seat, han: u32, fu: u32, deltas: [i64; 4] },
    Ron { winner_seat: Seat, loser_seat: Seat, han: u32, fu: u32, deltas: [i64; 4] },
    DoubleRon { winner_seats: (Seat, Seat), loser_seat: Seat, deltas: [i64; 4] },
    ExhaustiveDraw { tempai_seats: Vec<Seat>, deltas: [i64; 4] },
    NagashiMangan { seats: Vec<Seat>, deltas: [i64; 4] },
    AbortiveDraw { reason: AbortiveReasonWire },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AbortiveReasonWire {
    FourWinds,
    FourKans,
    FourRiichi,
    TripleRon,
    KyuushuKyuuhai,
}
