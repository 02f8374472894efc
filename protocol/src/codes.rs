//! Closed sets of error and close codes (spec §6).

use serde::{Deserialize, Serialize};

/// Errors raised while processing an in-progress game action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameErrorCode {
    InvalidDiscard,
    InvalidRiichi,
    InvalidPon,
    InvalidChi,
    InvalidKan,
    InvalidPass,
    InvalidRon,
    CannotCallKyuushu,
    NotYourTurn,
    GameError,
}

/// Errors raised by the session layer (lobby, reconnect, room membership).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionErrorCode {
    AlreadyInGame,
    NotInGame,
    GameNotStarted,
    RoomNotFound,
    RoomFull,
    RoomTransitioning,
    ReconnectSessionNotFound,
    ReconnectNotDisconnected,
    ReconnectGameNotFound,
    ReconnectGracePeriodExpired,
    JoinGameTicketUnknown,
    JoinGameAlreadyStarted,
    InvalidTicket,
}

/// A closed sum of the two error namespaces, used on the wire `Error` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    Game(GameErrorCode),
    Session(SessionErrorCode),
}

/// WebSocket close codes used by the session server.
pub mod close_code {
    /// Normal closure, reason `game_ended`.
    pub const NORMAL: u16 = 1000;
    /// Policy violation closure, reason `invalid_game_action`.
    pub const POLICY_VIOLATION: u16 = 1008;
    /// Internal error closure.
    pub const INTERNAL_ERROR: u16 = 1011;
    /// Connection never authenticated within the configured bound.
    pub const AUTH_TIMEOUT: u16 = 4001;
}

/// Reasons attached to a close code, kept as `&'static str` the way the
/// teacher's relay server returns `&'static str` failure reasons from its
/// send/receive tasks.
pub mod close_reason {
    pub const GAME_ENDED: &str = "game_ended";
    pub const INVALID_GAME_ACTION: &str = "invalid_game_action";
    pub const REPLACED_BY_RECONNECT: &str = "replaced_by_reconnect";
    pub const IDLE_TIMEOUT: &str = "idle_timeout";
    pub const AUTH_TIMEOUT: &str = "auth_timeout";
    pub const INTERNAL_ERROR: &str = "internal_error";
}
