//! Typed session-layer errors (spec §5, §6).

use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum SessionError {
    #[error("pending game ticket {0} is unknown")]
    UnknownTicket(String),
    #[error("game {0} has already started; tickets are single-use")]
    GameAlreadyStarted(String),
    #[error("no active game with id {0}")]
    GameNotFound(String),
    #[error("session token did not match a disconnected seat in game {0}")]
    ReconnectSessionNotFound(String),
    #[error("seat {seat} in game {game_id} is not currently disconnected")]
    ReconnectNotDisconnected { game_id: String, seat: u8 },
    #[error("seat {seat} in game {game_id} missed its reconnect grace period")]
    ReconnectGracePeriodExpired { game_id: String, seat: u8 },
    #[error("room {0} was not found")]
    RoomNotFound(String),
    #[error("room {0} is full")]
    RoomFull(String),
    #[error(transparent)]
    Round(#[from] mahjong_core::RoundError),
}

impl From<&SessionError> for protocol::SessionErrorCode {
    fn from(err: &SessionError) -> Self {
        use protocol::SessionErrorCode::*;
        match err {
            SessionError::UnknownTicket(_) => JoinGameTicketUnknown,
            SessionError::GameAlreadyStarted(_) => JoinGameAlreadyStarted,
            SessionError::GameNotFound(_) => ReconnectGameNotFound,
            SessionError::ReconnectSessionNotFound(_) => ReconnectSessionNotFound,
            SessionError::ReconnectNotDisconnected { .. } => ReconnectNotDisconnected,
            SessionError::ReconnectGracePeriodExpired { .. } => ReconnectGracePeriodExpired,
            SessionError::RoomNotFound(_) => RoomNotFound,
            SessionError::RoomFull(_) => RoomFull,
            SessionError::Round(_) => GameNotStarted,
        }
    }
}
