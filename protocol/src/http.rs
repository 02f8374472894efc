//! HTTP lobby surface DTOs (spec §6).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
pub struct CreatePendingGameRequest {
    pub game_id: String,
    pub num_ai_players: u8,
    pub players: Vec<PendingPlayerTicket>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PendingPlayerTicket {
    pub name: String,
    pub user_id: String,
    pub game_ticket: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreatePendingGameResponse {
    pub game_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateRoomRequest {
    pub num_ai_players: u8,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateRoomResponse {
    pub room_id: String,
}
