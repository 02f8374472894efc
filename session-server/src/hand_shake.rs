//! The very first message on a new websocket decides what the connection is
//! bound to (spec §4.4, §6): a freshly-started ticketed game, a reconnect to
//! one already in progress, or a room in the legacy join-and-ready lobby.
//!
//! Grounded on the teacher's `hand_shake.rs` shape (`init_and_connect`/
//! `process_handshake_client`/`process_handshake_server` reading exactly one
//! framed message before anything else happens) but reading JSON
//! [`ClientMessage`] frames instead of a postcard `JoinRequest`, and binding
//! a seat on the new game-session registry instead of a relay room.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::SplitStream;
use futures_util::{SinkExt, StreamExt};
use protocol::{ClientMessage, ErrorCode, ServerEvent, close_code, close_reason};

use crate::game_orchestrator::GameOrchestrator;
use crate::models::{ActiveGame, Room, SeatSender};
use crate::session_manager::AppState;

/// How long a connection is given to send its first message before it is
/// dropped as abandoned.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(15);

/// What a connection is bound to once the handshake completes. `receive_mod`
/// matches on this to decide how to interpret subsequent messages, and it
/// flips from `Room` to `Game` in place if a `SetReady` completes the room.
#[derive(Clone)]
pub enum Binding {
    Game { game: Arc<ActiveGame>, seat: u8 },
    Room { room: Arc<Room>, seat: u8 },
}

/// Sends a one-off error frame and a policy-violation close directly on the
/// raw sink, since the per-connection forwarding task hasn't been spawned
/// yet at handshake time.
async fn reject(
    ws_sender: &mut (impl futures_util::Sink<Message, Error = axum::Error> + Unpin),
    code: ErrorCode,
    message: impl Into<String>,
    close: (u16, &'static str),
) {
    let event = ServerEvent::Error { code, message: message.into() };
    if let Ok(text) = serde_json::to_string(&event) {
        let _ = ws_sender.send(Message::Text(text.into())).await;
    }
    let _ = ws_sender
        .send(Message::Close(Some(axum::extract::ws::CloseFrame {
            code: close.0,
            reason: close.1.into(),
        })))
        .await;
}

/// Reads and binds the handshake message. Returns `None` if the connection
/// should be dropped immediately (timeout, malformed frame, or a rejected
/// join) - the caller has nothing further to do in that case, the close
/// frame has already gone out.
pub async fn perform(
    ws_sender: &mut (impl futures_util::Sink<Message, Error = axum::Error> + Unpin),
    ws_receiver: &mut SplitStream<WebSocket>,
    app: &Arc<AppState>,
    tx: SeatSender,
) -> Option<Binding> {
    let raw = match tokio::time::timeout(HANDSHAKE_TIMEOUT, ws_receiver.next()).await {
        Ok(Some(Ok(Message::Text(text)))) => text,
        Ok(Some(Ok(_))) => {
            reject(
                ws_sender,
                ErrorCode::Session(protocol::SessionErrorCode::NotInGame),
                "first message must be a join/reconnect request",
                (close_code::POLICY_VIOLATION, close_reason::INVALID_GAME_ACTION),
            )
            .await;
            return None;
        }
        Ok(Some(Err(_))) | Ok(None) => return None,
        Err(_) => {
            reject(
                ws_sender,
                ErrorCode::Session(protocol::SessionErrorCode::NotInGame),
                "handshake timed out",
                (close_code::AUTH_TIMEOUT, close_reason::AUTH_TIMEOUT),
            )
            .await;
            return None;
        }
    };

    let message: ClientMessage = match serde_json::from_str(&raw) {
        Ok(m) => m,
        Err(e) => {
            reject(
                ws_sender,
                ErrorCode::Session(protocol::SessionErrorCode::NotInGame),
                format!("malformed handshake message: {e}"),
                (close_code::POLICY_VIOLATION, close_reason::INVALID_GAME_ACTION),
            )
            .await;
            return None;
        }
    };

    match message {
        ClientMessage::JoinGame { game_ticket } => match app.join_with_ticket(&game_ticket, tx.clone()).await {
            Ok((game, seat, _session_token)) => Some(Binding::Game { game, seat }),
            Err(err) => {
                reject(
                    ws_sender,
                    ErrorCode::Session((&err).into()),
                    err.to_string(),
                    (close_code::POLICY_VIOLATION, close_reason::INVALID_GAME_ACTION),
                )
                .await;
                None
            }
        },
        ClientMessage::Reconnect { game_id, session_token } => match app.reconnect(&game_id, &session_token).await {
            Ok((game, seat)) => {
                app.bind_seat_sender(&game, seat, tx).await;
                GameOrchestrator::resume_after_reconnect(app, &game, seat).await;
                Some(Binding::Game { game, seat })
            }
            Err(err) => {
                reject(
                    ws_sender,
                    ErrorCode::Session((&err).into()),
                    err.to_string(),
                    (close_code::POLICY_VIOLATION, close_reason::INVALID_GAME_ACTION),
                )
                .await;
                None
            }
        },
        ClientMessage::JoinRoom { room_id, name } => {
            let Some(room) = app.find_room(&room_id).await else {
                reject(
                    ws_sender,
                    ErrorCode::Session(protocol::SessionErrorCode::RoomNotFound),
                    format!("room {room_id} not found"),
                    (close_code::POLICY_VIOLATION, close_reason::INVALID_GAME_ACTION),
                )
                .await;
                return None;
            };
            match app.join_room(&room, name.clone(), tx.clone()).await {
                Ok(seat) => {
                    app.broadcast_room(&room, ServerEvent::PlayerJoined { player_name: name }).await;
                    let players = app.room_roster(&room).await;
                    let _ = tx.send(ServerEvent::RoomJoined { room_id: room.room_id.clone(), players });
                    Some(Binding::Room { room, seat })
                }
                Err(err) => {
                    reject(
                        ws_sender,
                        ErrorCode::Session((&err).into()),
                        err.to_string(),
                        (close_code::POLICY_VIOLATION, close_reason::INVALID_GAME_ACTION),
                    )
                    .await;
                    None
                }
            }
        }
        _ => {
            reject(
                ws_sender,
                ErrorCode::Session(protocol::SessionErrorCode::NotInGame),
                "first message must be a join/reconnect request",
                (close_code::POLICY_VIOLATION, close_reason::INVALID_GAME_ACTION),
            )
            .await;
            None
        }
    }
}
