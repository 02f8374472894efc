//! Per-connection message loop, spawned once [`crate::hand_shake::perform`]
//! has bound the socket to a seat (spec §4.2-§4.4, §6).
//!
//! Generalizes the teacher's `handle_server_logic`/`handle_client_logic`:
//! two tasks, one forwarding outbound traffic and one reading inbound
//! frames, joined with `tokio::select!` so whichever finishes first aborts
//! the other. There the two roles (`server`/`client`) were a permanent
//! property of the connection; here a single shape serves both lobby paths
//! since a room connection's inbound handling simply flips to game handling
//! in place the moment [`crate::session_manager::AppState::set_ready`]
//! starts the table. The current binding lives in a shared cell rather than
//! being owned by one task, so whichever side notices the disconnect first
//! still cleans up the right seat.

use std::sync::Arc;

use axum::extract::ws::{CloseFrame, Message, WebSocket};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use protocol::{ClientMessage, ServerEvent, close_code, close_reason};
use tokio::sync::{Mutex, mpsc};

use crate::game_orchestrator::GameOrchestrator;
use crate::hand_shake::Binding;
use crate::heartbeat_monitor;
use crate::models::SeatSender;
use crate::session_manager::AppState;

/// Drives one connection end to end: handshake, then the message loop,
/// then cleanup. Mirrors the teacher's `websocket()` top level function.
pub async fn run(socket: WebSocket, app: Arc<AppState>) {
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let (tx, rx) = mpsc::unbounded_channel::<ServerEvent>();

    let Some(binding) = crate::hand_shake::perform(&mut ws_sender, &mut ws_receiver, &app, tx.clone()).await else {
        return;
    };
    let binding = Arc::new(Mutex::new(binding));

    let ws_sender = Arc::new(Mutex::new(ws_sender));
    let mut send_task = tokio::spawn(send_logic(ws_sender.clone(), rx));
    let mut receive_task = tokio::spawn(receive_logic(ws_receiver, app.clone(), tx, binding.clone()));

    let reason = tokio::select! {
        res = &mut send_task => { receive_task.abort(); res.unwrap_or("internal panic in send logic") }
        res = &mut receive_task => { send_task.abort(); res.unwrap_or("internal panic in receive logic") }
    };

    let final_binding = binding.lock().await.clone();
    cleanup(&app, final_binding).await;

    let mut sender = ws_sender.lock().await;
    let _ = sender
        .send(Message::Close(Some(CloseFrame { code: close_code::NORMAL, reason: reason.into() })))
        .await;
}

async fn cleanup(app: &Arc<AppState>, binding: Binding) {
    match binding {
        Binding::Game { game, seat } => app.leave_game(&game, seat).await,
        Binding::Room { room, seat } => app.leave_room(&room, seat).await,
    }
}

/// Forwards every [`ServerEvent`] queued for this seat out over the socket
/// as a JSON text frame, until the channel closes or the socket errors.
async fn send_logic(
    sender: Arc<Mutex<SplitSink<WebSocket, Message>>>,
    mut rx: mpsc::UnboundedReceiver<ServerEvent>,
) -> &'static str {
    while let Some(event) = rx.recv().await {
        let text = match serde_json::to_string(&event) {
            Ok(text) => text,
            Err(e) => {
                tracing::error!(?e, "failed to serialize outbound event");
                continue;
            }
        };
        let mut guard = sender.lock().await;
        if let Err(err) = guard.send(Message::Text(text.into())).await {
            tracing::warn!(?err, "error writing to socket");
            return close_reason::INTERNAL_ERROR;
        }
    }
    close_reason::GAME_ENDED
}

/// Reads inbound frames and dispatches them against whatever the shared
/// binding currently is, flipping it from `Room` to `Game` in place the
/// moment a `SetReady` completes the room.
async fn receive_logic(
    mut receiver: SplitStream<WebSocket>,
    app: Arc<AppState>,
    tx: SeatSender,
    binding: Arc<Mutex<Binding>>,
) -> &'static str {
    loop {
        let Some(frame) = receiver.next().await else {
            return close_reason::INTERNAL_ERROR;
        };
        let text = match frame {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) => return close_reason::GAME_ENDED,
            Ok(_) => continue,
            Err(err) => {
                tracing::warn!(?err, "error reading from socket");
                return close_reason::INTERNAL_ERROR;
            }
        };
        let message: ClientMessage = match serde_json::from_str(&text) {
            Ok(m) => m,
            Err(e) => {
                let code = protocol::ErrorCode::Game(protocol::GameErrorCode::GameError);
                let _ = tx.send(ServerEvent::Error { code, message: format!("malformed message: {e}") });
                continue;
            }
        };

        let mut guard = binding.lock().await;
        match &*guard {
            Binding::Game { game, seat } => {
                let (game, seat) = (game.clone(), *seat);
                drop(guard);
                heartbeat_monitor::touch(&game, seat).await;
                match message {
                    ClientMessage::GameAction { action, data } => {
                        GameOrchestrator::handle_action(&app, &game, seat, action, data).await;
                    }
                    ClientMessage::ChatMessage { text } => {
                        app.broadcast(&game, ServerEvent::Chat { seat, text }).await;
                    }
                    ClientMessage::Ping => {
                        app.send_to_seat(&game, seat, ServerEvent::Pong).await;
                    }
                    _ => {}
                }
            }
            Binding::Room { room, seat } => {
                let (room, seat) = (room.clone(), *seat);
                drop(guard);
                match message {
                    ClientMessage::SetReady { ready } => {
                        if let Some(active) = app.set_ready(&room, seat, ready).await {
                            GameOrchestrator::kickoff(&app, &active).await;
                            *binding.lock().await = Binding::Game { game: active, seat };
                        } else {
                            let player_name = room
                                .mutable
                                .lock()
                                .await
                                .members
                                .get(seat as usize)
                                .map(|m| m.name.clone())
                                .unwrap_or_default();
                            app.broadcast_room(&room, ServerEvent::PlayerReadyChanged { player_name, ready }).await;
                        }
                    }
                    ClientMessage::ChatMessage { text } => {
                        app.broadcast_room(&room, ServerEvent::Chat { seat, text }).await;
                    }
                    ClientMessage::Ping => {
                        let _ = tx.send(ServerEvent::Pong);
                    }
                    _ => {}
                }
            }
        }
    }
}
