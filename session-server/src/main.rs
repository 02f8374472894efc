mod config;
mod errors;
mod game_history;
mod game_orchestrator;
mod hand_shake;
mod heartbeat_monitor;
mod models;
mod processing_module;
mod replay_collector;
mod session_manager;
mod timer_manager;

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::extract::{Json, State, WebSocketUpgrade};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use protocol::{
    CreatePendingGameRequest, CreatePendingGameResponse, CreateRoomRequest, CreateRoomResponse,
};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::{ConfigStore, reload_config};
use crate::game_orchestrator::GameOrchestrator;
use crate::session_manager::AppState;

/// Path to the hot-reloadable rules/timer config, mirroring the teacher's
/// `GameConfig.json` convention. Loading it is best-effort: a missing or
/// malformed file just means the server runs on [`config::SessionConfig`]'s
/// defaults, since shipping one is out of scope here.
const CONFIG_PATH: &str = "SessionConfig.json";

#[tokio::main]
/// Wires the session registry, the timer-expiry and heartbeat background
/// tasks, and the axum routes for the websocket and lobby HTTP surface, then
/// listens on port 8080. Mirrors the teacher's `main()` shape (tracing setup,
/// a watchdog task, a `Router` built once and served once) but the watchdog
/// here is the heartbeat monitor - an empty room is already removed the
/// moment its last member leaves, see
/// [`session_manager::AppState::leave_room`], so no separate dead-room sweep
/// is needed.
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("{}=info", env!("CARGO_CRATE_NAME")).into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_file(true)
                .with_line_number(true)
                .with_target(true)
                .with_thread_ids(true)
                .with_thread_names(true),
        )
        .init();

    let config_store = Arc::new(ConfigStore::default());
    match reload_config(&config_store, CONFIG_PATH).await {
        Ok(_) => tracing::info!(path = CONFIG_PATH, "loaded session config"),
        Err(message) => tracing::warn!(message, "no session config found, running on defaults"),
    }

    let app_state = Arc::new(AppState::new(config_store));

    let mut timeout_rx = app_state.timers.take_receiver().await;
    let timeout_app = app_state.clone();
    tokio::spawn(async move {
        while let Some(event) = timeout_rx.recv().await {
            GameOrchestrator::handle_timeout(&timeout_app, event).await;
        }
    });

    let heartbeat_app = app_state.clone();
    tokio::spawn(async move {
        heartbeat_monitor::run(heartbeat_app, Duration::from_secs(5)).await;
    });

    let app = Router::new()
        .route("/ws", get(websocket_handler))
        .route("/games", post(create_pending_game_handler))
        .route("/rooms", post(create_room_handler))
        .route("/reload", post(reload_handler))
        .with_state(app_state);

    let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await.unwrap();
    axum::serve(listener, app).await.unwrap();
}

/// Upgrades the HTTP request to a websocket and hands it to the per-
/// connection handshake/message loop.
async fn websocket_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| processing_module::run(socket, state))
}

/// `POST /games`: creates a pending game with one join ticket per human
/// seat, filled out with AI to four.
async fn create_pending_game_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreatePendingGameRequest>,
) -> impl IntoResponse {
    let players = request
        .players
        .into_iter()
        .map(|p| (p.name, p.user_id, p.game_ticket))
        .collect();
    AppState::create_pending_game(&state, request.game_id.clone(), players, request.num_ai_players).await;
    Json(CreatePendingGameResponse { game_id: request.game_id })
}

/// `POST /rooms`: creates a room for the legacy join-over-websocket lobby
/// path, returning its id for players to `JoinRoom` with.
async fn create_room_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateRoomRequest>,
) -> impl IntoResponse {
    let room = state.create_room(request.num_ai_players).await;
    Json(CreateRoomResponse { room_id: room.room_id.clone() })
}

/// Forces a reload of [`CONFIG_PATH`] without restarting the process.
async fn reload_handler(State(state): State<Arc<AppState>>) -> String {
    match reload_config(&state.config, CONFIG_PATH).await {
        Ok(config) => format!("reloaded: {:?}", config.rules),
        Err(e) => format!("reload failed: {e}"),
    }
}
