use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use futures_util::{SinkExt, StreamExt};
use pong_shared::protocol::{ClientMsg, ServerMsg};
use tokio::sync::mpsc;

use crate::config::ServerConfig;
use crate::matchmaker::{spawn_matchmaker, MatchmakerHandle, RoomSummary};
use crate::registry::ConnectionRegistry;
use crate::room::ConnectionId;

/// Shared app state passed to each WebSocket handler
#[derive(Clone)]
pub struct AppState {
    pub registry: ConnectionRegistry,
    pub matchmaker: MatchmakerHandle,
    pub outbound_capacity: usize,
    pub max_message_bytes: usize,
    pub max_parse_errors: u32,
}

impl AppState {
    /// Start the matchmaker and wire a registry to it.
    pub fn new(config: &ServerConfig) -> Self {
        let matchmaker = spawn_matchmaker(config.clone());
        let registry = ConnectionRegistry::new(matchmaker.clone(), config.enforce_slot_ownership);
        Self {
            registry,
            matchmaker,
            outbound_capacity: config.outbound_capacity,
            max_message_bytes: config.max_message_bytes,
            max_parse_errors: config.max_parse_errors,
        }
    }
}

/// Routes served by the game server.
pub fn router(app_state: AppState) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/rooms", get(rooms_handler))
        .with_state(app_state)
}

/// HTTP handler for WebSocket upgrade
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(app_state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, app_state))
}

/// Open rooms and how many players each holds.
pub async fn rooms_handler(State(app_state): State<AppState>) -> Json<Vec<RoomSummary>> {
    Json(app_state.matchmaker.list_rooms().await)
}

async fn handle_socket(socket: WebSocket, app_state: AppState) {
    let connection = app_state.registry.on_connect();
    tracing::info!("{} connected", connection);

    let (mut sink, mut stream) = socket.split();
    // Rooms write here; this task is the only writer to the socket.
    let (out_tx, mut out_rx) = mpsc::channel::<ServerMsg>(app_state.outbound_capacity);
    let mut parse_errors: u32 = 0;

    loop {
        tokio::select! {
            // Client -> Server
            msg = stream.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        if text.len() > app_state.max_message_bytes {
                            tracing::warn!("{} sent {} byte frame, closing", connection, text.len());
                            break;
                        }
                        match serde_json::from_str::<ClientMsg>(&text) {
                            Ok(client_msg) => {
                                handle_client_msg(&app_state, connection, client_msg, &out_tx).await;
                            }
                            Err(e) => {
                                parse_errors += 1;
                                tracing::warn!("{} sent malformed message: {}", connection, e);
                                if parse_errors >= app_state.max_parse_errors {
                                    tracing::warn!("{} exceeded parse error limit, closing", connection);
                                    break;
                                }
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        tracing::debug!("{} socket error: {}", connection, e);
                        break;
                    }
                    _ => {} // Ignore ping/pong/binary
                }
            }

            // Server -> Client (room events)
            Some(msg) = out_rx.recv() => {
                let json = match serde_json::to_string(&msg) {
                    Ok(json) => json,
                    Err(e) => {
                        tracing::error!("Failed to encode message for {}: {}", connection, e);
                        continue;
                    }
                };
                if sink.send(Message::Text(json.into())).await.is_err() {
                    break;
                }
            }
        }
    }

    // Cleanup on disconnect
    app_state.registry.on_disconnect(connection).await;
    tracing::info!("{} disconnected", connection);
}

async fn handle_client_msg(
    app_state: &AppState,
    connection: ConnectionId,
    msg: ClientMsg,
    out_tx: &mpsc::Sender<ServerMsg>,
) {
    match msg {
        ClientMsg::JoinGame(join) => {
            let result = app_state
                .registry
                .on_join_request(connection, &join.player_name, Box::new(out_tx.clone()))
                .await;
            if let Err(e) = result {
                tracing::info!("{} join refused: {:?}", connection, e);
                let _ = out_tx.try_send(ServerMsg::Error(e.to_string()));
            }
        }
        ClientMsg::PaddleMove(input) => {
            app_state
                .registry
                .on_input(connection, input.player_id, input.y)
                .await;
        }
        ClientMsg::PlayAgain => {
            app_state.registry.on_play_again(connection).await;
        }
    }
}
