//! Integration tests for the pong server.
//!
//! These tests start a real server instance and connect via WebSocket
//! to verify end-to-end behavior.

use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_tungstenite::{connect_async, tungstenite::Message};

// Minimal mirror of the wire protocol, decoded loosely.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", content = "data")]
#[allow(dead_code)]
enum ServerMsg {
    #[serde(rename = "player-joined")]
    PlayerJoined {
        #[serde(rename = "playerId")]
        player_id: u32,
        players: Vec<String>,
    },
    #[serde(rename = "game-state")]
    GameState(serde_json::Value),
    #[serde(rename = "game-started")]
    GameStarted,
    #[serde(rename = "game-ended")]
    GameEnded { winner: String },
    #[serde(rename = "player-disconnected")]
    PlayerDisconnected { players: Vec<String> },
    #[serde(rename = "error")]
    Error(String),
}

type Ws =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// Start a test server on a random available port and return its address.
async fn start_test_server() -> String {
    use pong_server::config::ServerConfig;
    use pong_server::ws::{router, AppState};

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let config = ServerConfig {
        listen_addr: addr.to_string(),
        rng_seed: Some(12345),
        allowed_origins: vec![],
        ..Default::default()
    };

    let app = router(AppState::new(&config));
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    addr.to_string()
}

async fn connect(addr: &str) -> Ws {
    let (ws, _) = connect_async(format!("ws://{}/ws", addr))
        .await
        .expect("Failed to connect");
    ws
}

async fn send(ws: &mut Ws, value: serde_json::Value) {
    ws.send(Message::Text(value.to_string().into()))
        .await
        .unwrap();
}

async fn join(addr: &str, name: &str) -> Ws {
    let mut ws = connect(addr).await;
    send(
        &mut ws,
        json!({ "type": "join-game", "data": { "playerName": name } }),
    )
    .await;
    ws
}

/// Read the next text message and parse as ServerMsg.
async fn recv_msg(ws: &mut Ws) -> ServerMsg {
    loop {
        match ws.next().await {
            Some(Ok(Message::Text(text))) => {
                return serde_json::from_str(&text).expect("Failed to parse server message");
            }
            Some(Ok(_)) => continue, // Skip ping/pong
            Some(Err(e)) => panic!("WebSocket error: {}", e),
            None => panic!("WebSocket closed unexpectedly"),
        }
    }
}

/// Read messages until one matches, giving up after `timeout`.
async fn recv_until<F>(ws: &mut Ws, timeout: Duration, mut pred: F) -> Option<ServerMsg>
where
    F: FnMut(&ServerMsg) -> bool,
{
    tokio::time::timeout(timeout, async {
        loop {
            let msg = recv_msg(ws).await;
            if pred(&msg) {
                return msg;
            }
        }
    })
    .await
    .ok()
}

async fn wait_closed(ws: &mut Ws) -> bool {
    for _ in 0..10 {
        match tokio::time::timeout(Duration::from_millis(100), ws.next()).await {
            Ok(Some(Ok(Message::Close(_)))) | Ok(None) | Ok(Some(Err(_))) => return true,
            Err(_) => {
                if ws.send(Message::Ping(vec![].into())).await.is_err() {
                    return true;
                }
            }
            _ => continue,
        }
    }
    false
}

async fn rooms(addr: &str) -> serde_json::Value {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
    let request = format!(
        "GET /rooms HTTP/1.1\r\nHost: {}\r\nConnection: close\r\n\r\n",
        addr
    );
    stream.write_all(request.as_bytes()).await.unwrap();
    let mut response = String::new();
    stream.read_to_string(&mut response).await.unwrap();
    let body = response.split("\r\n\r\n").nth(1).unwrap_or_default();
    serde_json::from_str(body).expect("rooms body should be JSON")
}

const WAIT: Duration = Duration::from_secs(2);

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn test_first_player_gets_slot_zero() {
    let addr = start_test_server().await;
    let mut ws = join(&addr, "alice").await;

    match recv_msg(&mut ws).await {
        ServerMsg::PlayerJoined { player_id, players } => {
            assert_eq!(player_id, 0);
            assert_eq!(players, vec!["alice"]);
        }
        other => panic!("Expected PlayerJoined, got {:?}", other),
    }
    match recv_msg(&mut ws).await {
        ServerMsg::GameState(state) => {
            assert_eq!(state["gameStarted"], false);
            assert_eq!(state["ball"]["x"], 400.0);
        }
        other => panic!("Expected GameState, got {:?}", other),
    }
}

#[tokio::test]
async fn test_two_players_start_a_match() {
    let addr = start_test_server().await;
    let mut ws1 = join(&addr, "alice").await;
    let _ = recv_msg(&mut ws1).await; // player-joined
    let mut ws2 = join(&addr, "bob").await;

    match recv_msg(&mut ws2).await {
        ServerMsg::PlayerJoined { player_id, players } => {
            assert_eq!(player_id, 1);
            assert_eq!(players, vec!["alice", "bob"]);
        }
        other => panic!("Expected PlayerJoined, got {:?}", other),
    }

    let started = recv_until(&mut ws1, WAIT, |m| matches!(m, ServerMsg::GameStarted)).await;
    assert!(started.is_some(), "alice should see game-started");

    // Ticks keep flowing and the ball moves.
    let first = recv_until(&mut ws2, WAIT, |m| matches!(m, ServerMsg::GameState(_))).await;
    let later = recv_until(&mut ws2, WAIT, |m| matches!(m, ServerMsg::GameState(_))).await;
    match (first, later) {
        (Some(ServerMsg::GameState(a)), Some(ServerMsg::GameState(b))) => {
            assert_eq!(b["gameStarted"], true);
            assert_ne!(a["ball"]["x"], b["ball"]["x"]);
        }
        other => panic!("Expected two snapshots, got {:?}", other),
    }
}

#[tokio::test]
async fn test_third_player_gets_a_new_room() {
    let addr = start_test_server().await;
    let mut ws1 = join(&addr, "alice").await;
    let _ = recv_msg(&mut ws1).await;
    let mut ws2 = join(&addr, "bob").await;
    let _ = recv_msg(&mut ws2).await;
    let mut ws3 = join(&addr, "carol").await;

    match recv_msg(&mut ws3).await {
        ServerMsg::PlayerJoined { player_id, players } => {
            assert_eq!(player_id, 0);
            assert_eq!(players, vec!["carol"]);
        }
        other => panic!("Expected PlayerJoined, got {:?}", other),
    }

    assert_eq!(
        rooms(&addr).await,
        json!([{ "id": 1, "players": 2 }, { "id": 2, "players": 1 }])
    );
}

#[tokio::test]
async fn test_paddle_move_is_clamped() {
    let addr = start_test_server().await;
    let mut ws1 = join(&addr, "alice").await;
    let _ = recv_msg(&mut ws1).await;
    let mut ws2 = join(&addr, "bob").await;
    let _ = recv_msg(&mut ws2).await;
    recv_until(&mut ws1, WAIT, |m| matches!(m, ServerMsg::GameStarted)).await;

    send(
        &mut ws1,
        json!({ "type": "paddle-move", "data": { "playerId": 0, "y": 5000 } }),
    )
    .await;

    let moved = recv_until(&mut ws2, WAIT, |m| match m {
        ServerMsg::GameState(s) => s["paddles"]["player1"]["y"] == 300.0,
        _ => false,
    })
    .await;
    assert!(moved.is_some(), "paddle should be clamped to 300");
}

#[tokio::test]
async fn test_player_disconnect_notifies_opponent() {
    let addr = start_test_server().await;
    let mut ws1 = join(&addr, "alice").await;
    let _ = recv_msg(&mut ws1).await;
    let mut ws2 = join(&addr, "bob").await;
    let _ = recv_msg(&mut ws2).await;

    ws1.close(None).await.unwrap();

    let msg = recv_until(&mut ws2, WAIT, |m| {
        matches!(m, ServerMsg::PlayerDisconnected { .. })
    })
    .await;
    match msg {
        Some(ServerMsg::PlayerDisconnected { players }) => assert_eq!(players, vec!["bob"]),
        other => panic!("Expected PlayerDisconnected, got {:?}", other),
    }

    // No forfeit: bob is back to waiting, not declared winner.
    let state = recv_until(&mut ws2, WAIT, |m| matches!(m, ServerMsg::GameState(_))).await;
    match state {
        Some(ServerMsg::GameState(s)) => {
            assert_eq!(s["gameStarted"], false);
            assert_eq!(s["gameEnded"], false);
            assert!(s["winner"].is_null());
        }
        other => panic!("Expected GameState, got {:?}", other),
    }
}

#[tokio::test]
async fn test_empty_room_is_removed() {
    let addr = start_test_server().await;
    let mut ws1 = join(&addr, "alice").await;
    let _ = recv_msg(&mut ws1).await;
    assert_eq!(rooms(&addr).await, json!([{ "id": 1, "players": 1 }]));

    ws1.close(None).await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(rooms(&addr).await, json!([]));

    let mut ws2 = join(&addr, "bob").await;
    let _ = recv_msg(&mut ws2).await;
    assert_eq!(rooms(&addr).await, json!([{ "id": 2, "players": 1 }]));
}

#[tokio::test]
async fn test_double_join_is_rejected() {
    let addr = start_test_server().await;
    let mut ws = join(&addr, "alice").await;
    let _ = recv_msg(&mut ws).await;

    send(
        &mut ws,
        json!({ "type": "join-game", "data": { "playerName": "alice" } }),
    )
    .await;
    let err = recv_until(&mut ws, WAIT, |m| matches!(m, ServerMsg::Error(_))).await;
    match err {
        Some(ServerMsg::Error(text)) => assert_eq!(text, "You have already joined a game."),
        other => panic!("Expected Error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_blank_name_is_rejected() {
    let addr = start_test_server().await;
    let mut ws = join(&addr, "   ").await;
    match recv_msg(&mut ws).await {
        ServerMsg::Error(text) => assert_eq!(text, "Player name must be 1-32 characters."),
        other => panic!("Expected Error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_input_before_join_is_ignored() {
    let addr = start_test_server().await;
    let mut ws = connect(&addr).await;
    send(
        &mut ws,
        json!({ "type": "paddle-move", "data": { "playerId": 0, "y": 10 } }),
    )
    .await;
    send(&mut ws, json!({ "type": "play-again" })).await;

    // Still usable afterwards.
    send(
        &mut ws,
        json!({ "type": "join-game", "data": { "playerName": "alice" } }),
    )
    .await;
    assert!(matches!(
        recv_msg(&mut ws).await,
        ServerMsg::PlayerJoined { player_id: 0, .. }
    ));
}

#[tokio::test]
async fn test_oversized_message_disconnects_client() {
    let addr = start_test_server().await;
    let mut ws = connect(&addr).await;

    let huge_name = "x".repeat(2000);
    send(
        &mut ws,
        json!({ "type": "join-game", "data": { "playerName": huge_name } }),
    )
    .await;

    assert!(
        wait_closed(&mut ws).await,
        "Client should be disconnected after oversized message"
    );
}

#[tokio::test]
async fn test_parse_spam_disconnects_client() {
    let addr = start_test_server().await;
    let mut ws = connect(&addr).await;

    for _ in 0..10 {
        let _ = ws.send(Message::Text("not valid json".into())).await;
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    assert!(
        wait_closed(&mut ws).await,
        "Client should be disconnected after too many parse errors"
    );
}
