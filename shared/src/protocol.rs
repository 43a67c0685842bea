use serde::{Deserialize, Serialize};
use ts_rs::TS;

// Every frame is `{"type": <event>, "data": <payload>}`; unit events omit `data`.

// === Server -> Client ===

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "type", content = "data")]
pub enum ServerMsg {
    #[serde(rename = "player-joined")]
    PlayerJoined(PlayerJoinedMsg),
    #[serde(rename = "game-state")]
    GameState(GameStateMsg),
    #[serde(rename = "game-started")]
    GameStarted,
    #[serde(rename = "game-ended")]
    GameEnded(GameEndedMsg),
    #[serde(rename = "player-disconnected")]
    PlayerDisconnected(PlayerDisconnectedMsg),
    #[serde(rename = "error")]
    Error(String),
}

/// Sent only to the connection that just joined.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct PlayerJoinedMsg {
    pub player_id: u32,
    pub players: Vec<String>,
}

/// Full room snapshot. Replaces any previous state on the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct GameStateMsg {
    pub ball: BallWire,
    pub paddles: PaddlesWire,
    pub game_started: bool,
    pub game_ended: bool,
    pub winner: Option<String>,
    pub players: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct BallWire {
    pub x: f64,
    pub y: f64,
    pub dx: f64,
    pub dy: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PaddlesWire {
    pub player1: PaddleWire,
    pub player2: PaddleWire,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PaddleWire {
    pub y: f64,
    pub score: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct GameEndedMsg {
    pub winner: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PlayerDisconnectedMsg {
    pub players: Vec<String>,
}

// === Client -> Server ===

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "type", content = "data")]
pub enum ClientMsg {
    #[serde(rename = "join-game")]
    JoinGame(JoinGameMsg),
    #[serde(rename = "paddle-move")]
    PaddleMove(PaddleMoveMsg),
    #[serde(rename = "play-again")]
    PlayAgain,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct JoinGameMsg {
    pub player_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct PaddleMoveMsg {
    pub player_id: u32,
    pub y: f64,
}
