use std::fmt;

/// Why a `join-game` request was refused. Reported to the requester only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinError {
    /// The room already holds two players
    RoomFull,
    /// No room could be created for the player
    RoomUnavailable,
    /// The connection is already seated in a room
    AlreadyJoined,
    InvalidName,
    /// The matchmaker is no longer running
    ServerUnavailable,
}

impl fmt::Display for JoinError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            JoinError::RoomFull => "Sorry, the game is already full.",
            JoinError::RoomUnavailable => "No game room is available right now.",
            JoinError::AlreadyJoined => "You have already joined a game.",
            JoinError::InvalidName => "Player name must be 1-32 characters.",
            JoinError::ServerUnavailable => "The server is shutting down.",
        };
        f.write_str(text)
    }
}

impl std::error::Error for JoinError {}
