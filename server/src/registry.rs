//! Routing table from live connections to the room seat they hold.
//!
//! The registry never holds game state. It only remembers where to send a
//! connection's input, and forgets the connection when it closes.

use crate::broadcast::Member;
use crate::error::JoinError;
use crate::game_loop::RoomHandle;
use crate::matchmaker::MatchmakerHandle;
use crate::room::ConnectionId;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

pub const MAX_NAME_CHARS: usize = 32;

/// A connection's place in a room
#[derive(Clone)]
pub struct Seat {
    pub room: RoomHandle,
    pub slot: usize,
}

#[derive(Clone)]
pub struct ConnectionRegistry {
    seats: Arc<Mutex<HashMap<ConnectionId, Seat>>>,
    next_connection_id: Arc<AtomicU64>,
    matchmaker: MatchmakerHandle,
    enforce_slot_ownership: bool,
}

impl ConnectionRegistry {
    pub fn new(matchmaker: MatchmakerHandle, enforce_slot_ownership: bool) -> Self {
        Self {
            seats: Arc::new(Mutex::new(HashMap::new())),
            next_connection_id: Arc::new(AtomicU64::new(1)),
            matchmaker,
            enforce_slot_ownership,
        }
    }

    /// Allocate an id for a freshly opened connection.
    pub fn on_connect(&self) -> ConnectionId {
        ConnectionId(self.next_connection_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Ask the matchmaker for a seat and remember it. Returns the slot.
    pub async fn on_join_request(
        &self,
        connection: ConnectionId,
        player_name: &str,
        member: Box<dyn Member>,
    ) -> Result<usize, JoinError> {
        if self.seats.lock().await.contains_key(&connection) {
            return Err(JoinError::AlreadyJoined);
        }
        let name = normalize_name(player_name)?;

        let assignment = self.matchmaker.assign(connection, name, member).await?;
        let slot = assignment.slot;
        self.seats.lock().await.insert(
            connection,
            Seat {
                room: assignment.room,
                slot,
            },
        );
        Ok(slot)
    }

    /// Route a paddle position to the caller's room.
    pub async fn on_input(&self, connection: ConnectionId, claimed_slot: u32, y: f64) {
        let Some(seat) = self.seat_of(connection).await else {
            return;
        };
        let slot = claimed_slot as usize;
        if self.enforce_slot_ownership && slot != seat.slot {
            tracing::debug!(
                "{} sent input for slot {} but owns slot {}",
                connection,
                slot,
                seat.slot
            );
            return;
        }
        seat.room.paddle_move(slot, y);
    }

    pub async fn on_play_again(&self, connection: ConnectionId) {
        if let Some(seat) = self.seat_of(connection).await {
            seat.room.play_again().await;
        }
    }

    /// Release the connection's seat, if any. Safe to call more than once.
    pub async fn on_disconnect(&self, connection: ConnectionId) {
        let seat = self.seats.lock().await.remove(&connection);
        if let Some(seat) = seat {
            seat.room.leave(connection).await;
        }
    }

    pub async fn seat_of(&self, connection: ConnectionId) -> Option<Seat> {
        self.seats.lock().await.get(&connection).cloned()
    }
}

/// Trim surrounding whitespace and enforce the length limit.
pub fn normalize_name(raw: &str) -> Result<String, JoinError> {
    let name = raw.trim();
    let chars = name.chars().count();
    if chars == 0 || chars > MAX_NAME_CHARS || name.chars().any(char::is_control) {
        return Err(JoinError::InvalidName);
    }
    Ok(name.to_string())
}
