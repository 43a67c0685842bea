use crate::broadcast::Member;
use crate::error::JoinError;
use crate::room::{ConnectionId, Room, RoomId};
use std::fmt;
use std::time::Duration;
use tokio::sync::mpsc::error::{SendError, TrySendError};
use tokio::sync::{mpsc, oneshot};

/// Commands from connections (via the matchmaker or registry) to one room
pub enum RoomCommand {
    Join {
        connection: ConnectionId,
        name: String,
        member: Box<dyn Member>,
        response: oneshot::Sender<Result<usize, JoinRejected>>,
    },
    Leave {
        connection: ConnectionId,
    },
    PaddleMove {
        slot: usize,
        y: f64,
    },
    PlayAgain,
}

/// A join the room turned away.
///
/// `member` is handed back whenever the room saw the request without
/// seating it, so the caller can offer it elsewhere.
pub struct JoinRejected {
    pub reason: JoinError,
    pub member: Option<Box<dyn Member>>,
}

impl fmt::Debug for JoinRejected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JoinRejected")
            .field("reason", &self.reason)
            .field("member_returned", &self.member.is_some())
            .finish()
    }
}

/// Notices from room tasks back to the matchmaker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomNotice {
    /// A player left the room
    Vacated { room_id: RoomId },
}

/// Cheap, cloneable address of a running room task.
///
/// The task exits once every handle has been dropped.
#[derive(Clone)]
pub struct RoomHandle {
    pub id: RoomId,
    tx: mpsc::Sender<RoomCommand>,
}

impl RoomHandle {
    pub async fn join(
        &self,
        connection: ConnectionId,
        name: String,
        member: Box<dyn Member>,
    ) -> Result<usize, JoinRejected> {
        let (response, rx) = oneshot::channel();
        let command = RoomCommand::Join {
            connection,
            name,
            member,
            response,
        };
        if let Err(SendError(command)) = self.tx.send(command).await {
            let member = match command {
                RoomCommand::Join { member, .. } => Some(member),
                _ => None,
            };
            return Err(JoinRejected {
                reason: JoinError::RoomUnavailable,
                member,
            });
        }
        rx.await.unwrap_or_else(|_| {
            Err(JoinRejected {
                reason: JoinError::RoomUnavailable,
                member: None,
            })
        })
    }

    /// Queue a paddle position without waiting. Stale input is dropped
    /// when the room is backed up.
    pub fn paddle_move(&self, slot: usize, y: f64) {
        match self.tx.try_send(RoomCommand::PaddleMove { slot, y }) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                tracing::debug!("{} inbox full, dropping paddle input", self.id);
            }
            Err(TrySendError::Closed(_)) => {}
        }
    }

    pub async fn leave(&self, connection: ConnectionId) {
        let _ = self.tx.send(RoomCommand::Leave { connection }).await;
    }

    pub async fn play_again(&self) {
        let _ = self.tx.send(RoomCommand::PlayAgain).await;
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Spawn the task that owns `room` and return its handle.
pub fn spawn_room(
    room: Room,
    tick_rate_hz: u32,
    inbox_capacity: usize,
    notice_tx: mpsc::UnboundedSender<RoomNotice>,
) -> RoomHandle {
    let (tx, rx) = mpsc::channel(inbox_capacity);
    let handle = RoomHandle { id: room.id, tx };
    tokio::spawn(run_room(room, rx, notice_tx, tick_rate_hz));
    handle
}

/// Run one room. Owns the room's state; commands and ticks are handled one
/// at a time, so input never races the simulation.
pub async fn run_room(
    mut room: Room,
    mut cmd_rx: mpsc::Receiver<RoomCommand>,
    notice_tx: mpsc::UnboundedSender<RoomNotice>,
    tick_rate_hz: u32,
) {
    let tick_duration = Duration::from_secs_f64(1.0 / tick_rate_hz as f64);
    let mut tick_interval = tokio::time::interval(tick_duration);
    tick_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let mut was_ticking = false;

    loop {
        // Re-evaluated every pass: once the room stops playing no further
        // tick is polled, even if one is already due.
        let ticking = room.is_ticking();
        if ticking && !was_ticking {
            tick_interval.reset();
        }
        was_ticking = ticking;

        tokio::select! {
            _ = tick_interval.tick(), if ticking => {
                room.tick();
            }

            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(RoomCommand::Join { connection, name, member, response }) => {
                        let result = if room.has_free_slot() {
                            room.add_player(connection, name, member)
                                .map_err(|reason| JoinRejected { reason, member: None })
                        } else {
                            Err(JoinRejected { reason: JoinError::RoomFull, member: Some(member) })
                        };
                        let accepted = result.is_ok();
                        if response.send(result).is_err() && accepted {
                            // Nobody will route this player's input or leave.
                            room.remove_player(connection);
                        }
                    }
                    Some(RoomCommand::Leave { connection }) => {
                        if let Some(remaining) = room.remove_player(connection) {
                            tracing::info!("{} left {}, {} remaining", connection, room.id, remaining);
                            let _ = notice_tx.send(RoomNotice::Vacated { room_id: room.id });
                        }
                    }
                    Some(RoomCommand::PaddleMove { slot, y }) => {
                        room.apply_paddle_input(slot, y);
                    }
                    Some(RoomCommand::PlayAgain) => {
                        if room.reset() {
                            tracing::info!("{} restarted", room.id);
                        }
                    }
                    None => break,
                }
            }
        }
    }

    tracing::info!("{} closed", room.id);
}
