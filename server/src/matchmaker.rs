//! Pairs arriving players into rooms.
//!
//! The pool of rooms lives inside a single task; every connection talks to
//! it through [`MatchmakerHandle`], so pool updates never race each other.

use crate::broadcast::Member;
use crate::config::ServerConfig;
use crate::error::JoinError;
use crate::game_loop::{spawn_room, RoomHandle, RoomNotice};
use crate::physics::ServeDirection;
use crate::room::{ConnectionId, Room, RoomId, SLOTS};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use std::collections::BTreeMap;
use tokio::sync::{mpsc, oneshot};

/// Commands from connections to the matchmaker
pub enum MatchCommand {
    Assign {
        connection: ConnectionId,
        name: String,
        member: Box<dyn Member>,
        response: oneshot::Sender<Result<Assignment, JoinError>>,
    },
    ListRooms {
        response: oneshot::Sender<Vec<RoomSummary>>,
    },
}

/// Where a player was seated
#[derive(Clone)]
pub struct Assignment {
    pub room: RoomHandle,
    pub slot: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoomSummary {
    pub id: u64,
    pub players: usize,
}

struct PoolEntry {
    handle: RoomHandle,
    /// Players seated as far as the matchmaker knows. Never below the
    /// room's real count: joins are counted on acceptance, departures
    /// only after the room reports them.
    occupancy: usize,
}

pub struct Matchmaker {
    rooms: BTreeMap<RoomId, PoolEntry>,
    next_room_id: u64,
    config: ServerConfig,
    notice_tx: mpsc::UnboundedSender<RoomNotice>,
}

impl Matchmaker {
    pub fn new(config: ServerConfig, notice_tx: mpsc::UnboundedSender<RoomNotice>) -> Self {
        Self {
            rooms: BTreeMap::new(),
            next_room_id: 1,
            config,
            notice_tx,
        }
    }

    /// Seat a player in the oldest room with a free slot, opening a new
    /// room when every existing one is full.
    pub async fn assign(
        &mut self,
        connection: ConnectionId,
        name: String,
        member: Box<dyn Member>,
    ) -> Result<Assignment, JoinError> {
        self.rooms.retain(|id, entry| {
            if entry.handle.is_closed() {
                tracing::warn!("{} stopped unexpectedly, dropping it", id);
                false
            } else {
                true
            }
        });

        let open: Vec<RoomId> = self
            .rooms
            .iter()
            .filter(|(_, entry)| entry.occupancy < SLOTS)
            .map(|(id, _)| *id)
            .collect();

        // Rooms that turn the player away hand the member back.
        let mut member = Some(member);
        for room_id in open {
            let Some(entry) = self.rooms.get(&room_id) else {
                continue;
            };
            let handle = entry.handle.clone();
            match offer(&handle, connection, &name, &mut member).await {
                Ok(slot) => return Ok(self.seated(room_id, handle, slot)),
                Err(JoinError::RoomFull) => {
                    tracing::debug!("{} was full, trying the next room", room_id);
                }
                Err(_) => {
                    tracing::warn!("{} stopped unexpectedly, dropping it", room_id);
                    self.rooms.remove(&room_id);
                }
            }
            if member.is_none() {
                return Err(JoinError::RoomUnavailable);
            }
        }

        let room_id = self.create_room()?;
        let handle = match self.rooms.get(&room_id) {
            Some(entry) => entry.handle.clone(),
            None => return Err(JoinError::RoomUnavailable),
        };
        match offer(&handle, connection, &name, &mut member).await {
            Ok(slot) => Ok(self.seated(room_id, handle, slot)),
            Err(_) => {
                self.rooms.remove(&room_id);
                Err(JoinError::RoomUnavailable)
            }
        }
    }

    fn seated(&mut self, room_id: RoomId, room: RoomHandle, slot: usize) -> Assignment {
        if let Some(entry) = self.rooms.get_mut(&room_id) {
            entry.occupancy += 1;
        }
        Assignment { room, slot }
    }

    fn create_room(&mut self) -> Result<RoomId, JoinError> {
        if self.rooms.len() >= self.config.max_rooms {
            tracing::warn!("Room limit ({}) reached", self.config.max_rooms);
            return Err(JoinError::RoomUnavailable);
        }

        let id = RoomId(self.next_room_id);
        self.next_room_id += 1;

        let rng = match self.config.rng_seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed.wrapping_add(id.0)),
            None => ChaCha8Rng::from_entropy(),
        };
        let serve: Box<dyn ServeDirection> = Box::new(rng);
        let room = Room::new(id, self.config.game, serve);
        let handle = spawn_room(
            room,
            self.config.tick_rate_hz,
            self.config.room_inbox_capacity,
            self.notice_tx.clone(),
        );

        self.rooms.insert(
            id,
            PoolEntry {
                handle,
                occupancy: 0,
            },
        );
        tracing::info!("Created {}", id);
        Ok(id)
    }

    /// A player left `room_id`. Empty rooms are removed from the pool; the
    /// room task ends once the last connection drops its handle.
    pub fn vacated(&mut self, room_id: RoomId) {
        let Some(entry) = self.rooms.get_mut(&room_id) else {
            return;
        };
        entry.occupancy = entry.occupancy.saturating_sub(1);
        if entry.occupancy == 0 {
            self.rooms.remove(&room_id);
            tracing::info!("Removed empty {}", room_id);
        }
    }

    pub fn summaries(&self) -> Vec<RoomSummary> {
        self.rooms
            .iter()
            .map(|(id, entry)| RoomSummary {
                id: id.0,
                players: entry.occupancy,
            })
            .collect()
    }
}

/// Ask one room to seat the player. On rejection `member` holds whatever
/// the room handed back.
async fn offer(
    handle: &RoomHandle,
    connection: ConnectionId,
    name: &str,
    member: &mut Option<Box<dyn Member>>,
) -> Result<usize, JoinError> {
    let Some(m) = member.take() else {
        return Err(JoinError::RoomUnavailable);
    };
    match handle.join(connection, name.to_string(), m).await {
        Ok(slot) => Ok(slot),
        Err(rejected) => {
            *member = rejected.member;
            Err(rejected.reason)
        }
    }
}

/// Run the matchmaker. Owns the room pool.
pub async fn run_matchmaker(
    mut matchmaker: Matchmaker,
    mut cmd_rx: mpsc::Receiver<MatchCommand>,
    mut notice_rx: mpsc::UnboundedReceiver<RoomNotice>,
) {
    loop {
        tokio::select! {
            // Departures first so a join never lands in a room about to be dropped.
            biased;

            Some(notice) = notice_rx.recv() => {
                match notice {
                    RoomNotice::Vacated { room_id } => matchmaker.vacated(room_id),
                }
            }

            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(MatchCommand::Assign { connection, name, member, response }) => {
                        let result = matchmaker.assign(connection, name, member).await;
                        if let Ok(assignment) = &result {
                            tracing::info!(
                                "{} seated in {} slot {}",
                                connection,
                                assignment.room.id,
                                assignment.slot
                            );
                        }
                        let _ = response.send(result);
                    }
                    Some(MatchCommand::ListRooms { response }) => {
                        let _ = response.send(matchmaker.summaries());
                    }
                    None => break,
                }
            }
        }
    }

    tracing::info!("Matchmaker stopped");
}

/// Address of the matchmaker task
#[derive(Clone)]
pub struct MatchmakerHandle {
    tx: mpsc::Sender<MatchCommand>,
}

impl MatchmakerHandle {
    pub async fn assign(
        &self,
        connection: ConnectionId,
        name: String,
        member: Box<dyn Member>,
    ) -> Result<Assignment, JoinError> {
        let (response, rx) = oneshot::channel();
        self.tx
            .send(MatchCommand::Assign {
                connection,
                name,
                member,
                response,
            })
            .await
            .map_err(|_| JoinError::ServerUnavailable)?;
        rx.await.map_err(|_| JoinError::ServerUnavailable)?
    }

    pub async fn list_rooms(&self) -> Vec<RoomSummary> {
        let (response, rx) = oneshot::channel();
        if self
            .tx
            .send(MatchCommand::ListRooms { response })
            .await
            .is_err()
        {
            return Vec::new();
        }
        rx.await.unwrap_or_default()
    }
}

/// Spawn the matchmaker task.
pub fn spawn_matchmaker(config: ServerConfig) -> MatchmakerHandle {
    let (tx, cmd_rx) = mpsc::channel(256);
    let (notice_tx, notice_rx) = mpsc::unbounded_channel();
    let matchmaker = Matchmaker::new(config, notice_tx);
    tokio::spawn(run_matchmaker(matchmaker, cmd_rx, notice_rx));
    MatchmakerHandle { tx }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pong_shared::protocol::ServerMsg;
    use std::time::Duration;

    fn config() -> ServerConfig {
        ServerConfig {
            rng_seed: Some(42),
            ..Default::default()
        }
    }

    fn member() -> (Box<dyn Member>, mpsc::Receiver<ServerMsg>) {
        let (tx, rx) = mpsc::channel(4096);
        (Box::new(tx), rx)
    }

    async fn assign(
        matchmaker: &MatchmakerHandle,
        id: u64,
    ) -> (Assignment, mpsc::Receiver<ServerMsg>) {
        let (m, rx) = member();
        let assignment = matchmaker
            .assign(ConnectionId(id), format!("player{}", id), m)
            .await
            .unwrap();
        (assignment, rx)
    }

    /// Wait until the pool reflects queued departures.
    async fn settle() {
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn first_two_players_share_a_room() {
        let matchmaker = spawn_matchmaker(config());
        let (a, _rx_a) = assign(&matchmaker, 1).await;
        let (b, _rx_b) = assign(&matchmaker, 2).await;

        assert_eq!(a.room.id, b.room.id);
        assert_eq!(a.slot, 0);
        assert_eq!(b.slot, 1);
        assert_eq!(
            matchmaker.list_rooms().await,
            vec![RoomSummary { id: 1, players: 2 }]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn third_player_opens_a_second_room() {
        let matchmaker = spawn_matchmaker(config());
        let (a, _rx_a) = assign(&matchmaker, 1).await;
        let (_b, _rx_b) = assign(&matchmaker, 2).await;
        let (c, _rx_c) = assign(&matchmaker, 3).await;

        assert_ne!(a.room.id, c.room.id);
        assert_eq!(c.slot, 0);
        assert_eq!(
            matchmaker.list_rooms().await,
            vec![
                RoomSummary { id: 1, players: 2 },
                RoomSummary { id: 2, players: 1 },
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn emptied_room_is_removed_and_never_reused() {
        let matchmaker = spawn_matchmaker(config());
        let (a, _rx_a) = assign(&matchmaker, 1).await;
        let (b, _rx_b) = assign(&matchmaker, 2).await;
        let (_c, _rx_c) = assign(&matchmaker, 3).await;

        a.room.leave(ConnectionId(1)).await;
        b.room.leave(ConnectionId(2)).await;
        settle().await;
        assert_eq!(
            matchmaker.list_rooms().await,
            vec![RoomSummary { id: 2, players: 1 }]
        );

        // Joins room 2 (open), then a brand new room 3.
        let (d, _rx_d) = assign(&matchmaker, 4).await;
        assert_eq!(d.room.id, RoomId(2));
        let (e, _rx_e) = assign(&matchmaker, 5).await;
        assert_eq!(e.room.id, RoomId(3));
    }

    #[tokio::test(start_paused = true)]
    async fn half_empty_room_is_refilled() {
        let matchmaker = spawn_matchmaker(config());
        let (a, _rx_a) = assign(&matchmaker, 1).await;
        let (_b, _rx_b) = assign(&matchmaker, 2).await;

        a.room.leave(ConnectionId(1)).await;
        settle().await;

        let (c, mut rx_c) = assign(&matchmaker, 3).await;
        assert_eq!(c.room.id, a.room.id);
        assert_eq!(c.slot, 0);
        let first = rx_c.recv().await.unwrap();
        assert!(matches!(first, ServerMsg::PlayerJoined(ref j) if j.player_id == 0));
    }

    #[tokio::test(start_paused = true)]
    async fn room_limit_yields_room_unavailable() {
        let matchmaker = spawn_matchmaker(ServerConfig {
            max_rooms: 1,
            ..config()
        });
        let (_a, _rx_a) = assign(&matchmaker, 1).await;
        let (_b, _rx_b) = assign(&matchmaker, 2).await;

        let (m, _rx) = member();
        let result = matchmaker
            .assign(ConnectionId(3), "carol".to_string(), m)
            .await;
        assert!(matches!(result, Err(JoinError::RoomUnavailable)));
    }

    #[tokio::test(start_paused = true)]
    async fn room_that_answers_full_is_skipped() {
        let (notice_tx, _notice_rx) = mpsc::unbounded_channel();
        let mut matchmaker = Matchmaker::new(config(), notice_tx);
        for id in 1..=2 {
            let (m, _rx) = member();
            matchmaker
                .assign(ConnectionId(id), format!("player{}", id), m)
                .await
                .unwrap();
        }
        // Pretend a departure was counted before the room processed it.
        if let Some(entry) = matchmaker.rooms.get_mut(&RoomId(1)) {
            entry.occupancy = 1;
        }

        let (m, mut rx) = member();
        let assignment = matchmaker
            .assign(ConnectionId(3), "carol".to_string(), m)
            .await
            .unwrap();
        assert_eq!(assignment.room.id, RoomId(2));
        assert_eq!(assignment.slot, 0);
        assert!(matches!(
            rx.recv().await,
            Some(ServerMsg::PlayerJoined(ref j)) if j.player_id == 0
        ));
    }

    #[test]
    fn vacated_for_unknown_room_is_ignored() {
        let (notice_tx, _notice_rx) = mpsc::unbounded_channel();
        let mut matchmaker = Matchmaker::new(config(), notice_tx);
        matchmaker.vacated(RoomId(99));
        assert!(matchmaker.summaries().is_empty());
    }
}
