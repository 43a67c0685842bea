use crate::broadcast::{Broadcaster, Member};
use crate::config::GameConfig;
use crate::error::JoinError;
use crate::physics::{self, Ball, Paddle, ServeDirection, Side};
use pong_shared::protocol::{
    BallWire, GameEndedMsg, GameStateMsg, PaddleWire, PaddlesWire, PlayerDisconnectedMsg,
    PlayerJoinedMsg, ServerMsg,
};
use std::fmt;

/// Players per room.
pub const SLOTS: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RoomId(pub u64);

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "room-{}", self.0)
    }
}

/// Identifies one live socket for as long as it stays open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Fewer than two players; not ticking
    Waiting,
    Playing,
    /// Someone reached the winning score; not ticking until reset
    Ended,
}

#[derive(Debug, Clone)]
pub struct Player {
    pub connection: ConnectionId,
    pub name: String,
}

/// One match: two seats, a ball, two paddles and the lifecycle around them.
///
/// The room is authoritative over everything it simulates. Every mutation
/// that clients can observe is followed by a full snapshot broadcast.
pub struct Room {
    pub id: RoomId,
    config: GameConfig,
    players: [Option<Player>; SLOTS],
    ball: Ball,
    paddles: [Paddle; SLOTS],
    phase: Phase,
    winner: Option<String>,
    serve: Box<dyn ServeDirection>,
    members: Broadcaster<SLOTS>,
}

impl Room {
    pub fn new(id: RoomId, config: GameConfig, mut serve: Box<dyn ServeDirection>) -> Self {
        let ball = physics::serve(&config, serve.as_mut());
        Self {
            id,
            config,
            players: [None, None],
            ball,
            paddles: [Paddle::centered(&config); SLOTS],
            phase: Phase::Waiting,
            winner: None,
            serve,
            members: Broadcaster::new(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Whether the room wants clock ticks.
    pub fn is_ticking(&self) -> bool {
        self.phase == Phase::Playing
    }

    pub fn player_count(&self) -> usize {
        self.players.iter().flatten().count()
    }

    pub fn has_free_slot(&self) -> bool {
        self.player_count() < SLOTS
    }

    pub fn slot_of(&self, connection: ConnectionId) -> Option<usize> {
        self.players
            .iter()
            .position(|p| p.as_ref().is_some_and(|p| p.connection == connection))
    }

    /// Names of seated players in slot order.
    pub fn player_names(&self) -> Vec<String> {
        self.players.iter().flatten().map(|p| p.name.clone()).collect()
    }

    pub fn winner(&self) -> Option<&str> {
        self.winner.as_deref()
    }

    pub fn ball(&self) -> Ball {
        self.ball
    }

    pub fn paddles(&self) -> [Paddle; SLOTS] {
        self.paddles
    }

    /// Seat a player in the lowest free slot.
    ///
    /// The joiner gets `player-joined`; everyone gets a snapshot, preceded by
    /// `game-started` when this join fills the room. A full room rejects the
    /// join without touching its membership.
    pub fn add_player(
        &mut self,
        connection: ConnectionId,
        name: String,
        member: Box<dyn Member>,
    ) -> Result<usize, JoinError> {
        let slot = self
            .players
            .iter()
            .position(Option::is_none)
            .ok_or(JoinError::RoomFull)?;

        self.players[slot] = Some(Player { connection, name });
        self.members.attach(slot, member);
        debug_assert_eq!(self.members.len(), self.player_count());
        self.members.send_to(
            slot,
            &ServerMsg::PlayerJoined(PlayerJoinedMsg {
                player_id: slot as u32,
                players: self.player_names(),
            }),
        );

        if self.player_count() == SLOTS && self.phase == Phase::Waiting {
            self.phase = Phase::Playing;
            self.members.broadcast(&ServerMsg::GameStarted);
            tracing::info!("{} started", self.id);
        }
        self.broadcast_snapshot();
        Ok(slot)
    }

    /// Unseat `connection`. Returns the number of players left, or `None`
    /// if the connection was not in this room.
    ///
    /// The match is abandoned: scores and ball reset and the room waits for
    /// a new opponent. The remaining player is not awarded the win.
    pub fn remove_player(&mut self, connection: ConnectionId) -> Option<usize> {
        let slot = self.slot_of(connection)?;
        self.players[slot] = None;
        self.members.detach(slot);
        debug_assert_eq!(self.members.is_empty(), self.player_count() == 0);

        self.reset_match();
        self.phase = Phase::Waiting;

        self.members
            .broadcast(&ServerMsg::PlayerDisconnected(PlayerDisconnectedMsg {
                players: self.player_names(),
            }));
        self.broadcast_snapshot();
        Some(self.player_count())
    }

    /// Move `slot`'s paddle. Ignored unless the match is in play and the
    /// input is well formed.
    pub fn apply_paddle_input(&mut self, slot: usize, y: f64) -> bool {
        if self.phase != Phase::Playing || slot >= SLOTS || !y.is_finite() {
            return false;
        }
        self.paddles[slot].set_y(y, &self.config);
        true
    }

    /// Advance one fixed step. Does nothing outside `Playing`.
    pub fn tick(&mut self) {
        if self.phase != Phase::Playing {
            return;
        }

        let scored = physics::step(&mut self.ball, &self.paddles, &self.config);
        let ended = scored.is_some_and(|side| self.score(side));

        self.broadcast_snapshot();
        if ended {
            let winner = self.winner.clone().unwrap_or_default();
            self.members
                .broadcast(&ServerMsg::GameEnded(GameEndedMsg { winner }));
        }
    }

    /// Credit `side` with a point and serve. Returns true if that won the match.
    fn score(&mut self, side: Side) -> bool {
        let slot = side.slot();
        self.paddles[slot].score += 1;
        self.ball = physics::serve(&self.config, self.serve.as_mut());

        if self.paddles[slot].score >= self.config.winning_score {
            self.phase = Phase::Ended;
            self.winner = self.players[slot].as_ref().map(|p| p.name.clone());
            tracing::info!(
                "{} ended, winner {}",
                self.id,
                self.winner.as_deref().unwrap_or("?")
            );
            return true;
        }
        false
    }

    /// Start a new match after one has ended. Returns false (and changes
    /// nothing) in any other phase.
    pub fn reset(&mut self) -> bool {
        if self.phase != Phase::Ended {
            return false;
        }
        self.reset_match();
        if self.player_count() == SLOTS {
            self.phase = Phase::Playing;
            self.members.broadcast(&ServerMsg::GameStarted);
        } else {
            self.phase = Phase::Waiting;
        }
        self.broadcast_snapshot();
        true
    }

    fn reset_match(&mut self) {
        self.paddles = [Paddle::centered(&self.config); SLOTS];
        self.ball = physics::serve(&self.config, self.serve.as_mut());
        self.winner = None;
    }

    pub fn snapshot(&self) -> GameStateMsg {
        let paddle = |slot: usize| PaddleWire {
            y: self.paddles[slot].y,
            score: self.paddles[slot].score,
        };
        GameStateMsg {
            ball: BallWire {
                x: self.ball.x,
                y: self.ball.y,
                dx: self.ball.dx,
                dy: self.ball.dy,
            },
            paddles: PaddlesWire {
                player1: paddle(0),
                player2: paddle(1),
            },
            game_started: self.phase == Phase::Playing,
            game_ended: self.phase == Phase::Ended,
            winner: self.winner.clone(),
            players: self.player_names(),
        }
    }

    fn broadcast_snapshot(&self) {
        self.members.broadcast(&ServerMsg::GameState(self.snapshot()));
    }
}
