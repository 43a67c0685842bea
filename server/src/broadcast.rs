//! Fan-out of room events to the connections seated in that room.

use pong_shared::protocol::ServerMsg;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

/// Anything that can receive server messages on behalf of one player.
///
/// Delivery never blocks: an implementation drops the message and returns
/// false when the connection is gone or cannot keep up.
pub trait Member: Send {
    fn deliver(&self, msg: &ServerMsg) -> bool;
}

impl Member for mpsc::Sender<ServerMsg> {
    fn deliver(&self, msg: &ServerMsg) -> bool {
        match self.try_send(msg.clone()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                tracing::debug!("Outbound queue full, dropping message");
                false
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }
}

/// Members of one room, indexed by slot.
pub struct Broadcaster<const N: usize> {
    members: [Option<Box<dyn Member>>; N],
}

impl<const N: usize> Default for Broadcaster<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> Broadcaster<N> {
    pub fn new() -> Self {
        Self {
            members: std::array::from_fn(|_| None),
        }
    }

    /// Seat `member` in `slot`, replacing whoever was there.
    pub fn attach(&mut self, slot: usize, member: Box<dyn Member>) {
        if let Some(entry) = self.members.get_mut(slot) {
            *entry = Some(member);
        }
    }

    pub fn detach(&mut self, slot: usize) -> Option<Box<dyn Member>> {
        self.members.get_mut(slot).and_then(Option::take)
    }

    /// Deliver to a single slot. Empty or stale slots are skipped.
    pub fn send_to(&self, slot: usize, msg: &ServerMsg) {
        if let Some(Some(member)) = self.members.get(slot) {
            member.deliver(msg);
        }
    }

    /// Deliver to every seated member; returns how many accepted it.
    pub fn broadcast(&self, msg: &ServerMsg) -> usize {
        self.members
            .iter()
            .flatten()
            .filter(|member| member.deliver(msg))
            .count()
    }

    pub fn len(&self) -> usize {
        self.members.iter().flatten().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
