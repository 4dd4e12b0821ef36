//! In-memory channel.
//!
//! Outbound messages queue in a shared outbox that the simulation drains into
//! the coordinator. Closing the channel makes later sends fail, which the
//! engine turns into a lost session.

use std::{cell::RefCell, collections::VecDeque, rc::Rc};

use bingo_core::{Channel, ChannelError};
use bingo_proto::Message;

#[derive(Debug, Default)]
struct Outbox {
    queue: VecDeque<Message>,
    closed: bool,
}

/// Engine-side handle: the engine sends through this.
#[derive(Debug, Clone, Default)]
pub struct SimChannel {
    outbox: Rc<RefCell<Outbox>>,
}

impl SimChannel {
    /// Create an open channel with an empty outbox.
    pub fn new() -> Self {
        Self::default()
    }

    /// Take every queued message, oldest first.
    pub fn drain(&self) -> Vec<Message> {
        self.outbox.borrow_mut().queue.drain(..).collect()
    }

    /// Number of queued messages.
    pub fn pending(&self) -> usize {
        self.outbox.borrow().queue.len()
    }

    /// Close the channel and discard anything still queued.
    pub fn close(&self) {
        let mut outbox = self.outbox.borrow_mut();
        outbox.closed = true;
        outbox.queue.clear();
    }

    /// Whether the channel has been closed.
    pub fn is_closed(&self) -> bool {
        self.outbox.borrow().closed
    }
}

impl Channel for SimChannel {
    fn send(&mut self, message: &Message) -> Result<(), ChannelError> {
        let mut outbox = self.outbox.borrow_mut();
        if outbox.closed {
            return Err(ChannelError::Closed);
        }
        outbox.queue.push_back(message.clone());
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn win() -> Message {
        Message::Win { participant: "alice".into(), session: "s".into() }
    }

    #[test]
    fn send_then_drain_preserves_order() {
        let mut channel = SimChannel::new();
        let handle = channel.clone();
        let ready = Message::Ready { participant: "alice".into(), session: "s".into() };

        channel.send(&ready).unwrap();
        channel.send(&win()).unwrap();

        assert_eq!(handle.pending(), 2);
        assert_eq!(handle.drain(), vec![ready, win()]);
        assert_eq!(handle.pending(), 0);
    }

    #[test]
    fn closed_channel_rejects_sends() {
        let mut channel = SimChannel::new();
        channel.clone().close();

        assert_eq!(channel.send(&win()), Err(ChannelError::Closed));
        assert!(channel.is_closed());
    }
}
