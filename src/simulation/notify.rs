//! Simulator notifications
//!
//! Subscribers get their own unbounded channel. Sending never blocks the
//! simulation, and each subscriber sees notifications in emission order.

use crossbeam_channel::{unbounded, Receiver, Sender};
use log::debug;

use super::types::Tick;

/// State changes a subscriber is told about
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// First message on every new subscription
    Registered,
    Reset,
    NewEvent,
    /// A tick completed; `time` is the new current time
    Advanced { time: Tick },
    Error(String),
}

#[derive(Debug, Default)]
pub struct Subscribers {
    senders: Vec<Sender<Notification>>,
}

impl Subscribers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self) -> Receiver<Notification> {
        let (tx, rx) = unbounded();
        // Cannot fail, the receiver is still alive
        let _ = tx.send(Notification::Registered);
        self.senders.push(tx);
        rx
    }

    /// Delivers to every subscriber in subscription order and forgets the
    /// ones that dropped their receiver
    pub fn notify(&mut self, notification: Notification) {
        let before = self.senders.len();
        self.senders
            .retain(|tx| tx.send(notification.clone()).is_ok());
        if self.senders.len() < before {
            debug!("Dropped {} disconnected subscribers", before - self.senders.len());
        }
    }

    pub fn len(&self) -> usize {
        self.senders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.senders.is_empty()
    }
}
