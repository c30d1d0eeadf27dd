//! Non-blocking inbox draining with per-action handlers.
//!
//! The owner of an [`Inbox`] calls [`Dispatcher::poll_and_dispatch`] once per
//! frame or tick. It never waits for the network, so a render loop or tick
//! loop keeps its cadence while the channel's receive task blocks on I/O.

use crate::channel::Inbox;
use crate::protocol::Message;
use log::debug;
use std::collections::HashMap;
use tokio::sync::mpsc::error::TryRecvError;

pub type Handler<C> = Box<dyn FnMut(&mut C, Message) + Send>;

/// What a single drain did.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DispatchReport {
    pub dispatched: usize,
    pub dropped: usize,
    /// The channel behind the inbox is gone and nothing is left to drain.
    pub disconnected: bool,
}

/// Routes messages to handlers by their `action` tag. Handlers receive a
/// mutable context `C` owned by the caller, usually its local game state.
pub struct Dispatcher<C> {
    handlers: HashMap<&'static str, Handler<C>>,
}

impl<C> Default for Dispatcher<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> Dispatcher<C> {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Registers `handler` for `action`, replacing any previous one.
    pub fn on<F>(&mut self, action: &'static str, handler: F) -> &mut Self
    where
        F: FnMut(&mut C, Message) + Send + 'static,
    {
        self.handlers.insert(action, Box::new(handler));
        self
    }

    pub fn handles(&self, action: &str) -> bool {
        self.handlers.contains_key(action)
    }

    /// Pops every queued message and hands each to its handler. Messages
    /// without a handler are dropped.
    pub fn poll_and_dispatch(&mut self, inbox: &mut Inbox, context: &mut C) -> DispatchReport {
        let mut report = DispatchReport::default();

        loop {
            match inbox.try_recv() {
                Ok(message) => match self.handlers.get_mut(message.action()) {
                    Some(handler) => {
                        handler(context, message);
                        report.dispatched += 1;
                    }
                    None => {
                        debug!("No handler for '{}', dropping", message.action());
                        report.dropped += 1;
                    }
                },
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    report.disconnected = true;
                    break;
                }
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Color;
    use tokio::sync::mpsc;

    #[derive(Default)]
    struct Seen {
        colors: Vec<Color>,
        readies: usize,
    }

    fn dispatcher() -> Dispatcher<Seen> {
        let mut dispatcher = Dispatcher::new();
        dispatcher
            .on("pick_color", |seen: &mut Seen, message| {
                if let Message::PickColor { color } = message {
                    seen.colors.push(color);
                }
            })
            .on("ready", |seen: &mut Seen, _| seen.readies += 1);
        dispatcher
    }

    #[test]
    fn test_dispatches_in_order() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        tx.send(Message::PickColor { color: Color::Red }).unwrap();
        tx.send(Message::Ready).unwrap();
        tx.send(Message::PickColor { color: Color::Blue }).unwrap();

        let mut seen = Seen::default();
        let report = dispatcher().poll_and_dispatch(&mut rx, &mut seen);

        assert_eq!(report.dispatched, 3);
        assert_eq!(report.dropped, 0);
        assert!(!report.disconnected);
        assert_eq!(seen.colors, vec![Color::Red, Color::Blue]);
        assert_eq!(seen.readies, 1);
    }

    #[test]
    fn test_unhandled_actions_are_dropped() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        tx.send(Message::PopBalloon { balloon_id: 1 }).unwrap();
        tx.send(Message::Unknown).unwrap();
        tx.send(Message::Ready).unwrap();

        let mut seen = Seen::default();
        let report = dispatcher().poll_and_dispatch(&mut rx, &mut seen);

        assert_eq!(report.dispatched, 1);
        assert_eq!(report.dropped, 2);
        assert_eq!(seen.readies, 1);
    }

    #[test]
    fn test_empty_inbox_returns_immediately() {
        let (_tx, mut rx) = mpsc::unbounded_channel();
        let mut seen = Seen::default();

        let report = dispatcher().poll_and_dispatch(&mut rx, &mut seen);

        assert_eq!(report, DispatchReport::default());
    }

    #[test]
    fn test_reports_disconnect_after_draining() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        tx.send(Message::Ready).unwrap();
        drop(tx);

        let mut seen = Seen::default();
        let report = dispatcher().poll_and_dispatch(&mut rx, &mut seen);

        assert_eq!(report.dispatched, 1);
        assert!(report.disconnected);
    }

    #[test]
    fn test_handler_replacement() {
        let mut dispatcher = dispatcher();
        dispatcher.on("ready", |seen: &mut Seen, _| seen.readies += 10);
        assert!(dispatcher.handles("ready"));
        assert!(!dispatcher.handles("game_end"));

        let (tx, mut rx) = mpsc::unbounded_channel();
        tx.send(Message::Ready).unwrap();

        let mut seen = Seen::default();
        dispatcher.poll_and_dispatch(&mut rx, &mut seen);
        assert_eq!(seen.readies, 10);
    }
}
