//! FIFO event queue shared by the session and its collaborators.

use crate::domain::Event;
use std::collections::VecDeque;

/// Single-threaded FIFO of pending events.
///
/// Producers push to the back; the session pops from the front. Popping an
/// empty queue returns `None` and never blocks.
#[derive(Debug, Default)]
pub struct EventQueue {
    events: VecDeque<Event>,
    pushed: u64,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: impl Into<Event>) {
        self.events.push_back(event.into());
        self.pushed += 1;
    }

    pub fn pop_nonblocking(&mut self) -> Option<Event> {
        self.events.pop_front()
    }

    pub fn peek(&self) -> Option<&Event> {
        self.events.front()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Number of events ever pushed.
    pub fn total_pushed(&self) -> u64 {
        self.pushed
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Action, SignalEvent};

    #[test]
    fn fifo_order() {
        let mut q = EventQueue::new();
        q.push(SignalEvent::new("A", Action::Buy));
        q.push(SignalEvent::new("B", Action::Sell));
        assert_eq!(q.len(), 2);
        assert_eq!(q.peek().map(|e| e.symbol()), Some("A"));
        assert_eq!(q.pop_nonblocking().unwrap().symbol(), "A");
        assert_eq!(q.pop_nonblocking().unwrap().symbol(), "B");
        assert!(q.pop_nonblocking().is_none());
        assert_eq!(q.total_pushed(), 2);
    }

    #[test]
    fn empty_pop_returns_none() {
        let mut q = EventQueue::new();
        assert!(q.is_empty());
        assert!(q.pop_nonblocking().is_none());
    }
}
