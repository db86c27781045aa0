//! Notification service.
//!
//! Presentation hooks (sounds, toasts, input freeze) subscribe here. The
//! service owns its listeners; each subscriber owns the [`Subscription`]
//! handle it got back and releases it on teardown.

use std::fmt;

/// Something the presentation layer should react to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// A new roll started; play the roll sound
    DiceRolled { face: u8 },
    /// The local player may roll now
    LocalTurn,
    /// The game ended; freeze input
    GameOver,
    /// A new server message to surface
    Message(String),
}

/// Handle for a registered listener.
#[derive(Debug, PartialEq, Eq, Hash)]
#[must_use = "dropping the handle leaves the listener registered with no way to remove it"]
pub struct Subscription(u64);

impl Subscription {
    pub fn id(&self) -> u64 {
        self.0
    }
}

type Listener = Box<dyn FnMut(&Notice)>;

/// Listener registry.
#[derive(Default)]
pub struct Notifier {
    next_id: u64,
    listeners: Vec<(u64, Listener)>,
}

impl fmt::Debug for Notifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Notifier")
            .field("next_id", &self.next_id)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl Notifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener. Listeners run in subscription order.
    pub fn subscribe<F>(&mut self, listener: F) -> Subscription
    where
        F: FnMut(&Notice) + 'static,
    {
        self.next_id += 1;
        self.listeners.push((self.next_id, Box::new(listener)));
        Subscription(self.next_id)
    }

    /// Release a listener. Returns false if it was already gone.
    pub fn unsubscribe(&mut self, subscription: Subscription) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(id, _)| *id != subscription.0);
        self.listeners.len() != before
    }

    pub fn publish(&mut self, notice: &Notice) {
        for (_, listener) in &mut self.listeners {
            listener(notice);
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Drop every listener.
    pub fn clear(&mut self) {
        self.listeners.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_publish_in_order() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut notifier = Notifier::new();

        let first = seen.clone();
        let _a = notifier.subscribe(move |n| first.borrow_mut().push(("a", n.clone())));
        let second = seen.clone();
        let _b = notifier.subscribe(move |n| second.borrow_mut().push(("b", n.clone())));

        notifier.publish(&Notice::LocalTurn);

        assert_eq!(
            *seen.borrow(),
            vec![("a", Notice::LocalTurn), ("b", Notice::LocalTurn)]
        );
    }

    #[test]
    fn test_unsubscribe() {
        let count = Rc::new(RefCell::new(0));
        let mut notifier = Notifier::new();

        let counter = count.clone();
        let sub = notifier.subscribe(move |_| *counter.borrow_mut() += 1);
        notifier.publish(&Notice::GameOver);

        let id = sub.id();
        assert!(notifier.unsubscribe(sub));
        assert!(!notifier.unsubscribe(Subscription(id)));
        notifier.publish(&Notice::GameOver);

        assert_eq!(*count.borrow(), 1);
        assert_eq!(notifier.listener_count(), 0);
    }
}
