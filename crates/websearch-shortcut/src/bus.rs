use tokio::sync::broadcast;

use crate::shortcut::ShortcutEntry;

const DEFAULT_BUS_CAPACITY: usize = 64;

/// A committed registry mutation.
///
/// `before` is `None` for an add, `after` is `None` for a remove, and both
/// are set for an update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShortcutChange {
    pub before: Option<ShortcutEntry>,
    pub after: Option<ShortcutEntry>,
}

impl ShortcutChange {
    pub fn added(entry: ShortcutEntry) -> Self {
        Self {
            before: None,
            after: Some(entry),
        }
    }

    pub fn updated(before: ShortcutEntry, after: ShortcutEntry) -> Self {
        Self {
            before: Some(before),
            after: Some(after),
        }
    }

    pub fn removed(entry: ShortcutEntry) -> Self {
        Self {
            before: Some(entry),
            after: None,
        }
    }
}

/// Fan-out of [`ShortcutChange`] events.
///
/// Dropping a receiver unsubscribes it. A receiver that falls more than the
/// bus capacity behind observes `RecvError::Lagged` and should re-read the
/// registry snapshot.
#[derive(Clone)]
pub struct ShortcutBus {
    sender: broadcast::Sender<ShortcutChange>,
}

impl Default for ShortcutBus {
    fn default() -> Self {
        Self::new(DEFAULT_BUS_CAPACITY)
    }
}

impl ShortcutBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ShortcutChange> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Returns the number of receivers reached; zero when nobody listens.
    pub fn publish(&self, change: ShortcutChange) -> usize {
        self.sender.send(change).unwrap_or(0)
    }
}
