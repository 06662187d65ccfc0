use std::sync::Arc;

use tokio::sync::{broadcast, watch};
use ulid::Ulid;

use crate::model::{Appointment, Status};

const CHANNEL_CAPACITY: usize = 256;

/// What the presentation layer renders: the sorted list and the loading flag.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub appointments: Arc<Vec<Appointment>>,
    pub loading: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    Loaded { count: usize },
    Booked { id: Ulid },
    StatusChanged { id: Ulid, status: Status },
    Deleted { id: Ulid },
    /// An optimistic change to `id` was rolled back.
    Reverted { id: Ulid },
}

/// Publishes store snapshots and change events.
pub struct NotifyHub {
    snapshot: watch::Sender<Snapshot>,
    changes: broadcast::Sender<Change>,
}

impl Default for NotifyHub {
    fn default() -> Self {
        Self::new()
    }
}

impl NotifyHub {
    pub fn new() -> Self {
        Self {
            snapshot: watch::Sender::new(Snapshot::default()),
            changes: broadcast::channel(CHANNEL_CAPACITY).0,
        }
    }

    /// Latest snapshot; a new subscriber sees it immediately.
    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.snapshot.subscribe()
    }

    pub fn changes(&self) -> broadcast::Receiver<Change> {
        self.changes.subscribe()
    }

    pub fn current(&self) -> Snapshot {
        self.snapshot.borrow().clone()
    }

    pub fn publish(&self, appointments: &[Appointment]) {
        let list = Arc::new(appointments.to_vec());
        self.snapshot.send_modify(|s| s.appointments = list);
    }

    pub fn set_loading(&self, loading: bool) {
        self.snapshot.send_if_modified(|s| {
            let changed = s.loading != loading;
            s.loading = loading;
            changed
        });
    }

    /// No-op if nobody is listening.
    pub fn send(&self, change: Change) {
        let _ = self.changes.send(change);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribe_and_receive_change() {
        let hub = NotifyHub::new();
        let mut rx = hub.changes();
        let id = Ulid::new();
        hub.send(Change::Deleted { id });
        assert_eq!(rx.recv().await.unwrap(), Change::Deleted { id });
    }

    #[test]
    fn send_without_subscribers_is_noop() {
        let hub = NotifyHub::new();
        hub.send(Change::Loaded { count: 0 });
    }

    #[tokio::test]
    async fn loading_flag_wakes_watchers() {
        let hub = NotifyHub::new();
        let mut rx = hub.subscribe();
        assert!(!rx.borrow_and_update().loading);

        hub.set_loading(true);
        rx.changed().await.unwrap();
        assert!(rx.borrow_and_update().loading);

        hub.set_loading(true);
        assert!(!rx.has_changed().unwrap());
    }
}
