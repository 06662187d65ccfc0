use std::sync::atomic::Ordering;

use tokio::sync::{broadcast, watch};
use ulid::Ulid;

use crate::model::{Appointment, DateKey};
use crate::notify::{Change, Snapshot};

use super::AppointmentStore;

impl AppointmentStore {
    /// The current list, already in chronological order.
    pub async fn appointments(&self) -> Vec<Appointment> {
        self.list.read().await.clone()
    }

    pub async fn get(&self, id: Ulid) -> Option<Appointment> {
        self.list.read().await.iter().find(|a| a.id == id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.list.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.list.read().await.is_empty()
    }

    /// Appointments whose date key equals `key`, in list order.
    pub async fn by_date_key(&self, key: &DateKey) -> Vec<Appointment> {
        self.list
            .read()
            .await
            .iter()
            .filter(|a| &a.date_key() == key)
            .cloned()
            .collect()
    }

    /// The first pending appointment in chronological order.
    pub async fn next_pending(&self) -> Option<Appointment> {
        self.list
            .read()
            .await
            .iter()
            .find(|a| !a.is_completed())
            .cloned()
    }

    pub fn is_loading(&self) -> bool {
        self.loads_in_flight.load(Ordering::SeqCst) > 0
    }

    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.notify.subscribe()
    }

    pub fn changes(&self) -> broadcast::Receiver<Change> {
        self.notify.changes()
    }
}
