mod conflict;
mod error;
mod ingest;
mod mutations;
mod order;
mod queries;
#[cfg(test)]
mod tests;

pub use conflict::would_conflict;
pub use error::StoreError;
pub use ingest::{parse_record, parse_timestamp, InvalidRecord};
pub use mutations::anchor_date;
pub use order::{compare, sort_appointments};

use std::future::Future;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::{Local, NaiveDate};
use dashmap::{DashMap, DashSet};
use tokio::sync::{Mutex, RwLock};
use ulid::Ulid;

use crate::model::{Appointment, Slot, Status};
use crate::notify::NotifyHub;
use crate::observability::{APPOINTMENTS, MUTATIONS_TOTAL, REMOTE_DURATION_SECONDS};
use crate::remote::AppointmentRemote;

/// Source of "today" for anchoring weekday-only bookings.
pub type Clock = fn() -> NaiveDate;

pub fn local_today() -> NaiveDate {
    Local::now().date_naive()
}

/// Marks a key as having a remote call outstanding; released on drop.
pub(super) struct InFlight<'a, K: Eq + Hash> {
    set: &'a DashSet<K>,
    key: K,
}

impl<'a, K: Eq + Hash + Clone> InFlight<'a, K> {
    /// `None` if the key is already claimed.
    pub(super) fn claim(set: &'a DashSet<K>, key: K) -> Option<Self> {
        set.insert(key.clone()).then_some(Self { set, key })
    }
}

impl<K: Eq + Hash> Drop for InFlight<'_, K> {
    fn drop(&mut self) {
        self.set.remove(&self.key);
    }
}

/// What an optimistic mutation did to one row locally.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(super) enum Intent {
    Status(Status),
    Removed,
}

/// An optimistic change a reload must not undo. `settled_at` is the sequence
/// number taken once the remote confirmed it; a fetch started after that
/// already reflects the change.
#[derive(Debug, Clone, Copy)]
pub(super) struct Pending {
    pub(super) intent: Intent,
    pub(super) settled_at: Option<u64>,
}

/// Owns the canonical, always-sorted appointment list.
///
/// Mutations apply locally first, then call the remote; a remote failure
/// undoes exactly what was applied. The list lock is never held across a
/// remote call, and each id has at most one remote call outstanding.
pub struct AppointmentStore {
    remote: Arc<dyn AppointmentRemote>,
    pub(super) list: RwLock<Vec<Appointment>>,
    pub(super) in_flight: DashSet<Ulid>,
    pub(super) pending: DashMap<Ulid, Pending>,
    pub(super) seq: AtomicU64,
    pub(super) slots_in_flight: DashSet<Slot>,
    pub(super) loads_in_flight: AtomicUsize,
    /// Held for a whole load so an older fetch never replaces a newer one.
    pub(super) load_lock: Mutex<()>,
    pub notify: Arc<NotifyHub>,
    pub(super) clock: Clock,
}

impl AppointmentStore {
    pub fn new(remote: Arc<dyn AppointmentRemote>, notify: Arc<NotifyHub>) -> Self {
        Self {
            remote,
            list: RwLock::new(Vec::new()),
            in_flight: DashSet::new(),
            pending: DashMap::new(),
            seq: AtomicU64::new(0),
            slots_in_flight: DashSet::new(),
            loads_in_flight: AtomicUsize::new(0),
            load_lock: Mutex::new(()),
            notify,
            clock: local_today,
        }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn today(&self) -> NaiveDate {
        (self.clock)()
    }

    pub(super) fn remote(&self) -> &dyn AppointmentRemote {
        self.remote.as_ref()
    }

    pub(super) fn next_seq(&self) -> u64 {
        self.seq.fetch_add(1, Ordering::SeqCst)
    }

    /// Record an optimistic change. Caller holds the write lock.
    pub(super) fn hold(&self, id: Ulid, intent: Intent) {
        self.pending.insert(id, Pending { intent, settled_at: None });
    }

    /// The remote confirmed `id`; later fetches will show it.
    pub(super) fn settle(&self, id: Ulid) {
        let at = self.next_seq();
        if let Some(mut entry) = self.pending.get_mut(&id) {
            entry.settled_at = Some(at);
        }
    }

    /// Re-apply optimistic changes a fetch started at `fetched_at` may not
    /// contain, and forget the ones it already does. Caller holds the write
    /// lock.
    pub(super) fn overlay_pending(&self, list: &mut Vec<Appointment>, fetched_at: u64) {
        self.pending.retain(|id, pending| {
            if pending.settled_at.is_some_and(|at| at < fetched_at) {
                return false;
            }
            match pending.intent {
                Intent::Removed => list.retain(|a| a.id != *id),
                Intent::Status(status) => {
                    if let Some(a) = list.iter_mut().find(|a| a.id == *id) {
                        a.status = status;
                    }
                }
            }
            true
        });
    }

    /// Push the list to subscribers. Caller holds the write lock.
    pub(super) fn publish(&self, list: &[Appointment]) {
        self.notify.publish(list);
        metrics::gauge!(APPOINTMENTS).set(list.len() as f64);
    }
}

/// Await a remote call, recording its latency.
pub(super) async fn timed<T>(op: &'static str, call: impl Future<Output = T>) -> T {
    let start = Instant::now();
    let out = call.await;
    metrics::histogram!(REMOTE_DURATION_SECONDS, "op" => op).record(start.elapsed().as_secs_f64());
    out
}

pub(super) fn count_mutation(op: &'static str, ok: bool) {
    let status = if ok { "ok" } else { "error" };
    metrics::counter!(MUTATIONS_TOTAL, "op" => op, "status" => status).increment(1);
}
