use std::time::Duration;

use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use ulid::Ulid;

use super::{AppointmentRemote, NewRecord, RecordPatch, RemoteError, RemoteRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    List,
    Create,
    Update,
    Delete,
}

/// Remote kept in process memory. Supports injected failures and latency so
/// the store's revert paths can be driven deterministically.
#[derive(Default)]
pub struct MemoryRemote {
    records: DashMap<Ulid, RemoteRecord>,
    failing: DashSet<Op>,
    calls: DashMap<Op, usize>,
    latency: Option<Duration>,
}

impl MemoryRemote {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call sleeps this long before answering.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Store a record as-is, bypassing any shape checks.
    pub fn insert_raw(&self, record: RemoteRecord) {
        self.records.insert(record.id, record);
    }

    pub fn get(&self, id: &Ulid) -> Option<RemoteRecord> {
        self.records.get(id).map(|e| e.value().clone())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Make every subsequent call of `op` fail until [`Self::recover`].
    pub fn fail(&self, op: Op) {
        self.failing.insert(op);
    }

    pub fn recover(&self, op: Op) {
        self.failing.remove(&op);
    }

    pub fn call_count(&self, op: Op) -> usize {
        self.calls.get(&op).map(|e| *e.value()).unwrap_or(0)
    }

    async fn enter(&self, op: Op) -> Result<(), RemoteError> {
        *self.calls.entry(op).or_insert(0) += 1;
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        if self.failing.contains(&op) {
            return Err(RemoteError::Transport(format!("{op:?} unavailable")));
        }
        Ok(())
    }
}

#[async_trait]
impl AppointmentRemote for MemoryRemote {
    async fn list_appointments(&self) -> Result<Vec<RemoteRecord>, RemoteError> {
        self.enter(Op::List).await?;
        Ok(self.records.iter().map(|e| e.value().clone()).collect())
    }

    async fn create_appointment(&self, fields: NewRecord) -> Result<RemoteRecord, RemoteError> {
        self.enter(Op::Create).await?;
        let record = fields.into_record(Ulid::new());
        self.records.insert(record.id, record.clone());
        Ok(record)
    }

    async fn update_appointment(&self, id: Ulid, patch: RecordPatch) -> Result<(), RemoteError> {
        self.enter(Op::Update).await?;
        let mut entry = self.records.get_mut(&id).ok_or(RemoteError::NotFound(id))?;
        patch.apply_to(entry.value_mut());
        Ok(())
    }

    async fn delete_appointment(&self, id: Ulid) -> Result<(), RemoteError> {
        self.enter(Op::Delete).await?;
        self.records
            .remove(&id)
            .map(|_| ())
            .ok_or(RemoteError::NotFound(id))
    }
}
