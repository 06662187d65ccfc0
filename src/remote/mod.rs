//! The narrow contract the store needs from whatever persists appointments.

mod journal;
mod memory;

pub use journal::JournalRemote;
pub use memory::{MemoryRemote, Op};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// A row as the remote side stores it. Everything but the id is optional:
/// old rows carry only the legacy display fields, newer ones a timestamp,
/// most both.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RemoteRecord {
    pub id: Ulid,
    /// ISO-8601 start of the appointment.
    #[serde(default)]
    pub start_time: Option<String>,
    /// Legacy day field: a weekday name or `YYYY-MM-DD`.
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub time: Option<String>,
    #[serde(default)]
    pub period: Option<String>,
    #[serde(default)]
    pub client: Option<String>,
    #[serde(default)]
    pub service: Option<String>,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub status: Option<String>,
}

/// Create payload: the derived timestamp plus the legacy display fields,
/// so older readers of the same rows keep working.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewRecord {
    pub start_time: String,
    pub date: String,
    pub time: String,
    pub period: String,
    pub client: String,
    pub service: String,
    pub price: f64,
    pub status: String,
}

impl NewRecord {
    pub fn into_record(self, id: Ulid) -> RemoteRecord {
        RemoteRecord {
            id,
            start_time: Some(self.start_time),
            date: Some(self.date),
            time: Some(self.time),
            period: Some(self.period),
            client: Some(self.client),
            service: Some(self.service),
            price: Some(self.price),
            status: Some(self.status),
        }
    }
}

/// Partial update. `None` fields are left as they are.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordPatch {
    pub status: Option<String>,
    pub client: Option<String>,
}

impl RecordPatch {
    pub fn status(status: &str) -> Self {
        Self {
            status: Some(status.to_string()),
            ..Self::default()
        }
    }

    pub fn apply_to(&self, record: &mut RemoteRecord) {
        if let Some(ref s) = self.status {
            record.status = Some(s.clone());
        }
        if let Some(ref c) = self.client {
            record.client = Some(c.clone());
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    Transport(String),
    NotFound(Ulid),
    Io(String),
}

impl std::fmt::Display for RemoteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RemoteError::Transport(e) => write!(f, "transport error: {e}"),
            RemoteError::NotFound(id) => write!(f, "no remote record {id}"),
            RemoteError::Io(e) => write!(f, "storage error: {e}"),
        }
    }
}

impl std::error::Error for RemoteError {}

#[async_trait]
pub trait AppointmentRemote: Send + Sync {
    /// Every stored record, in no particular order.
    async fn list_appointments(&self) -> Result<Vec<RemoteRecord>, RemoteError>;

    async fn create_appointment(&self, fields: NewRecord) -> Result<RemoteRecord, RemoteError>;

    async fn update_appointment(&self, id: Ulid, patch: RecordPatch) -> Result<(), RemoteError>;

    async fn delete_appointment(&self, id: Ulid) -> Result<(), RemoteError>;
}
