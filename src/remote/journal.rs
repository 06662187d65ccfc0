use std::io;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;
use ulid::Ulid;

use crate::observability::JOURNAL_FLUSH_BATCH_SIZE;
use crate::wal::{Journal, JournalEvent};

use super::{AppointmentRemote, NewRecord, RecordPatch, RemoteError, RemoteRecord};

type Records = Arc<DashMap<Ulid, RemoteRecord>>;

enum Request {
    Append(JournalEvent, oneshot::Sender<io::Result<()>>),
    Compact(oneshot::Sender<io::Result<()>>),
    AppendsSinceCompact(oneshot::Sender<u64>),
}

/// Sole owner of the journal file. Record state changes only here, after
/// the matching entry is durable, so a compaction always sees every
/// committed event.
struct Writer {
    journal: Journal,
    records: Records,
    rx: mpsc::Receiver<Request>,
}

impl Writer {
    async fn run(mut self) {
        let mut carried = None;
        loop {
            let request = match carried.take() {
                Some(request) => request,
                None => match self.rx.recv().await {
                    Some(request) => request,
                    None => break,
                },
            };
            match request {
                Request::Append(event, reply) => {
                    // Appends already queued share one fsync.
                    let mut batch = vec![(event, reply)];
                    while let Ok(next) = self.rx.try_recv() {
                        match next {
                            Request::Append(event, reply) => batch.push((event, reply)),
                            other => {
                                carried = Some(other);
                                break;
                            }
                        }
                    }
                    self.commit(batch);
                }
                Request::Compact(reply) => {
                    let live: Vec<JournalEvent> = self
                        .records
                        .iter()
                        .map(|entry| JournalEvent::Created(entry.value().clone()))
                        .collect();
                    let _ = reply.send(self.journal.compact(&live));
                }
                Request::AppendsSinceCompact(reply) => {
                    let _ = reply.send(self.journal.appends_since_compact());
                }
            }
        }
        debug!("journal writer stopped");
    }

    fn commit(&mut self, batch: Vec<(JournalEvent, oneshot::Sender<io::Result<()>>)>) {
        metrics::histogram!(JOURNAL_FLUSH_BATCH_SIZE).record(batch.len() as f64);
        let staged = batch
            .iter()
            .try_for_each(|(event, _)| self.journal.stage(event));
        // Commit even when staging failed so partial bytes don't ride along
        // with the next batch.
        let outcome = staged.and(self.journal.commit());
        for (event, reply) in batch {
            let result = match &outcome {
                Ok(()) => {
                    apply_event(&self.records, &event);
                    Ok(())
                }
                Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
            };
            let _ = reply.send(result);
        }
    }
}

fn apply_event(records: &DashMap<Ulid, RemoteRecord>, event: &JournalEvent) {
    match event {
        JournalEvent::Created(record) => {
            records.insert(record.id, record.clone());
        }
        JournalEvent::Updated { id, patch } => {
            if let Some(mut entry) = records.get_mut(id) {
                patch.apply_to(entry.value_mut());
            }
        }
        JournalEvent::Deleted { id } => {
            records.remove(id);
        }
    }
}

/// Remote collaborator persisted to a local journal file.
pub struct JournalRemote {
    records: Records,
    tx: mpsc::Sender<Request>,
}

impl JournalRemote {
    /// Replay the journal at `path` and start its writer task. Must be called
    /// inside a tokio runtime.
    pub fn open(path: &Path) -> io::Result<Self> {
        let (journal, events) = Journal::open(path)?;
        let records: Records = Arc::new(DashMap::new());
        for event in &events {
            apply_event(&records, event);
        }
        tracing::info!(
            "journal {} replayed: {} events, {} records",
            path.display(),
            events.len(),
            records.len()
        );

        let (tx, rx) = mpsc::channel(1024);
        let writer = Writer {
            journal,
            records: records.clone(),
            rx,
        };
        tokio::spawn(writer.run());
        Ok(Self { records, tx })
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> Request,
    ) -> Result<T, RemoteError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(make(reply))
            .await
            .map_err(|_| RemoteError::Io("journal writer shut down".into()))?;
        rx.await
            .map_err(|_| RemoteError::Io("journal writer dropped the request".into()))
    }

    async fn append(&self, event: JournalEvent) -> Result<(), RemoteError> {
        self.request(|reply| Request::Append(event, reply))
            .await?
            .map_err(|e| RemoteError::Io(e.to_string()))
    }

    /// Rewrite the journal as one `Created` entry per live record.
    pub async fn compact(&self) -> Result<(), RemoteError> {
        self.request(Request::Compact)
            .await?
            .map_err(|e| RemoteError::Io(e.to_string()))
    }

    pub async fn appends_since_compact(&self) -> u64 {
        self.request(Request::AppendsSinceCompact)
            .await
            .unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn require(&self, id: Ulid) -> Result<(), RemoteError> {
        if self.records.contains_key(&id) {
            Ok(())
        } else {
            Err(RemoteError::NotFound(id))
        }
    }
}

#[async_trait]
impl AppointmentRemote for JournalRemote {
    async fn list_appointments(&self) -> Result<Vec<RemoteRecord>, RemoteError> {
        Ok(self.records.iter().map(|e| e.value().clone()).collect())
    }

    async fn create_appointment(&self, fields: NewRecord) -> Result<RemoteRecord, RemoteError> {
        let record = fields.into_record(Ulid::new());
        self.append(JournalEvent::Created(record.clone())).await?;
        Ok(record)
    }

    async fn update_appointment(&self, id: Ulid, patch: RecordPatch) -> Result<(), RemoteError> {
        self.require(id)?;
        self.append(JournalEvent::Updated { id, patch }).await
    }

    async fn delete_appointment(&self, id: Ulid) -> Result<(), RemoteError> {
        self.require(id)?;
        self.append(JournalEvent::Deleted { id }).await
    }
}
