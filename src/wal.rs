//! Append-only journal of remote record changes.
//!
//! Each entry is `[u32 le: len][bincode: JournalEvent][u32 le: crc32 of payload]`.
//! A crash can leave a partial entry at the end; opening the journal reads up
//! to the last intact entry and cuts the rest off, so later appends are never
//! stranded behind garbage.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;
use ulid::Ulid;

use crate::limits::MAX_JOURNAL_ENTRY;
use crate::remote::{RecordPatch, RemoteRecord};

const HEADER_LEN: u64 = 4;
const TRAILER_LEN: u64 = 4;

/// One journal entry. Replaying them in order rebuilds the record set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum JournalEvent {
    Created(RemoteRecord),
    Updated { id: Ulid, patch: RecordPatch },
    Deleted { id: Ulid },
}

fn write_entry(out: &mut impl Write, event: &JournalEvent) -> io::Result<()> {
    let payload =
        bincode::serialize(event).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    if payload.len() > MAX_JOURNAL_ENTRY {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("journal entry of {} bytes is too large", payload.len()),
        ));
    }
    out.write_all(&(payload.len() as u32).to_le_bytes())?;
    out.write_all(&payload)?;
    out.write_all(&crc32fast::hash(&payload).to_le_bytes())
}

/// `Ok(false)` when the input ends before `buf` is full.
fn fill(input: &mut impl Read, buf: &mut [u8]) -> io::Result<bool> {
    match input.read_exact(buf) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(false),
        Err(e) => Err(e),
    }
}

/// Next intact entry with its size on disk, or `None` at the end of the
/// intact prefix.
fn read_entry(input: &mut impl Read) -> io::Result<Option<(JournalEvent, u64)>> {
    let mut word = [0u8; 4];
    if !fill(input, &mut word)? {
        return Ok(None);
    }
    let len = u32::from_le_bytes(word) as usize;
    if len > MAX_JOURNAL_ENTRY {
        return Ok(None);
    }
    let mut payload = vec![0u8; len];
    if !fill(input, &mut payload)? || !fill(input, &mut word)? {
        return Ok(None);
    }
    if u32::from_le_bytes(word) != crc32fast::hash(&payload) {
        return Ok(None);
    }
    Ok(bincode::deserialize(&payload)
        .ok()
        .map(|event| (event, HEADER_LEN + len as u64 + TRAILER_LEN)))
}

/// What a read of the journal file found.
#[derive(Debug, Default)]
pub struct Scan {
    pub events: Vec<JournalEvent>,
    /// Bytes covered by `events`.
    pub intact_len: u64,
    pub file_len: u64,
}

impl Scan {
    pub fn torn_bytes(&self) -> u64 {
        self.file_len - self.intact_len
    }
}

/// Read every intact entry of the journal at `path`. A missing file is empty.
pub fn scan(path: &Path) -> io::Result<Scan> {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Scan::default()),
        Err(e) => return Err(e),
    };
    let file_len = file.metadata()?.len();
    let mut input = BufReader::new(file);
    let mut scan = Scan {
        file_len,
        ..Scan::default()
    };
    while let Some((event, size)) = read_entry(&mut input)? {
        scan.events.push(event);
        scan.intact_len += size;
    }
    Ok(scan)
}

/// Writable handle on the journal file.
pub struct Journal {
    out: BufWriter<File>,
    path: PathBuf,
    appends_since_compact: u64,
}

impl Journal {
    /// Replay the journal, drop any torn tail, and open it for appending.
    pub fn open(path: &Path) -> io::Result<(Self, Vec<JournalEvent>)> {
        let scan = scan(path)?;
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        if scan.torn_bytes() > 0 {
            warn!(
                "journal {}: discarding {} bytes after the last intact entry",
                path.display(),
                scan.torn_bytes()
            );
            file.set_len(scan.intact_len)?;
            file.sync_all()?;
        }
        let journal = Self {
            out: BufWriter::new(file),
            path: path.to_path_buf(),
            appends_since_compact: 0,
        };
        Ok((journal, scan.events))
    }

    /// Buffer an event. Nothing is durable until [`Self::commit`].
    pub fn stage(&mut self, event: &JournalEvent) -> io::Result<()> {
        write_entry(&mut self.out, event)?;
        self.appends_since_compact += 1;
        Ok(())
    }

    /// Flush staged entries and fsync.
    pub fn commit(&mut self) -> io::Result<()> {
        self.out.flush()?;
        self.out.get_ref().sync_all()
    }

    pub fn appends_since_compact(&self) -> u64 {
        self.appends_since_compact
    }

    fn snapshot_path(&self) -> PathBuf {
        self.path.with_extension("journal.compact")
    }

    /// Replace the journal with exactly `events`: write and fsync a sibling
    /// file, then rename it over the journal.
    pub fn compact(&mut self, events: &[JournalEvent]) -> io::Result<()> {
        self.commit()?;
        let snapshot = self.snapshot_path();
        {
            let mut out = BufWriter::new(File::create(&snapshot)?);
            for event in events {
                write_entry(&mut out, event)?;
            }
            out.flush()?;
            out.get_ref().sync_all()?;
        }
        fs::rename(&snapshot, &self.path)?;
        let file = OpenOptions::new().append(true).open(&self.path)?;
        self.out = BufWriter::new(file);
        self.appends_since_compact = 0;
        Ok(())
    }
}
