//! Durable replicated-log storage and entry cache for a Raft state machine.
//!
//! [`RaftLog`] is the façade: it binds a [`LogFile`] (the framed on-disk
//! record stream), a [`LogIndex`] (physical-slot → file-offset map, mirrored
//! into a `.idx` sidecar), and an [`EntryCache`] (a ring buffer of recent
//! entries keyed by logical Raft index) into the single entry point the
//! Raft consensus module drives: append entries, read them back by index,
//! truncate from either end, and persist the current term and vote.
//!
//! This crate owns only the log itself. Consensus, RPC transport, snapshot
//! creation, and command application all live above it and are out of
//! scope here.

mod cache;
mod entry;
mod error;
mod index;
mod log_file;
mod observer;
mod record;
mod recovery;

#[cfg(test)]
mod tests;

pub use cache::{EntryCache, DEFAULT_CAPACITY};
pub use entry::{Entry, EntryRef, EntryType};
pub use error::{Error, Result};
pub use observer::{NullObserver, RaftLogObserver};
pub use recovery::NO_VOTE;

use index::LogIndex;
use log_file::LogFile;
use record::{OP_ENTRY, OP_VOTE};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Configuration for creating a new replicated log.
///
/// # Example
/// ```no_run
/// use raftlog::RaftLogConfig;
/// use std::path::PathBuf;
///
/// let config = RaftLogConfig::builder()
///     .path(PathBuf::from("node1.raftlog"))
///     .dbid("0123456789abcdef0123456789abcdef")
///     .node_id(1)
///     .build();
/// ```
#[derive(Clone, Debug, bon::Builder)]
pub struct RaftLogConfig {
    /// Path to the log file. The sidecar index lives alongside it at
    /// `path` + `.idx`.
    pub path: PathBuf,
    /// Identifier shared by every log file belonging to the same dataset;
    /// `Open` of a foreign file fails rather than silently mixing logs.
    #[builder(into)]
    pub dbid: String,
    /// Identifier of the node this log belongs to, recorded in the header
    /// for operator inspection.
    #[builder(default = 0)]
    pub node_id: u32,
    /// Index of the last entry covered by the initial snapshot, if the log
    /// is being created to continue an already-snapshotted dataset.
    #[builder(default = 0)]
    pub snapshot_base_index: u64,
    /// Term of `snapshot_base_index`.
    #[builder(default = 0)]
    pub snapshot_base_term: u64,
    /// Initial entry cache capacity, rounded up to a power of two.
    #[builder(default = DEFAULT_CAPACITY)]
    pub cache_capacity: usize,
}

/// A durable, append-mostly Raft log backed by a single file.
///
/// Not `Sync` or `Send`-safe by design: the concurrency model is
/// single-threaded cooperative, owned exclusively by the caller's event
/// loop. Wrap in a mutex externally if multiple threads must share one.
#[derive(Debug)]
pub struct RaftLog {
    log_file: LogFile,
    index: LogIndex,
    cache: EntryCache,
    dbid: String,
    node_id: u32,
    snapshot_base_index: u64,
    snapshot_base_term: u64,
    count: u64,
    current_term: u64,
    vote: i32,
    /// Term of the most recently appended entry, or `snapshot_base_term`
    /// when the log holds no entries. Tracked separately from
    /// `current_term` (the persisted vote-term) since they diverge
    /// whenever a leader logs entries for a term it has not yet voted in.
    last_entry_term: u64,
}

impl RaftLog {
    /// Creates a brand-new log file and writes its header.
    ///
    /// Fails with [`Error::Io`] if a non-empty file already exists at
    /// `config.path`.
    pub fn create(config: RaftLogConfig) -> Result<Self> {
        let mut log_file = LogFile::create(&config.path)?;
        let header = recovery::Header {
            version: recovery::HEADER_VERSION,
            dbid: config.dbid.clone(),
            node_id: config.node_id,
            snapshot_base_index: config.snapshot_base_index,
            snapshot_base_term: config.snapshot_base_term,
        };
        recovery::write_header(&mut log_file, &header)?;
        log_file.sync_all()?;

        let mut index = LogIndex::create(&config.path)?;
        index.rebuild_sidecar()?;

        Ok(Self {
            log_file,
            index,
            cache: EntryCache::new(config.cache_capacity),
            dbid: config.dbid,
            node_id: config.node_id,
            snapshot_base_index: config.snapshot_base_index,
            snapshot_base_term: config.snapshot_base_term,
            count: 0,
            current_term: config.snapshot_base_term,
            vote: NO_VOTE,
            last_entry_term: config.snapshot_base_term,
        })
    }

    /// Opens an existing log file, running Recovery to rebuild the index
    /// (and its sidecar, if missing or stale) and to discard any
    /// crash-truncated trailing record.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_capacity(path, DEFAULT_CAPACITY)
    }

    /// Like [`RaftLog::open`] but with an explicit entry cache capacity.
    pub fn open_with_capacity(path: impl AsRef<Path>, cache_capacity: usize) -> Result<Self> {
        let path = path.as_ref();
        let mut log_file = LogFile::open(path)?;
        let recovered = recovery::recover(&mut log_file)?;

        let mut index = LogIndex::open(path)?;
        let on_disk = index.read_sidecar()?;
        index.set_offsets(recovered.offsets.clone());
        if !index::sidecar_matches(&on_disk, &recovered.offsets) {
            index.rebuild_sidecar()?;
        }

        let mut cache = EntryCache::new(cache_capacity);
        let warm_start = recovered.entries.len().saturating_sub(cache.capacity());
        for (idx, entry) in &recovered.entries[warm_start..] {
            cache.append(*idx, entry.clone())?;
        }

        let count = recovered.offsets.len() as u64;

        Ok(Self {
            log_file,
            index,
            cache,
            dbid: recovered.header.dbid,
            node_id: recovered.header.node_id,
            snapshot_base_index: recovered.header.snapshot_base_index,
            snapshot_base_term: recovered.header.snapshot_base_term,
            count,
            current_term: recovered.current_term,
            vote: recovered.vote,
            last_entry_term: recovered.last_entry_term,
        })
    }

    pub fn dbid(&self) -> &str {
        &self.dbid
    }

    pub fn node_id(&self) -> u32 {
        self.node_id
    }

    pub fn current_term(&self) -> u64 {
        self.current_term
    }

    pub fn vote(&self) -> i32 {
        self.vote
    }

    /// Number of entries currently stored.
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Logical index of the oldest retrievable entry. Only meaningful when
    /// `count() > 0`.
    pub fn first_index(&self) -> u64 {
        self.snapshot_base_index + 1
    }

    /// Logical index of the newest entry, or `snapshot_base_index` when
    /// empty.
    pub fn last_index(&self) -> u64 {
        self.snapshot_base_index + self.count
    }

    /// Appends `entry`, returning its new logical index.
    ///
    /// Enforces term monotonicity (I3): an entry whose term is lower than
    /// the previous entry's term is rejected with
    /// [`Error::InvariantViolation`] and the log is left unchanged.
    pub fn append(&mut self, entry: Entry) -> Result<u64> {
        if entry.term < self.last_entry_term {
            return Err(Error::InvariantViolation(format!(
                "append term {} below last entry term {}",
                entry.term, self.last_entry_term
            )));
        }
        let term = entry.term.to_string();
        let id = entry.id.to_string();
        let entry_type: u8 = entry.entry_type.into();
        let entry_type = entry_type.to_string();
        let offset = self.log_file.append_record(&[
            OP_ENTRY,
            term.as_bytes(),
            id.as_bytes(),
            entry_type.as_bytes(),
            &entry.payload,
        ])?;

        self.index.push(offset)?;
        self.count += 1;
        self.last_entry_term = entry.term;
        let index = self.snapshot_base_index + self.count;
        self.cache.append(index, Arc::new(entry))?;
        Ok(index)
    }

    /// Returns the entry at `index`, or `None` if it falls outside the
    /// currently retrievable window `(snapshot_base_index,
    /// snapshot_base_index + count]`.
    ///
    /// An `Err` here means a disk read failed for an offset this log
    /// itself recorded as valid — a real I/O fault, not an out-of-window
    /// lookup.
    pub fn get(&mut self, index: u64) -> Result<Option<EntryRef>> {
        if index <= self.snapshot_base_index || index > self.snapshot_base_index + self.count {
            return Ok(None);
        }
        if let Some(entry) = self.cache.get(index) {
            return Ok(Some(entry));
        }
        let slot = (index - self.snapshot_base_index - 1) as usize;
        let offset = self
            .index
            .get(slot)
            .ok_or_else(|| Error::InvariantViolation(format!("missing index slot {slot}")))?;
        self.log_file.seek_to(offset)?;
        let record = self
            .log_file
            .read_one_record()?
            .ok_or_else(|| Error::CorruptHeader(format!("expected entry at offset {offset}")))?;
        let entry = decode_entry(&record)?;
        Ok(Some(Arc::new(entry)))
    }

    /// Deletes every entry with logical index `>= from_index`, returning
    /// the number deleted.
    ///
    /// `observer.on_deleted` is invoked once per removed entry in ascending
    /// logical index order, after the underlying file, index, and cache
    /// have already been truncated.
    pub fn delete(
        &mut self,
        from_index: u64,
        mut observer: Option<&mut dyn RaftLogObserver>,
    ) -> Result<u64> {
        if from_index == 0 {
            return Err(Error::InvalidArgument("delete(0) is not allowed".into()));
        }
        if from_index < self.snapshot_base_index + 1 {
            return Err(Error::InvalidArgument(format!(
                "delete({from_index}) is below the log's base index {}",
                self.snapshot_base_index
            )));
        }
        let last = self.last_index();
        if from_index > last {
            return Ok(0);
        }

        let mut removed_entries = Vec::with_capacity((last - from_index + 1) as usize);
        for j in from_index..=last {
            if let Some(entry) = self.get(j)? {
                removed_entries.push((j, entry));
            }
        }

        let slot = (from_index - self.snapshot_base_index - 1) as usize;
        let truncate_at = self
            .index
            .get(slot)
            .ok_or_else(|| Error::InvariantViolation(format!("missing index slot {slot}")))?;
        self.log_file.truncate_to(truncate_at)?;
        self.index.truncate(slot)?;
        if !self.cache.is_empty() && from_index <= self.cache.start_index() {
            // The deleted range swallows the whole cached window; DeleteTail
            // alone would report -1 here (from_index below start_index) and
            // leave stale entries behind.
            self.cache.clear();
        } else {
            self.cache.delete_tail(from_index);
        }
        self.count = slot as u64;
        self.last_entry_term = if slot == 0 {
            self.snapshot_base_term
        } else {
            // The tail entry's term is whatever the last surviving append
            // recorded; re-derive it from the still-cached or on-disk data.
            self.get(self.last_index())?
                .map(|e| e.term)
                .unwrap_or(self.snapshot_base_term)
        };

        if let Some(obs) = observer.as_deref_mut() {
            for (index, entry) in &removed_entries {
                obs.on_deleted(entry, *index);
            }
        }

        Ok(removed_entries.len() as u64)
    }

    /// Discards every stored entry and reframes the log around a new
    /// snapshot base, used after installing a snapshot.
    pub fn reset(&mut self, new_base_index: u64, new_base_term: u64) -> Result<()> {
        self.log_file.truncate_to(0)?;
        let header = recovery::Header {
            version: recovery::HEADER_VERSION,
            dbid: self.dbid.clone(),
            node_id: self.node_id,
            snapshot_base_index: new_base_index,
            snapshot_base_term: new_base_term,
        };
        recovery::write_header(&mut self.log_file, &header)?;
        self.index.clear()?;
        self.cache.clear();
        self.snapshot_base_index = new_base_index;
        self.snapshot_base_term = new_base_term;
        self.count = 0;
        self.last_entry_term = new_base_term;
        Ok(())
    }

    /// Persists a new current term and vote, appending a `VOTE` record.
    ///
    /// Enforces forward-only terms: `term < current_term` is rejected with
    /// [`Error::InvariantViolation`].
    pub fn set_term(&mut self, term: u64, vote: i32) -> Result<()> {
        if term < self.current_term {
            return Err(Error::InvariantViolation(format!(
                "set_term({term}) below current term {}",
                self.current_term
            )));
        }
        let term_str = term.to_string();
        let vote_str = vote.to_string();
        self.log_file
            .append_record(&[OP_VOTE, term_str.as_bytes(), vote_str.as_bytes()])?;
        self.current_term = term;
        self.vote = vote;
        Ok(())
    }

    /// Flushes and fsyncs the log file and its sidecar.
    pub fn sync(&mut self) -> Result<()> {
        self.log_file.sync_all()?;
        self.index.sync()?;
        Ok(())
    }

    /// Releases the log's file handles. A thin wrapper over `drop` kept to
    /// mirror the explicit `Close` operation in the public contract.
    pub fn close(self) -> Result<()> {
        Ok(())
    }

    /// Replays every stored entry in ascending logical index order through
    /// `observer.on_loaded`, stopping early if it returns `false`. Returns
    /// the number of entries enumerated.
    pub fn load_entries(&mut self, observer: &mut dyn RaftLogObserver) -> Result<u64> {
        let mut loaded = 0u64;
        for index in self.first_index()..=self.last_index() {
            let Some(entry) = self.get(index)? else {
                break;
            };
            loaded += 1;
            if !observer.on_loaded(&entry, index) {
                break;
            }
        }
        Ok(loaded)
    }
}

fn decode_entry(record: &record::RawRecord) -> Result<Entry> {
    let term = record.field_u64(1)?;
    let id = record.field_u32(2)?;
    let entry_type = EntryType::try_from(record.field_u64(3)? as u8)?;
    let payload = record.field_bytes(4)?;
    Ok(Entry::new(term, entry_type, id, payload))
}
