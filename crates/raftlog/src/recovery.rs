//! Header (de)serialisation and the sequential scan that rebuilds
//! [`crate::index::LogIndex`] and term/vote state when a log is opened.

use crate::entry::{Entry, EntryRef};
use crate::error::{Error, Result};
use crate::log_file::LogFile;
use crate::record::{OP_ENTRY, OP_HEADER, OP_VOTE};
use std::sync::Arc;

/// Current on-disk header version written by this crate.
pub(crate) const HEADER_VERSION: u32 = 1;

/// The no-vote sentinel, per the spec's i32 vote field.
pub const NO_VOTE: i32 = -1;

/// Decoded `RAFTLOG` header fields.
#[derive(Debug, Clone)]
pub(crate) struct Header {
    pub version: u32,
    pub dbid: String,
    pub node_id: u32,
    pub snapshot_base_index: u64,
    pub snapshot_base_term: u64,
}

/// Writes a fresh `RAFTLOG` header record at the current (expected to be
/// zero) end of `log_file`, returning the byte offset just past it.
pub(crate) fn write_header(log_file: &mut LogFile, header: &Header) -> Result<u64> {
    let version = header.version.to_string();
    let node_id = header.node_id.to_string();
    let base_index = header.snapshot_base_index.to_string();
    let base_term = header.snapshot_base_term.to_string();
    log_file.append_record(&[
        OP_HEADER,
        version.as_bytes(),
        header.dbid.as_bytes(),
        node_id.as_bytes(),
        base_index.as_bytes(),
        base_term.as_bytes(),
    ])?;
    Ok(log_file.end_offset())
}

/// Result of a full header-read-plus-scan recovery pass.
pub(crate) struct Recovered {
    pub header: Header,
    pub current_term: u64,
    /// Term of the most recently recovered entry (or `header.snapshot_base_term`
    /// if none), tracked independently of `current_term` so a later `VOTE`
    /// record never masks a legitimate, lower-term `ENTRY` that follows it.
    pub last_entry_term: u64,
    pub vote: i32,
    /// File offset of the start of each live entry record, in ascending
    /// logical order, relative to physical slot 0.
    pub offsets: Vec<u64>,
    /// Every live entry in ascending logical order, paired with its
    /// logical index. Recovery decodes the whole tail so [`crate::RaftLog`]
    /// can warm-seed the entry cache from the most recent ones.
    pub entries: Vec<(u64, EntryRef)>,
}

/// Reads the header, then scans every record after it, truncating the file
/// at the first sign of a crash-mid-write. Does not touch the sidecar;
/// callers compare `offsets` against it and rebuild if needed.
pub(crate) fn recover(log_file: &mut LogFile) -> Result<Recovered> {
    log_file.seek_to(0)?;
    let header_record = log_file
        .read_one_record()?
        .ok_or_else(|| Error::CorruptHeader("log file is empty".into()))?;
    if header_record.opcode() != OP_HEADER {
        return Err(Error::CorruptHeader(format!(
            "expected RAFTLOG header, found opcode {:?}",
            String::from_utf8_lossy(header_record.opcode())
        )));
    }
    let version: u32 = header_record
        .field_u64(1)
        .map_err(|_| Error::CorruptHeader("bad header version field".into()))? as u32;
    let dbid = header_record
        .field_str(2)
        .map_err(|_| Error::CorruptHeader("bad header dbid field".into()))?;
    let node_id = header_record
        .field_u32(3)
        .map_err(|_| Error::CorruptHeader("bad header node_id field".into()))?;
    let snapshot_base_index = header_record
        .field_u64(4)
        .map_err(|_| Error::CorruptHeader("bad header snapshot_base_index field".into()))?;
    let snapshot_base_term = header_record
        .field_u64(5)
        .map_err(|_| Error::CorruptHeader("bad header snapshot_base_term field".into()))?;
    let header = Header {
        version,
        dbid,
        node_id,
        snapshot_base_index,
        snapshot_base_term,
    };

    let header_end = log_file.position()?;
    let mut current_term = snapshot_base_term;
    let mut last_entry_term = snapshot_base_term;
    let mut vote = NO_VOTE;
    let mut offsets = Vec::new();
    let mut entries = Vec::new();
    let mut last_good_end = header_end;
    let mut next_index = snapshot_base_index + 1;

    loop {
        let record_start = log_file.position()?;
        let record = match log_file.read_one_record() {
            Ok(None) => break,
            Ok(Some(record)) => record,
            // A partial trailing record is the "crash mid-append" case: stop
            // here and let the truncate below discard it.
            Err(_) => break,
        };

        if record.opcode() == OP_ENTRY {
            let decoded = (|| -> Result<(u64, u32, u8, Vec<u8>)> {
                let term = record.field_u64(1)?;
                let id = record.field_u32(2)?;
                let entry_type = record.field_u64(3)? as u8;
                let payload = record.field_bytes(4)?;
                Ok((term, id, entry_type, payload))
            })();
            let Ok((term, id, entry_type, payload)) = decoded else {
                break;
            };
            // Entry-term monotonicity is tracked against the previous
            // entry's own term, not the VOTE-updated current_term: a leader
            // can SetTerm ahead of its log and then legitimately append
            // entries for an older, already-logged term.
            if term < last_entry_term {
                break;
            }
            let Ok(entry_type) = crate::entry::EntryType::try_from(entry_type) else {
                break;
            };
            last_entry_term = term;
            offsets.push(record_start);
            entries.push((next_index, Arc::new(Entry::new(term, entry_type, id, payload))));
            next_index += 1;
            last_good_end = log_file.position()?;
        } else if record.opcode() == OP_VOTE {
            let decoded = (|| -> Result<(u64, i32)> {
                let term = record.field_u64(1)?;
                let v = record.field_i32(2)?;
                Ok((term, v))
            })();
            let Ok((term, v)) = decoded else {
                break;
            };
            if term < current_term {
                break;
            }
            current_term = term;
            vote = v;
            last_good_end = log_file.position()?;
        } else {
            // OP_END or any unrecognised opcode: stop consuming.
            break;
        }
    }

    log_file.truncate_to(last_good_end)?;

    Ok(Recovered {
        header,
        current_term,
        last_entry_term,
        vote,
        offsets,
        entries,
    })
}
