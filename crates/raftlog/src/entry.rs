use crate::error::Error;
use std::sync::Arc;

/// Distinguishes the four kinds of entry this log knows how to carry.
///
/// The wire encoding is always the type's numeric discriminant, written as
/// an ASCII decimal inside the `ENTRY` record's `type` field.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum EntryType {
    /// A normal client command.
    Normal = 0,
    /// A no-op committed by a new leader to establish its term.
    NoOp = 1,
    /// A cluster configuration change.
    Configuration = 2,
    /// A client session bookkeeping record.
    Session = 3,
}

impl TryFrom<u8> for EntryType {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(EntryType::Normal),
            1 => Ok(EntryType::NoOp),
            2 => Ok(EntryType::Configuration),
            3 => Ok(EntryType::Session),
            other => Err(Error::InvariantViolation(format!(
                "unknown entry type {other}"
            ))),
        }
    }
}

impl From<EntryType> for u8 {
    fn from(value: EntryType) -> Self {
        value as u8
    }
}

/// An immutable log entry.
///
/// Once appended, an entry's fields never change; [`EntryRef`] shares it
/// between the on-disk log, the cache, and any caller still holding a
/// reference after a `Delete`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Entry {
    pub term: u64,
    pub entry_type: EntryType,
    pub id: u32,
    pub payload: Vec<u8>,
}

impl Entry {
    pub fn new(term: u64, entry_type: EntryType, id: u32, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            term,
            entry_type,
            id,
            payload: payload.into(),
        }
    }
}

/// A shared, reference-counted handle to an [`Entry`].
///
/// Cloning is the "acquire"; the last drop is the "release" that frees the
/// payload. Entries never point back at the log, so no cycles are possible.
pub type EntryRef = Arc<Entry>;
