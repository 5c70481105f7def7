//! Pluggable hooks invoked during [`crate::RaftLog::delete`] and
//! [`crate::RaftLog::load_entries`].
//!
//! Modeled as a trait rather than two raw function pointers, so a caller
//! that only cares about one hook can override a single method and rely on
//! the no-op default for the other.

use crate::entry::EntryRef;

/// Observes entry removal and entry replay.
///
/// Both methods default to doing nothing (and, for `on_loaded`, requesting
/// that iteration continue), so implementors only need to override the
/// hook they actually use.
pub trait RaftLogObserver {
    /// Called once per entry removed by `Delete`, in ascending logical
    /// index order (tail-first physical removal, reported oldest-deleted
    /// first so callers can resolve commit-ordered futures).
    fn on_deleted(&mut self, _entry: &EntryRef, _index: u64) {}

    /// Called once per entry replayed by `LoadEntries`, in ascending
    /// logical index order. Returning `false` aborts the remaining replay.
    fn on_loaded(&mut self, _entry: &EntryRef, _index: u64) -> bool {
        true
    }
}

/// The observer used when a caller passes none: every hook is a no-op and
/// replay always runs to completion.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullObserver;

impl RaftLogObserver for NullObserver {}
