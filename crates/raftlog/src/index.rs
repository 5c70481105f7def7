//! In-memory offset index plus its on-disk sidecar mirror.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Maps physical slot (0-based, relative to `snapshot_base_index`) to the
/// byte offset of that entry's record frame in the log file, and mirrors
/// the mapping into a `.idx` sidecar so [`crate::recovery`] rarely has to
/// rescan the whole log file from scratch.
///
/// The sidecar is purely an optimisation: [`LogIndex::rebuild_sidecar`] can
/// always regenerate it from `offsets`, which Recovery populates by reading
/// the log file directly.
#[derive(Debug)]
pub(crate) struct LogIndex {
    offsets: Vec<u64>,
    sidecar_path: PathBuf,
    sidecar: File,
}

impl LogIndex {
    pub fn sidecar_path_for(log_path: &Path) -> PathBuf {
        let mut p = log_path.as_os_str().to_owned();
        p.push(".idx");
        PathBuf::from(p)
    }

    /// Creates a fresh, empty sidecar file (truncating any existing one).
    pub fn create(log_path: &Path) -> io::Result<Self> {
        let sidecar_path = Self::sidecar_path_for(log_path);
        let sidecar = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(true)
            .open(&sidecar_path)?;
        Ok(Self {
            offsets: Vec::new(),
            sidecar_path,
            sidecar,
        })
    }

    /// Opens (creating if absent) the sidecar for `log_path` without
    /// touching its contents; the caller is expected to overwrite it via
    /// [`LogIndex::rebuild_sidecar`] once Recovery knows the true offsets.
    pub fn open(log_path: &Path) -> io::Result<Self> {
        let sidecar_path = Self::sidecar_path_for(log_path);
        let sidecar = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(&sidecar_path)?;
        Ok(Self {
            offsets: Vec::new(),
            sidecar_path,
            sidecar,
        })
    }

    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn get(&self, slot: usize) -> Option<u64> {
        self.offsets.get(slot).copied()
    }

    /// Reads the sidecar's raw little-endian u64 offsets from disk.
    pub fn read_sidecar(&mut self) -> io::Result<Vec<u64>> {
        self.sidecar.seek(SeekFrom::Start(0))?;
        let mut bytes = Vec::new();
        self.sidecar.read_to_end(&mut bytes)?;
        let mut out = Vec::with_capacity(bytes.len() / 8);
        let mut chunks = bytes.chunks_exact(8);
        for chunk in &mut chunks {
            out.push(u64::from_le_bytes(chunk.try_into().unwrap()));
        }
        Ok(out)
    }

    /// Installs `offsets` as the current in-memory index, without touching
    /// the sidecar file on disk. Used by Recovery once it has decided the
    /// sidecar matches (or after it has rewritten one that didn't).
    pub fn set_offsets(&mut self, offsets: Vec<u64>) {
        self.offsets = offsets;
    }

    /// Overwrites the sidecar file with the current in-memory offsets.
    pub fn rebuild_sidecar(&mut self) -> io::Result<()> {
        self.sidecar.set_len(0)?;
        self.sidecar.seek(SeekFrom::Start(0))?;
        let mut buf = Vec::with_capacity(self.offsets.len() * 8);
        for offset in &self.offsets {
            buf.extend_from_slice(&offset.to_le_bytes());
        }
        self.sidecar.write_all(&buf)?;
        self.sidecar.sync_all()
    }

    /// Appends one new offset, both in memory and to the sidecar file.
    ///
    /// Seeks explicitly before writing: `File::set_len` (used by
    /// `truncate`/`clear`) never moves the write cursor, so without this
    /// seek a `push` following a `Delete` or `Reset` would write at the
    /// stale pre-truncation offset and leave a zero-filled hole in the
    /// sidecar.
    pub fn push(&mut self, offset: u64) -> io::Result<()> {
        self.offsets.push(offset);
        let write_at = ((self.offsets.len() - 1) * 8) as u64;
        self.sidecar.seek(SeekFrom::Start(write_at))?;
        self.sidecar.write_all(&offset.to_le_bytes())
    }

    /// Truncates the index down to `new_len` live entries, both in memory
    /// and on the sidecar file.
    pub fn truncate(&mut self, new_len: usize) -> io::Result<()> {
        self.offsets.truncate(new_len);
        self.sidecar.set_len((new_len * 8) as u64)?;
        self.sidecar.seek(SeekFrom::Start((new_len * 8) as u64))?;
        Ok(())
    }

    /// Empties the index entirely, used by `Reset`.
    pub fn clear(&mut self) -> io::Result<()> {
        self.truncate(0)
    }

    pub fn sidecar_path(&self) -> &Path {
        &self.sidecar_path
    }

    pub fn sync(&self) -> io::Result<()> {
        self.sidecar.sync_all()
    }
}

pub(crate) fn sidecar_matches(on_disk: &[u64], rebuilt: &[u64]) -> bool {
    on_disk.len() >= rebuilt.len() && on_disk[..rebuilt.len()] == rebuilt[..]
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn push_and_read_round_trips() {
        let dir = tempdir().unwrap();
        let log_path = dir.path().join("raft.log");
        let mut idx = LogIndex::create(&log_path).unwrap();
        idx.push(0).unwrap();
        idx.push(42).unwrap();
        idx.push(99).unwrap();

        let on_disk = idx.read_sidecar().unwrap();
        assert_eq!(on_disk, vec![0, 42, 99]);
    }

    #[test]
    fn truncate_shrinks_sidecar() {
        let dir = tempdir().unwrap();
        let log_path = dir.path().join("raft.log");
        let mut idx = LogIndex::create(&log_path).unwrap();
        idx.push(0).unwrap();
        idx.push(1).unwrap();
        idx.push(2).unwrap();
        idx.truncate(1).unwrap();
        assert_eq!(idx.len(), 1);
        assert_eq!(idx.read_sidecar().unwrap(), vec![0]);
    }

    #[test]
    fn push_after_truncate_does_not_leave_a_hole() {
        let dir = tempdir().unwrap();
        let log_path = dir.path().join("raft.log");
        let mut idx = LogIndex::create(&log_path).unwrap();
        idx.push(10).unwrap();
        idx.push(20).unwrap();
        idx.push(30).unwrap();
        idx.truncate(1).unwrap();
        idx.push(99).unwrap();

        let on_disk = idx.read_sidecar().unwrap();
        assert_eq!(on_disk, vec![10, 99]);
        assert_eq!(
            std::fs::metadata(idx.sidecar_path()).unwrap().len(),
            (on_disk.len() * 8) as u64
        );
    }

    #[test]
    fn sidecar_matches_checks_prefix_equality() {
        assert!(sidecar_matches(&[1, 2, 3], &[1, 2, 3]));
        assert!(sidecar_matches(&[1, 2, 3, 4], &[1, 2, 3]));
        assert!(!sidecar_matches(&[1, 2], &[1, 2, 3]));
        assert!(!sidecar_matches(&[1, 9, 3], &[1, 2, 3]));
    }
}
