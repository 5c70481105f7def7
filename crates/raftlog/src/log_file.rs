//! Owns the on-disk log file handle and its append-position cursor.
//!
//! `LogFile` knows nothing about log indices or Raft semantics — it is
//! purely "seek to an offset, read or write one multibulk record there."
//! [`crate::RaftLog`] and [`crate::recovery`] build the higher-level
//! contract on top of it.

use crate::error::{Error, Result};
use crate::record::{self, RawRecord};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::Path;

#[derive(Debug)]
pub(crate) struct LogFile {
    file: File,
    end_offset: u64,
}

impl LogFile {
    /// Creates a brand-new, empty log file. Fails if the path already
    /// exists and is non-empty — callers must `Open` an existing log
    /// instead of re-`Create`-ing it.
    pub fn create(path: &Path) -> Result<Self> {
        if let Ok(meta) = std::fs::metadata(path) {
            if meta.len() > 0 {
                return Err(Error::Io(std::io::Error::new(
                    std::io::ErrorKind::AlreadyExists,
                    "log file already exists and is non-empty",
                )));
            }
        }
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(true)
            .open(path)?;
        Ok(Self {
            file,
            end_offset: 0,
        })
    }

    /// Opens an existing log file for reading and appending.
    pub fn open(path: &Path) -> Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        let end_offset = file.metadata()?.len();
        Ok(Self { file, end_offset })
    }

    pub fn end_offset(&self) -> u64 {
        self.end_offset
    }

    /// Seeks the shared cursor to an arbitrary offset, for random-access
    /// reads by [`crate::RaftLog::get`].
    pub fn seek_to(&mut self, offset: u64) -> Result<()> {
        self.file.seek(SeekFrom::Start(offset))?;
        Ok(())
    }

    /// Current file position. Valid to call between sequential
    /// `read_one_record` calls because the file handle is never wrapped in
    /// a buffering reader — every byte consumed by `read_one_record`
    /// advances the real OS-level cursor by exactly that many bytes.
    pub fn position(&mut self) -> Result<u64> {
        Ok(self.file.stream_position()?)
    }

    /// Reads one record starting at the current cursor position.
    pub fn read_one_record(&mut self) -> Result<Option<RawRecord>> {
        record::read_record(&mut self.file)
    }

    /// Appends one record at the end of the file, returning its start
    /// offset. Not synced; callers batch and call [`LogFile::sync_all`].
    pub fn append_record(&mut self, fields: &[&[u8]]) -> Result<u64> {
        self.file.seek(SeekFrom::Start(self.end_offset))?;
        let start = self.end_offset;
        {
            let mut writer = BufWriter::new(&mut self.file);
            let written = record::write_record(&mut writer, fields)?;
            writer.flush()?;
            self.end_offset = start + written;
        }
        Ok(start)
    }

    /// Truncates the file to `offset` bytes, discarding everything after.
    pub fn truncate_to(&mut self, offset: u64) -> Result<()> {
        self.file.set_len(offset)?;
        self.end_offset = offset;
        Ok(())
    }

    pub fn sync_all(&self) -> Result<()> {
        self.file.sync_all()?;
        Ok(())
    }
}
