//! Redis-style multibulk framing for the on-disk log file.
//!
//! Every record on disk looks like:
//!
//! ```text
//! *<N>\r\n
//! $<len>\r\n<bytes>\r\n    (repeated N times)
//! ```
//!
//! The first field is always an ASCII opcode (`RAFTLOG`, `ENTRY`, `VOTE`,
//! `END`); every other field, numeric or not, is carried as a bulk string —
//! there is no separate integer wire type, so a single `read_field` /
//! `write_field` pair serves header, entry, and vote records alike.

use crate::error::{Error, Result};
use std::io::{self, Read, Write};

const CRLF: &[u8] = b"\r\n";

pub(crate) const OP_HEADER: &[u8] = b"RAFTLOG";
pub(crate) const OP_ENTRY: &[u8] = b"ENTRY";
pub(crate) const OP_VOTE: &[u8] = b"VOTE";
pub(crate) const OP_END: &[u8] = b"END";

/// One decoded record, still in its raw field form.
///
/// Kept deliberately dumb: interpreting fields into typed values (u64s, the
/// entry payload, ...) is the job of the callers in `log_file` and
/// `recovery`, which know which opcode they asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RawRecord {
    pub fields: Vec<Vec<u8>>,
}

impl RawRecord {
    pub fn new(fields: Vec<Vec<u8>>) -> Self {
        Self { fields }
    }

    pub fn opcode(&self) -> &[u8] {
        self.fields.first().map(Vec::as_slice).unwrap_or(b"")
    }

    fn field(&self, i: usize) -> Result<&[u8]> {
        self.fields
            .get(i)
            .map(Vec::as_slice)
            .ok_or_else(|| corrupt(format!("record missing field {i}")))
    }

    pub fn field_str(&self, i: usize) -> Result<String> {
        String::from_utf8(self.field(i)?.to_vec())
            .map_err(|e| corrupt(format!("field {i} is not valid utf-8: {e}")))
    }

    pub fn field_u64(&self, i: usize) -> Result<u64> {
        self.field_str(i)?
            .parse()
            .map_err(|e| corrupt(format!("field {i} is not a u64: {e}")))
    }

    pub fn field_u32(&self, i: usize) -> Result<u32> {
        self.field_str(i)?
            .parse()
            .map_err(|e| corrupt(format!("field {i} is not a u32: {e}")))
    }

    pub fn field_i32(&self, i: usize) -> Result<i32> {
        self.field_str(i)?
            .parse()
            .map_err(|e| corrupt(format!("field {i} is not an i32: {e}")))
    }

    pub fn field_bytes(&self, i: usize) -> Result<Vec<u8>> {
        Ok(self.field(i)?.to_vec())
    }
}

fn corrupt(reason: String) -> Error {
    Error::Io(io::Error::new(io::ErrorKind::InvalidData, reason))
}

/// Encode `fields` (opcode first) as one multibulk record and write it out.
///
/// Returns the number of bytes written, so callers can track file offsets
/// without a separate `seek` round-trip.
pub(crate) fn write_record<W: Write>(w: &mut W, fields: &[&[u8]]) -> io::Result<u64> {
    let mut written = 0u64;
    let header = format!("*{}\r\n", fields.len());
    w.write_all(header.as_bytes())?;
    written += header.len() as u64;
    for field in fields {
        written += write_field(w, field)?;
    }
    Ok(written)
}

fn write_field<W: Write>(w: &mut W, bytes: &[u8]) -> io::Result<u64> {
    let prefix = format!("${}\r\n", bytes.len());
    w.write_all(prefix.as_bytes())?;
    w.write_all(bytes)?;
    w.write_all(CRLF)?;
    Ok(prefix.len() as u64 + bytes.len() as u64 + CRLF.len() as u64)
}

/// Read one multibulk record from `r`.
///
/// Returns `Ok(None)` when the stream is exactly at a clean record boundary
/// (no bytes at all could be read for the leading `*`) — this is the normal
/// end of a well-formed file. Any other failure (a partial line, a bad
/// length prefix, a short payload) is returned as `Err`; callers scanning
/// the log file treat that as "crash mid-append" and truncate there.
pub(crate) fn read_record<R: Read>(r: &mut R) -> Result<Option<RawRecord>> {
    let Some(line) = read_line(r)? else {
        return Ok(None);
    };
    let count_str = line
        .strip_prefix('*')
        .ok_or_else(|| corrupt(format!("expected '*', got {line:?}")))?;
    let count: usize = count_str
        .parse()
        .map_err(|e| corrupt(format!("bad field count {count_str:?}: {e}")))?;

    let mut fields = Vec::with_capacity(count);
    for _ in 0..count {
        fields.push(read_field(r)?);
    }
    Ok(Some(RawRecord::new(fields)))
}

/// Reads one CRLF-terminated line. `Ok(None)` only when zero bytes were
/// available before hitting EOF (a clean boundary); any partial line is an
/// error.
fn read_line<R: Read>(r: &mut R) -> Result<Option<String>> {
    let mut buf = Vec::new();
    let mut byte = [0u8; 1];
    loop {
        match r.read(&mut byte) {
            Ok(0) => {
                if buf.is_empty() {
                    return Ok(None);
                }
                return Err(Error::Io(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "truncated line",
                )));
            }
            Ok(_) => {
                if byte[0] == b'\n' {
                    if buf.last() == Some(&b'\r') {
                        buf.pop();
                    }
                    return Ok(Some(String::from_utf8(buf).map_err(|e| {
                        corrupt(format!("line is not valid utf-8: {e}"))
                    })?));
                }
                buf.push(byte[0]);
            }
            Err(e) => return Err(Error::Io(e)),
        }
    }
}

fn read_field<R: Read>(r: &mut R) -> Result<Vec<u8>> {
    let line = read_line(r)?.ok_or_else(|| {
        Error::Io(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "truncated record: missing field",
        ))
    })?;
    let len_str = line
        .strip_prefix('$')
        .ok_or_else(|| corrupt(format!("expected '$', got {line:?}")))?;
    let len: usize = len_str
        .parse()
        .map_err(|e| corrupt(format!("bad field length {len_str:?}: {e}")))?;

    let mut bytes = vec![0u8; len];
    r.read_exact(&mut bytes).map_err(|e| {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            Error::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "truncated record: short field payload",
            ))
        } else {
            Error::Io(e)
        }
    })?;

    let mut terminator = [0u8; 2];
    r.read_exact(&mut terminator).map_err(|e| {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            Error::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "truncated record: missing field terminator",
            ))
        } else {
            Error::Io(e)
        }
    })?;
    if &terminator != CRLF {
        return Err(corrupt("field not terminated by CRLF".into()));
    }

    Ok(bytes)
}
