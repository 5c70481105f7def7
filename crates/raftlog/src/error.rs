use std::io;
use thiserror::Error;

/// Canonical error type for the replicated-log subsystem.
///
/// `Get` never returns an error for an out-of-window index — it returns
/// `None` — so [`Error::NotFound`] exists only for documentation purposes
/// and is never constructed by this crate.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] io::Error),

    #[error("corrupt header: {0}")]
    CorruptHeader(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    #[error("index not found")]
    NotFound,
}

/// Result alias that carries a [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
