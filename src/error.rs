//! Error types for remote archive access.

use std::io;

use thiserror::Error;

/// Errors produced while reading a remote ZIP archive.
#[derive(Debug, Error)]
pub enum Error {
    /// The server answered a ranged request without echoing the window it
    /// served, so ranged access cannot work against it.
    #[error("server does not support range requests")]
    RangeUnsupported,

    /// A seek or read target fell outside every recoverable window.
    #[error("out of bounds: {reason}")]
    OutOfBound {
        /// What made the position unreachable.
        reason: String,
    },

    /// Transport-level failure while talking to the server.
    #[error("transport failure: {0}")]
    Transport(#[from] reqwest::Error),

    /// The size probe succeeded but the response carried no `Content-Length`.
    #[error("cannot determine file size: Content-Length header missing")]
    MetadataMissing,

    /// The archive violates the ZIP format.
    #[error("invalid zip archive: {0}")]
    Format(String),

    /// A member uses a compression method this crate cannot decode.
    #[error("unsupported compression method: {method}")]
    UnsupportedCompression {
        /// The raw method id from the member header.
        method: u16,
    },

    /// No member with the requested name exists in the archive.
    #[error("member not found: {name}")]
    MemberNotFound {
        /// The name that was looked up.
        name: String,
    },

    /// Plain I/O error (local files, streamed response bodies).
    #[error("I/O error: {0}")]
    Io(io::Error),
}

impl Error {
    pub(crate) fn out_of_bound(reason: impl Into<String>) -> Self {
        Error::OutOfBound {
            reason: reason.into(),
        }
    }
}

impl From<io::Error> for Error {
    /// Recovers a typed error that crossed the `Read`/`Seek` boundary, so
    /// callers match on the original variant instead of an opaque wrapper.
    fn from(err: io::Error) -> Self {
        match err.downcast::<Error>() {
            Ok(inner) => inner,
            Err(err) => Error::Io(err),
        }
    }
}

impl From<Error> for io::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::Io(inner) => inner,
            other => io::Error::other(other),
        }
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
