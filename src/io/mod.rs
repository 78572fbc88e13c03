//! Byte-range I/O against a remote file.
//!
//! The pieces layer bottom-up: a [`RangeFetch`] implementation (usually
//! [`HttpFetcher`]) turns a [`ByteRange`] into a [`WindowBuffer`], a bounded
//! file-like view over the bytes the server actually served, and
//! [`RemoteStream`] stitches those windows into one seekable stream that a
//! ZIP parser can drive exactly like a local file.

mod buffer;
mod http;
mod stream;

pub use buffer::WindowBuffer;
pub use http::HttpFetcher;
pub use stream::{DEFAULT_BUFFER_SIZE, MemberSizeMap, RemoteStream, member_size_map};

use crate::error::Result;

/// A byte window of a remote file, used as a request descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteRange {
    /// An explicit inclusive window `[start, end]`.
    Bounded { start: u64, end: u64 },
    /// The last `len` bytes of the file, requested without knowing its size.
    Suffix { len: u64 },
}

impl ByteRange {
    /// An explicit inclusive window.
    pub fn bounded(start: u64, end: u64) -> Self {
        ByteRange::Bounded { start, end }
    }

    /// The last `len` bytes of the file.
    pub fn suffix(len: u64) -> Self {
        ByteRange::Suffix { len }
    }

    /// Value for the HTTP `Range` header.
    pub fn to_header_value(self) -> String {
        match self {
            ByteRange::Bounded { start, end } => format!("bytes={start}-{end}"),
            ByteRange::Suffix { len } => format!("bytes=-{len}"),
        }
    }

    /// Rewrite a suffix range into an explicit one, for servers that reject
    /// `bytes=-N`. Requires the total file size, clamps at the file start and
    /// yields byte-for-byte the same window a native suffix request would.
    pub fn into_bounded(self, total_size: u64) -> Self {
        match self {
            ByteRange::Suffix { len } => ByteRange::Bounded {
                start: total_size.saturating_sub(len),
                end: total_size.saturating_sub(1),
            },
            bounded => bounded,
        }
    }
}

/// Source of ranged fetches.
///
/// This is the seam between the virtual stream and the transport: tests
/// substitute an in-memory implementation, production code uses
/// [`HttpFetcher`].
pub trait RangeFetch {
    /// Fetch one byte window of the remote file.
    ///
    /// With `stream` set the body is consumed lazily as the returned buffer
    /// is read; otherwise it is fully materialized first, which keeps
    /// backward seeks within the window cheap.
    ///
    /// The returned buffer describes the window the server *actually* served
    /// (servers may clamp a range at the end of the file).
    fn fetch(&self, range: ByteRange, stream: bool) -> Result<WindowBuffer>;

    /// Total size of the remote file, via a metadata-only request.
    fn total_size(&self) -> Result<u64>;
}
