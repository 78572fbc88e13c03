//! ZIP archive reading.
//!
//! Split into three layers:
//!
//! - [`structures`]: on-disk ZIP records (trailer, directory entries) and
//!   their binary parsing
//! - [`parser`]: locating and reading the central directory from any
//!   seekable stream
//! - [`archive`]: the user-facing [`ZipReader`] / [`RemoteArchive`] session
//!   with member lookup and streaming extraction
//!
//! A ZIP file is read from the end: the End of Central Directory record at
//! the tail points at the central directory, which lists every member and
//! its local header offset. Reading the trailer first is what makes ranged
//! remote access work at all: listing an archive only ever touches its
//! tail.
//!
//! Supported: ZIP and ZIP64, STORED and DEFLATE members, trailing archive
//! comments, CRC32 verification. Not supported: encryption, multi-disk
//! archives, other compression methods.

mod archive;
mod parser;
mod structures;

pub use archive::{MemberReader, RemoteArchive, RemoteArchiveBuilder, ZipReader};
pub use parser::{Directory, read_directory};
pub use structures::{CompressionMethod, MemberEntry};
