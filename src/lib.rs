//! # rangezip
//!
//! Random access to remote ZIP archives using HTTP Range requests.
//!
//! This library reads individual members out of a ZIP file hosted on an
//! HTTP server without downloading the whole archive. ZIP parsers need a
//! seekable file: they read the directory at the tail first, then jump
//! backward to each member. HTTP only offers bounded forward range reads.
//! The crate bridges the two with a virtual stream that turns seek
//! patterns into minimal ranged fetches.
//!
//! Opening an archive works in two phases: a small tail window is fetched to
//! locate and read the central directory (generic fetches), then the
//! directory is used to derive every member's exact byte range, so each
//! member read afterwards costs exactly one fetch of exactly the right size.
//!
//! ## Features
//!
//! - List and extract members of remote ZIP files via Range requests
//! - ZIP64 support (archives larger than 4GB)
//! - STORED and DEFLATE members, with CRC32 verification
//! - Fallback for servers that reject `bytes=-N` suffix ranges
//! - Local files work through the same [`ZipReader`] over `std::fs::File`
//!
//! ## Example
//!
//! ```no_run
//! use rangezip::RemoteArchive;
//!
//! fn main() -> rangezip::Result<()> {
//!     let mut archive = RemoteArchive::connect("https://example.com/archive.zip")?;
//!
//!     // List all members without downloading the archive
//!     for entry in archive.entries() {
//!         println!("{} ({} bytes)", entry.name, entry.uncompressed_size);
//!     }
//!
//!     // Fetch exactly one member
//!     let data = archive.read_by_name("docs/readme.md")?;
//!     println!("{} bytes transferred", archive.transferred_bytes());
//!     # let _ = data;
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod error;
pub mod io;
pub mod zip;

pub use cli::Cli;
pub use error::{Error, Result};
pub use io::{ByteRange, HttpFetcher, RangeFetch, RemoteStream, WindowBuffer};
pub use zip::{CompressionMethod, MemberEntry, MemberReader, RemoteArchive, RemoteArchiveBuilder, ZipReader};
