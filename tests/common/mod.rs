//! Shared test fixtures: an in-memory range server and a ZIP builder.

#![allow(dead_code)]

use std::cell::Cell;
use std::io::{self, Cursor, Read, Write};
use std::rc::Rc;

use flate2::write::DeflateEncoder;
use flate2::{Compression, Crc};

use rangezip::io::WindowBuffer;
use rangezip::{ByteRange, Error, RangeFetch, Result};

/// Observed traffic of a [`MockFetcher`].
#[derive(Default)]
pub struct Counters {
    pub fetches: Cell<usize>,
    pub size_probes: Cell<usize>,
    pub opened_bodies: Cell<usize>,
    pub closed_bodies: Cell<usize>,
}

impl Counters {
    /// Streaming bodies currently alive, i.e. connections not yet released.
    pub fn live_bodies(&self) -> usize {
        self.opened_bodies.get() - self.closed_bodies.get()
    }
}

/// Serves ranges of an in-memory byte blob the way a conforming HTTP server
/// would: clamps at the end of the file, supports suffix ranges, and reports
/// the window actually served.
pub struct MockFetcher {
    data: Vec<u8>,
    pub counters: Rc<Counters>,
}

impl MockFetcher {
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            data,
            counters: Rc::new(Counters::default()),
        }
    }
}

/// Streaming body that reports its release, standing in for a pooled
/// connection.
struct TrackedBody {
    inner: Cursor<Vec<u8>>,
    counters: Rc<Counters>,
}

impl Read for TrackedBody {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl Drop for TrackedBody {
    fn drop(&mut self) {
        self.counters
            .closed_bodies
            .set(self.counters.closed_bodies.get() + 1);
    }
}

impl RangeFetch for MockFetcher {
    fn fetch(&self, range: ByteRange, stream: bool) -> Result<WindowBuffer> {
        self.counters.fetches.set(self.counters.fetches.get() + 1);
        let total = self.data.len() as u64;
        let (start, end) = match range.into_bounded(total) {
            ByteRange::Bounded { start, end } => (start, end.min(total.saturating_sub(1))),
            ByteRange::Suffix { .. } => unreachable!("into_bounded removes suffixes"),
        };
        if total == 0 || start >= total || start > end {
            // a real server would answer 416 here
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("range {start}-{end} not satisfiable for {total} bytes"),
            )));
        }

        let window = self.data[start as usize..=end as usize].to_vec();
        if stream {
            let size = window.len() as u64;
            self.counters
                .opened_bodies
                .set(self.counters.opened_bodies.get() + 1);
            let body = TrackedBody {
                inner: Cursor::new(window),
                counters: Rc::clone(&self.counters),
            };
            Ok(WindowBuffer::streaming(Box::new(body), start, size))
        } else {
            Ok(WindowBuffer::buffered(window, start))
        }
    }

    fn total_size(&self) -> Result<u64> {
        self.counters
            .size_probes
            .set(self.counters.size_probes.get() + 1);
        Ok(self.data.len() as u64)
    }
}

/// Fetcher against a server that rejects `bytes=-N`: suffix requests are
/// rewritten into explicit ranges after a size probe, like
/// `HttpFetcher::support_suffix_range(false)` does.
pub struct NoSuffixFetcher(pub MockFetcher);

impl RangeFetch for NoSuffixFetcher {
    fn fetch(&self, range: ByteRange, stream: bool) -> Result<WindowBuffer> {
        let range = match range {
            suffix @ ByteRange::Suffix { .. } => suffix.into_bounded(self.0.total_size()?),
            other => other,
        };
        self.0.fetch(range, stream)
    }

    fn total_size(&self) -> Result<u64> {
        self.0.total_size()
    }
}

/// One member to pack: name, payload, compression method id (0 = stored,
/// 8 = deflate, anything else is written stored but labeled as given).
pub type MemberSpec<'a> = (&'a str, &'a [u8], u16);

/// Build a ZIP archive in memory.
pub fn build_zip(members: &[MemberSpec<'_>], comment: &[u8]) -> Vec<u8> {
    let mut raw: Vec<u8> = Vec::new();
    let mut directory: Vec<u8> = Vec::new();

    for (name, data, method) in members {
        let header_offset = raw.len() as u32;
        let mut crc = Crc::new();
        crc.update(data);
        let crc32 = crc.sum();
        let payload: Vec<u8> = if *method == 8 {
            let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(data).unwrap();
            encoder.finish().unwrap()
        } else {
            data.to_vec()
        };

        // local file header
        raw.extend_from_slice(b"PK\x03\x04");
        raw.extend_from_slice(&20u16.to_le_bytes()); // version needed
        raw.extend_from_slice(&0u16.to_le_bytes()); // flags
        raw.extend_from_slice(&method.to_le_bytes());
        raw.extend_from_slice(&0x7CA3u16.to_le_bytes()); // time 15:37:06
        raw.extend_from_slice(&0x5B0Au16.to_le_bytes()); // date 2025-08-10
        raw.extend_from_slice(&crc32.to_le_bytes());
        raw.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        raw.extend_from_slice(&(data.len() as u32).to_le_bytes());
        raw.extend_from_slice(&(name.len() as u16).to_le_bytes());
        raw.extend_from_slice(&0u16.to_le_bytes()); // extra length
        raw.extend_from_slice(name.as_bytes());
        raw.extend_from_slice(&payload);

        // central directory entry
        directory.extend_from_slice(b"PK\x01\x02");
        directory.extend_from_slice(&20u16.to_le_bytes()); // version made by
        directory.extend_from_slice(&20u16.to_le_bytes()); // version needed
        directory.extend_from_slice(&0u16.to_le_bytes()); // flags
        directory.extend_from_slice(&method.to_le_bytes());
        directory.extend_from_slice(&0x7CA3u16.to_le_bytes());
        directory.extend_from_slice(&0x5B0Au16.to_le_bytes());
        directory.extend_from_slice(&crc32.to_le_bytes());
        directory.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        directory.extend_from_slice(&(data.len() as u32).to_le_bytes());
        directory.extend_from_slice(&(name.len() as u16).to_le_bytes());
        directory.extend_from_slice(&0u16.to_le_bytes()); // extra length
        directory.extend_from_slice(&0u16.to_le_bytes()); // comment length
        directory.extend_from_slice(&0u16.to_le_bytes()); // disk number start
        directory.extend_from_slice(&0u16.to_le_bytes()); // internal attrs
        directory.extend_from_slice(&0u32.to_le_bytes()); // external attrs
        directory.extend_from_slice(&header_offset.to_le_bytes());
        directory.extend_from_slice(name.as_bytes());
    }

    let directory_start = raw.len() as u32;
    let directory_size = directory.len() as u32;
    raw.extend_from_slice(&directory);

    // end of central directory
    let count = members.len() as u16;
    raw.extend_from_slice(b"PK\x05\x06");
    raw.extend_from_slice(&0u16.to_le_bytes()); // disk number
    raw.extend_from_slice(&0u16.to_le_bytes()); // disk with directory
    raw.extend_from_slice(&count.to_le_bytes());
    raw.extend_from_slice(&count.to_le_bytes());
    raw.extend_from_slice(&directory_size.to_le_bytes());
    raw.extend_from_slice(&directory_start.to_le_bytes());
    raw.extend_from_slice(&(comment.len() as u16).to_le_bytes());
    raw.extend_from_slice(comment);
    raw
}

/// Deterministic patterned payload.
pub fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}
