//! High-level archive access: member lookup, streaming reads, remote
//! sessions.

use std::io::{self, Read, Seek, SeekFrom, Take};

use flate2::Crc;
use flate2::read::DeflateDecoder;
use reqwest::blocking::Client;

use super::parser;
use super::structures::{CompressionMethod, LOCAL_HEADER_SIGNATURE, LOCAL_HEADER_SIZE, MemberEntry};
use crate::error::{Error, Result};
use crate::io::{DEFAULT_BUFFER_SIZE, HttpFetcher, RangeFetch, RemoteStream, member_size_map};

/// A ZIP archive over any seekable stream.
///
/// The central directory is read once at construction; members are opened
/// lazily and streamed.
pub struct ZipReader<R> {
    reader: R,
    entries: Vec<MemberEntry>,
    directory_start: u64,
}

impl<R: Read + Seek> ZipReader<R> {
    /// Read the archive's central directory from `reader`.
    pub fn new(mut reader: R) -> Result<Self> {
        let directory = parser::read_directory(&mut reader)?;
        Ok(Self {
            reader,
            entries: directory.entries,
            directory_start: directory.start,
        })
    }

    /// Every member listed in the central directory, in directory order.
    pub fn entries(&self) -> &[MemberEntry] {
        &self.entries
    }

    /// Look up a member by its full name in the archive.
    pub fn entry(&self, name: &str) -> Option<&MemberEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    /// Absolute offset where the central directory begins.
    pub fn directory_start(&self) -> u64 {
        self.directory_start
    }

    pub fn get_ref(&self) -> &R {
        &self.reader
    }

    pub fn get_mut(&mut self) -> &mut R {
        &mut self.reader
    }

    /// Open one member for streaming reads of its decompressed payload.
    ///
    /// Seeks to the member's local header, skips its variable-length fields
    /// and hands back a reader over exactly the member's payload. The CRC of
    /// everything read is verified once the payload is exhausted.
    pub fn open(&mut self, entry: &MemberEntry) -> Result<MemberReader<'_, R>> {
        self.reader.seek(SeekFrom::Start(entry.header_offset))?;
        let mut header = [0u8; LOCAL_HEADER_SIZE];
        self.reader.read_exact(&mut header)?;
        if header[..4] != LOCAL_HEADER_SIGNATURE {
            return Err(Error::Format("invalid local file header".into()));
        }
        // name and extra field lengths sit at the end of the fixed part and
        // may differ from the central directory copy
        let name_len = u16::from_le_bytes([header[26], header[27]]) as i64;
        let extra_len = u16::from_le_bytes([header[28], header[29]]) as i64;
        self.reader.seek(SeekFrom::Current(name_len + extra_len))?;

        let payload = (&mut self.reader).take(entry.compressed_size);
        MemberReader::new(payload, entry)
    }

    /// Read one member's full decompressed payload into memory.
    pub fn read(&mut self, entry: &MemberEntry) -> Result<Vec<u8>> {
        let mut data = Vec::with_capacity(entry.uncompressed_size as usize);
        self.open(entry)?.read_to_end(&mut data)?;
        Ok(data)
    }

    /// Read one member by name.
    pub fn read_by_name(&mut self, name: &str) -> Result<Vec<u8>> {
        let entry = self
            .entry(name)
            .cloned()
            .ok_or_else(|| Error::MemberNotFound { name: name.into() })?;
        self.read(&entry)
    }
}

enum Decoder<'a, R> {
    Stored(Take<&'a mut R>),
    Deflated(DeflateDecoder<Take<&'a mut R>>),
}

/// Streaming reader over one member's decompressed payload.
///
/// Verifies the member's CRC32 when the payload has been read to the end; a
/// mismatch surfaces as an `InvalidData` I/O error on the final read.
pub struct MemberReader<'a, R> {
    decoder: Decoder<'a, R>,
    crc: Crc,
    expected_crc: u32,
    verified: bool,
}

impl<'a, R: Read> MemberReader<'a, R> {
    fn new(payload: Take<&'a mut R>, entry: &MemberEntry) -> Result<Self> {
        let decoder = match entry.compression {
            CompressionMethod::Stored => Decoder::Stored(payload),
            CompressionMethod::Deflate => Decoder::Deflated(DeflateDecoder::new(payload)),
            CompressionMethod::Unknown(method) => {
                return Err(Error::UnsupportedCompression { method });
            }
        };
        Ok(Self {
            decoder,
            crc: Crc::new(),
            expected_crc: entry.crc32,
            verified: false,
        })
    }
}

impl<R: Read> Read for MemberReader<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = match &mut self.decoder {
            Decoder::Stored(inner) => inner.read(buf)?,
            Decoder::Deflated(inner) => inner.read(buf)?,
        };
        if n > 0 {
            self.crc.update(&buf[..n]);
        } else if !buf.is_empty() && !self.verified {
            self.verified = true;
            if self.crc.sum() != self.expected_crc {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!(
                        "crc32 mismatch: expected {:#010x}, got {:#010x}",
                        self.expected_crc,
                        self.crc.sum()
                    ),
                ));
            }
        }
        Ok(n)
    }
}

impl<F: RangeFetch> ZipReader<RemoteStream<F>> {
    /// Open a remote archive through a range fetcher.
    ///
    /// This drives the two-phase bootstrap: the directory is read through
    /// generic fetches, then the member size map derived from it is
    /// installed so every later member access costs exactly one ranged
    /// fetch.
    pub fn with_fetcher(fetcher: F) -> Result<Self> {
        Self::with_fetcher_and_buffer_size(fetcher, DEFAULT_BUFFER_SIZE)
    }

    /// Like [`with_fetcher`](Self::with_fetcher), with a custom size for the
    /// initial tail window.
    pub fn with_fetcher_and_buffer_size(fetcher: F, initial_buffer_size: u64) -> Result<Self> {
        let stream = RemoteStream::with_buffer_size(fetcher, initial_buffer_size);
        let mut archive = ZipReader::new(stream)?;
        let starts = archive
            .entries
            .iter()
            .map(|entry| entry.header_offset)
            .collect();
        let map = member_size_map(starts, archive.directory_start);
        archive.reader.install_member_map(map);
        Ok(archive)
    }
}

/// A ZIP archive on an HTTP server, read member by member through ranged
/// fetches.
pub type RemoteArchive = ZipReader<RemoteStream<HttpFetcher>>;

impl RemoteArchive {
    /// Open a remote archive with default transport settings.
    pub fn connect(url: &str) -> Result<Self> {
        RemoteArchiveBuilder::new(url).open()
    }

    /// Configure transport and fetch sizing before opening.
    pub fn builder(url: &str) -> RemoteArchiveBuilder {
        RemoteArchiveBuilder::new(url)
    }

    /// Total window bytes fetched from the network for this session.
    pub fn transferred_bytes(&self) -> u64 {
        self.get_ref().fetcher().transferred_bytes()
    }
}

/// Builder for [`RemoteArchive`] sessions.
pub struct RemoteArchiveBuilder {
    url: String,
    client: Option<Client>,
    initial_buffer_size: u64,
    support_suffix_range: bool,
}

impl RemoteArchiveBuilder {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            client: None,
            initial_buffer_size: DEFAULT_BUFFER_SIZE,
            support_suffix_range: true,
        }
    }

    /// Use a preconfigured HTTP client. TLS, auth, proxies and timeouts all
    /// live on the client and pass through untouched.
    pub fn client(mut self, client: Client) -> Self {
        self.client = Some(client);
        self
    }

    /// Size of the tail window fetched while locating the directory.
    pub fn initial_buffer_size(mut self, size: u64) -> Self {
        self.initial_buffer_size = size;
        self
    }

    /// Declare whether the server accepts `bytes=-N` suffix ranges.
    pub fn support_suffix_range(mut self, support: bool) -> Self {
        self.support_suffix_range = support;
        self
    }

    pub fn open(self) -> Result<RemoteArchive> {
        let fetcher = match self.client {
            Some(client) => HttpFetcher::with_client(&self.url, client),
            None => HttpFetcher::new(&self.url)?,
        }
        .support_suffix_range(self.support_suffix_range);
        ZipReader::with_fetcher_and_buffer_size(fetcher, self.initial_buffer_size)
    }
}
