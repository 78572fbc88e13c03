//! Seekable stream over a remote file, backed by ranged fetches.

use std::collections::BTreeMap;
use std::io::{self, Read, Seek, SeekFrom};

use log::debug;

use super::{ByteRange, RangeFetch, WindowBuffer};
use crate::error::{Error, Result};

/// Size of the tail window fetched on the first end-relative seek (64 KiB).
///
/// Large enough to cover the end-of-central-directory record plus the whole
/// central directory of most archives in a single fetch.
pub const DEFAULT_BUFFER_SIZE: u64 = 64 * 1024;

/// Maps a member's local-header start offset to its exact length on the wire
/// (header plus payload).
pub type MemberSizeMap = BTreeMap<u64, u64>;

/// Derive the member size map from member start offsets and the central
/// directory's start offset.
///
/// Members are laid out back to back in front of the directory, so sorting
/// all start offsets together with the directory start and taking
/// consecutive deltas gives each member's full wire length. By construction
/// the map values plus the first offset sum to the directory start.
pub fn member_size_map(mut starts: Vec<u64>, directory_start: u64) -> MemberSizeMap {
    starts.sort_unstable();
    starts.push(directory_start);
    starts.windows(2).map(|w| (w[0], w[1] - w[0])).collect()
}

/// A `Read + Seek` view of a remote file.
///
/// At most one [`WindowBuffer`] (and therefore one connection) is alive at a
/// time; the current window is always retired before a replacement is
/// fetched.
///
/// Seeks that leave the current window do not fail: the target is recorded
/// and the next read fetches a window covering it. ZIP parsers probe with
/// chains of speculative seeks, so failing eagerly would break them. Before
/// [`install_member_map`](Self::install_member_map) is called every such
/// recovery fetch is sized to the read request; afterwards fetches are sized
/// to exact member boundaries and arbitrary positions outside any member are
/// rejected.
pub struct RemoteStream<F> {
    fetcher: F,
    initial_buffer_size: u64,
    buffer: Option<WindowBuffer>,
    file_size: Option<u64>,
    seek_resolved: bool,
    member_sizes: Option<MemberSizeMap>,
    last_member_start: Option<u64>,
}

impl<F: RangeFetch> RemoteStream<F> {
    pub fn new(fetcher: F) -> Self {
        Self::with_buffer_size(fetcher, DEFAULT_BUFFER_SIZE)
    }

    /// Use a custom size for the initial tail window.
    pub fn with_buffer_size(fetcher: F, initial_buffer_size: u64) -> Self {
        Self {
            fetcher,
            initial_buffer_size,
            buffer: None,
            file_size: None,
            seek_resolved: false,
            member_sizes: None,
            last_member_start: None,
        }
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    /// Total size of the remote file, known after the first end-relative
    /// seek.
    pub fn file_size(&self) -> Option<u64> {
        self.file_size
    }

    /// Current absolute position.
    ///
    /// After a deferred seek this is the optimistic target position, not a
    /// position inside the current window.
    pub fn position(&self) -> u64 {
        self.buffer.as_ref().map_or(0, WindowBuffer::tell)
    }

    /// Switch from generic fetches to member-exact fetches.
    ///
    /// Called once, after the archive's directory has been read. From here
    /// on a seek miss is recovered by fetching exactly the missed member (or
    /// the remainder of the member fetched last), and nothing else.
    pub fn install_member_map(&mut self, map: MemberSizeMap) {
        self.member_sizes = Some(map);
    }

    /// Drop the current window, releasing its connection.
    pub fn close(&mut self) {
        self.buffer = None;
        self.seek_resolved = false;
    }

    /// Pick the fetch that recovers a deferred seek miss at `position`.
    ///
    /// Returns the fetch length and whether to stream the body.
    fn recovery_fetch(&mut self, position: u64, requested: usize) -> Result<(u64, bool)> {
        let Some(sizes) = &self.member_sizes else {
            // still scanning the directory, fetch exactly what was asked for
            return Ok((requested as u64, false));
        };
        if let Some(&len) = sizes.get(&position) {
            // a corrupt directory can repeat an offset, leaving a zero delta
            if len == 0 {
                return Err(Error::out_of_bound(format!(
                    "zero-length member window at position {position}"
                )));
            }
            self.last_member_start = Some(position);
            return Ok((len, true));
        }
        if let Some(start) = self.last_member_start
            && let Some(&len) = sizes.get(&start)
            && start < position
            && position < start + len
        {
            // continuation read inside the member fetched last
            return Ok((start + len - position, true));
        }
        Err(Error::out_of_bound(format!(
            "position {position} is not the start of a known archive member"
        )))
    }

    fn read_inner(&mut self, buf: &mut [u8]) -> Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        if !self.seek_resolved {
            let position = self.position();
            let (len, stream) = self.recovery_fetch(position, buf.len())?;
            debug!("window miss at {position}, fetching {len} bytes (stream={stream})");
            self.close();
            let window = self
                .fetcher
                .fetch(ByteRange::bounded(position, position + len - 1), stream)?;
            self.buffer = Some(window);
            self.seek_resolved = true;
        }
        self.buffer.as_mut().map_or(Ok(0), |window| window.read(buf))
    }

    fn seek_inner(&mut self, pos: SeekFrom) -> Result<u64> {
        if self.file_size.is_none() && matches!(pos, SeekFrom::End(_)) {
            // first end-relative seek: fetch a tail window to learn the size
            self.close();
            let tail = self
                .fetcher
                .fetch(ByteRange::suffix(self.initial_buffer_size), false)?;
            let size = tail.offset() + tail.size();
            debug!("resolved file size {size} from a {} byte tail window", tail.size());
            self.file_size = Some(size);
            self.buffer = Some(tail);
        }

        let Some(window) = self.buffer.as_mut() else {
            return Err(Error::out_of_bound("seek before any data was fetched"));
        };
        match window.seek(pos) {
            Ok(position) => {
                self.seek_resolved = true;
                Ok(position)
            }
            Err(Error::OutOfBound { .. }) => {
                // deferred: report the optimistic target, recover on next read
                self.seek_resolved = false;
                Ok(window.tell())
            }
            Err(other) => Err(other),
        }
    }
}

impl<F: RangeFetch> Read for RemoteStream<F> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.read_inner(buf).map_err(io::Error::from)
    }
}

impl<F: RangeFetch> Seek for RemoteStream<F> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.seek_inner(pos).map_err(io::Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn consecutive_deltas() {
        let map = member_size_map(vec![0, 120, 340], 600);
        assert_eq!(map, MemberSizeMap::from([(0, 120), (120, 220), (340, 260)]));
        // map values plus the first offset add up to the directory start
        assert_eq!(map.values().sum::<u64>(), 600);
    }

    #[test]
    fn unsorted_offsets_are_sorted_first() {
        let map = member_size_map(vec![340, 0, 120], 600);
        assert_eq!(map, MemberSizeMap::from([(0, 120), (120, 220), (340, 260)]));
    }

    #[test]
    fn empty_archive_gives_empty_map() {
        assert!(member_size_map(Vec::new(), 0).is_empty());
    }
}
