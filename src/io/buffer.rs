//! Bounded, file-like view over one fetched byte range.

use std::io::{self, Cursor, Read, SeekFrom};

use crate::error::{Error, Result};

/// Backing data for a window: either fully materialized bytes or a live
/// forward cursor over a response body that is still arriving.
enum Source {
    /// Whole body in memory; seeks in any direction are free.
    Buffered(Cursor<Vec<u8>>),
    /// Body consumed lazily; the cursor can only move forward.
    Streaming { body: Box<dyn Read>, consumed: u64 },
}

/// One fetched byte window of the remote file.
///
/// The buffer knows its absolute placement in the full file and behaves like
/// a file whose readable part is just that window: positions are absolute,
/// and any read or seek that would leave the window fails instead of
/// clamping. The owner uses that failure as the signal to fetch a new window.
///
/// Dropping the buffer releases the underlying transport connection.
pub struct WindowBuffer {
    source: Source,
    offset: u64,
    size: u64,
    position: u64,
}

impl WindowBuffer {
    /// Window over fully materialized bytes starting at `offset`.
    pub fn buffered(data: Vec<u8>, offset: u64) -> Self {
        let size = data.len() as u64;
        Self {
            source: Source::Buffered(Cursor::new(data)),
            offset,
            size,
            position: offset,
        }
    }

    /// Window over a live body of `size` bytes starting at `offset`.
    pub fn streaming(body: Box<dyn Read>, offset: u64, size: u64) -> Self {
        Self {
            source: Source::Streaming { body, consumed: 0 },
            offset,
            size,
            position: offset,
        }
    }

    /// Absolute offset of the window's first byte.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Number of bytes in the window.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Absolute offset one past the window's last byte.
    pub fn end(&self) -> u64 {
        self.offset + self.size
    }

    /// Current absolute position.
    ///
    /// After a failed seek this reports the position the caller asked for,
    /// which may lie outside the window; see [`seek`](Self::seek).
    pub fn tell(&self) -> u64 {
        self.position
    }

    /// Bytes left between the current position and the end of the window.
    pub fn remaining(&self) -> u64 {
        self.end().saturating_sub(self.position)
    }

    pub fn is_streaming(&self) -> bool {
        matches!(self.source, Source::Streaming { .. })
    }

    /// Read from the current position, never past the end of the window.
    ///
    /// Returns `Ok(0)` once the window is exhausted; continuing past it is
    /// the owner's job, by fetching the next window.
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let want = (buf.len() as u64).min(self.remaining()) as usize;
        if want == 0 {
            return Ok(0);
        }
        let n = match &mut self.source {
            Source::Buffered(cursor) => cursor.read(&mut buf[..want]).map_err(Error::Io)?,
            Source::Streaming { body, consumed } => {
                let n = body.read(&mut buf[..want]).map_err(Error::Io)?;
                *consumed += n as u64;
                n
            }
        };
        self.position += n as u64;
        Ok(n)
    }

    /// Move the position within the window.
    ///
    /// `SeekFrom::End` is relative to the end of the window. A target outside
    /// `[offset, offset + size)` still records the candidate position before
    /// failing with [`Error::OutOfBound`], so the owner can observe where the
    /// caller wanted to go and fetch a fresh window there. On a streaming
    /// window, moving backward over already-consumed bytes fails the same
    /// way (the cursor cannot rewind); forward motion skips by reading.
    pub fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        let candidate = match pos {
            SeekFrom::Start(p) => p as i128,
            SeekFrom::Current(delta) => self.position as i128 + delta as i128,
            SeekFrom::End(delta) => self.end() as i128 + delta as i128,
        };
        if candidate < 0 {
            return Err(Error::out_of_bound(format!(
                "seek to negative position {candidate}"
            )));
        }
        self.position = candidate as u64;
        if self.position < self.offset || self.position >= self.end() {
            return Err(Error::out_of_bound(format!(
                "position {} outside window {}..{}",
                self.position,
                self.offset,
                self.end()
            )));
        }

        let relative = self.position - self.offset;
        match &mut self.source {
            Source::Buffered(cursor) => cursor.set_position(relative),
            Source::Streaming { body, consumed } => {
                if relative < *consumed {
                    return Err(Error::out_of_bound(
                        "backward seek on a streaming window",
                    ));
                }
                let skip = relative - *consumed;
                if skip > 0 {
                    let mut ahead = body.as_mut().take(skip);
                    let skipped = io::copy(&mut ahead, &mut io::sink()).map_err(Error::Io)?;
                    *consumed += skipped;
                }
            }
        }
        Ok(self.position)
    }
}
