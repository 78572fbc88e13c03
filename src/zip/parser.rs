//! Central directory discovery and parsing.
//!
//! ZIP files are read from the end: the End of Central Directory record
//! sits at the tail, points at the central directory, and the directory in
//! turn points at every member's local header.
//!
//! The parser drives any `Read + Seek` stream and only issues large,
//! localized reads: one window at the tail for the trailer scan and a single
//! read for the whole directory. Over a [`RemoteStream`](crate::io::RemoteStream)
//! that keeps the bootstrap down to a handful of ranged fetches.

use std::io::{Cursor, Read, Seek, SeekFrom};

use super::structures::{
    EndOfCentralDirectory, MemberEntry, Zip64EndOfCentralDirectory, Zip64Locator,
};
use crate::error::{Error, Result};

/// Maximum size of the trailing archive comment (format limit).
const MAX_COMMENT_SIZE: u64 = 65_535;

/// The parsed central directory plus its start offset in the archive.
pub struct Directory {
    pub entries: Vec<MemberEntry>,
    /// Absolute offset where the central directory begins. Everything before
    /// it is member data.
    pub start: u64,
}

/// Read the central directory of a ZIP archive.
pub fn read_directory<R: Read + Seek>(reader: &mut R) -> Result<Directory> {
    let file_size = reader.seek(SeekFrom::End(0))?;
    let (eocd, eocd_offset) = find_trailer(reader, file_size)?;

    let (start, size, total_entries) = if eocd.needs_zip64() {
        let trailer = read_zip64_trailer(reader, eocd_offset)?;
        (
            trailer.directory_start,
            trailer.directory_size,
            trailer.total_entries,
        )
    } else {
        (
            eocd.directory_start as u64,
            eocd.directory_size as u64,
            eocd.total_entries as u64,
        )
    };

    reader.seek(SeekFrom::Start(start))?;
    let mut raw = vec![0u8; size as usize];
    reader.read_exact(&mut raw)?;

    let mut cursor = Cursor::new(raw.as_slice());
    let mut entries = Vec::with_capacity(total_entries as usize);
    for _ in 0..total_entries {
        entries.push(MemberEntry::read_from(&mut cursor)?);
    }
    Ok(Directory { entries, start })
}

/// Locate and parse the End of Central Directory record.
///
/// Returns the record and its absolute offset. The common case (no trailing
/// comment) is checked first; otherwise the last 64 KiB are scanned
/// backwards for a signature whose comment length field reaches exactly to
/// the end of the file.
fn find_trailer<R: Read + Seek>(
    reader: &mut R,
    file_size: u64,
) -> Result<(EndOfCentralDirectory, u64)> {
    const EOCD_SIZE: usize = EndOfCentralDirectory::SIZE;
    if file_size < EOCD_SIZE as u64 {
        return Err(Error::Format("file too small to be a zip archive".into()));
    }

    reader.seek(SeekFrom::End(-(EOCD_SIZE as i64)))?;
    let mut tail = [0u8; EOCD_SIZE];
    reader.read_exact(&mut tail)?;
    if tail[..4] == EndOfCentralDirectory::SIGNATURE && tail[20..22] == [0, 0] {
        let offset = file_size - EOCD_SIZE as u64;
        return Ok((EndOfCentralDirectory::parse(&tail)?, offset));
    }

    let span = (MAX_COMMENT_SIZE + EOCD_SIZE as u64).min(file_size);
    let span_start = file_size - span;
    reader.seek(SeekFrom::Start(span_start))?;
    let mut window = vec![0u8; span as usize];
    reader.read_exact(&mut window)?;

    for i in (0..=window.len() - EOCD_SIZE).rev() {
        if window[i..i + 4] != EndOfCentralDirectory::SIGNATURE {
            continue;
        }
        let comment_len = u16::from_le_bytes([window[i + 20], window[i + 21]]) as usize;
        if i + EOCD_SIZE + comment_len == window.len() {
            let eocd = EndOfCentralDirectory::parse(&window[i..i + EOCD_SIZE])?;
            return Ok((eocd, span_start + i as u64));
        }
    }
    Err(Error::Format(
        "end of central directory signature not found".into(),
    ))
}

/// Read the ZIP64 trailer via its locator, which sits immediately before
/// the classic End of Central Directory record.
fn read_zip64_trailer<R: Read + Seek>(
    reader: &mut R,
    eocd_offset: u64,
) -> Result<Zip64EndOfCentralDirectory> {
    let locator_offset = eocd_offset
        .checked_sub(Zip64Locator::SIZE as u64)
        .ok_or_else(|| Error::Format("zip64 locator missing".into()))?;
    reader.seek(SeekFrom::Start(locator_offset))?;
    let mut raw = [0u8; Zip64Locator::SIZE];
    reader.read_exact(&mut raw)?;
    let locator = Zip64Locator::parse(&raw)?;

    reader.seek(SeekFrom::Start(locator.trailer_offset))?;
    let mut raw = [0u8; Zip64EndOfCentralDirectory::MIN_SIZE];
    reader.read_exact(&mut raw)?;
    Zip64EndOfCentralDirectory::parse(&raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    // byte-level fixtures live in tests/; these cover the trailer scan edges

    fn minimal_archive(comment: &[u8]) -> Vec<u8> {
        let mut raw = Vec::new();
        raw.extend_from_slice(&EndOfCentralDirectory::SIGNATURE);
        raw.extend_from_slice(&[0; 16]); // empty archive: zero entries at offset 0
        raw.extend_from_slice(&(comment.len() as u16).to_le_bytes());
        raw.extend_from_slice(comment);
        raw
    }

    #[test]
    fn empty_archive_without_comment() {
        let mut cursor = Cursor::new(minimal_archive(b""));
        let directory = read_directory(&mut cursor).unwrap();
        assert!(directory.entries.is_empty());
        assert_eq!(directory.start, 0);
    }

    #[test]
    fn trailer_found_behind_comment() {
        let mut cursor = Cursor::new(minimal_archive(b"built by tests"));
        let directory = read_directory(&mut cursor).unwrap();
        assert!(directory.entries.is_empty());
    }

    #[test]
    fn garbage_is_rejected() {
        let mut cursor = Cursor::new(vec![0u8; 64]);
        assert!(matches!(
            read_directory(&mut cursor),
            Err(Error::Format(_))
        ));
        let mut tiny = Cursor::new(vec![0u8; 4]);
        assert!(matches!(read_directory(&mut tiny), Err(Error::Format(_))));
    }
}
