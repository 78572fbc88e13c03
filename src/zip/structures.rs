//! On-disk ZIP structures: signatures, trailer records and directory entries.

use byteorder::{LittleEndian, ReadBytesExt};
use std::io::{Cursor, Read};

use crate::error::{Error, Result};

/// ZIP compression methods this crate understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMethod {
    Stored,
    Deflate,
    Unknown(u16),
}

impl CompressionMethod {
    pub fn from_u16(value: u16) -> Self {
        match value {
            0 => CompressionMethod::Stored,
            8 => CompressionMethod::Deflate,
            _ => CompressionMethod::Unknown(value),
        }
    }

    pub fn as_u16(&self) -> u16 {
        match self {
            CompressionMethod::Stored => 0,
            CompressionMethod::Deflate => 8,
            CompressionMethod::Unknown(v) => *v,
        }
    }
}

/// Local file header signature (`PK\x03\x04`) and fixed-part size.
pub const LOCAL_HEADER_SIGNATURE: [u8; 4] = *b"PK\x03\x04";
pub const LOCAL_HEADER_SIZE: usize = 30;

/// Central directory file header signature (`PK\x01\x02`).
pub const DIRECTORY_ENTRY_SIGNATURE: [u8; 4] = *b"PK\x01\x02";

/// End of Central Directory record - 22 bytes plus an optional comment.
pub struct EndOfCentralDirectory {
    pub disk_number: u16,
    pub disk_with_directory: u16,
    pub disk_entries: u16,
    pub total_entries: u16,
    pub directory_size: u32,
    pub directory_start: u32,
    pub comment_len: u16,
}

impl EndOfCentralDirectory {
    pub const SIGNATURE: [u8; 4] = *b"PK\x05\x06";
    pub const SIZE: usize = 22;

    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < Self::SIZE || data[..4] != Self::SIGNATURE {
            return Err(Error::Format(
                "invalid end of central directory record".into(),
            ));
        }

        let mut cursor = Cursor::new(&data[4..]);
        Ok(Self {
            disk_number: cursor.read_u16::<LittleEndian>().map_err(Error::Io)?,
            disk_with_directory: cursor.read_u16::<LittleEndian>().map_err(Error::Io)?,
            disk_entries: cursor.read_u16::<LittleEndian>().map_err(Error::Io)?,
            total_entries: cursor.read_u16::<LittleEndian>().map_err(Error::Io)?,
            directory_size: cursor.read_u32::<LittleEndian>().map_err(Error::Io)?,
            directory_start: cursor.read_u32::<LittleEndian>().map_err(Error::Io)?,
            comment_len: cursor.read_u16::<LittleEndian>().map_err(Error::Io)?,
        })
    }

    /// Whether any field overflowed into ZIP64 territory.
    pub fn needs_zip64(&self) -> bool {
        self.disk_entries == 0xFFFF
            || self.total_entries == 0xFFFF
            || self.directory_size == 0xFFFF_FFFF
            || self.directory_start == 0xFFFF_FFFF
    }
}

/// ZIP64 End of Central Directory Locator - 20 bytes.
pub struct Zip64Locator {
    pub disk_with_trailer: u32,
    pub trailer_offset: u64,
    pub total_disks: u32,
}

impl Zip64Locator {
    pub const SIGNATURE: [u8; 4] = *b"PK\x06\x07";
    pub const SIZE: usize = 20;

    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < Self::SIZE || data[..4] != Self::SIGNATURE {
            return Err(Error::Format("invalid zip64 locator".into()));
        }

        let mut cursor = Cursor::new(&data[4..]);
        Ok(Self {
            disk_with_trailer: cursor.read_u32::<LittleEndian>().map_err(Error::Io)?,
            trailer_offset: cursor.read_u64::<LittleEndian>().map_err(Error::Io)?,
            total_disks: cursor.read_u32::<LittleEndian>().map_err(Error::Io)?,
        })
    }
}

/// ZIP64 End of Central Directory record - 56 bytes minimum.
pub struct Zip64EndOfCentralDirectory {
    pub record_size: u64,
    pub version_made_by: u16,
    pub version_needed: u16,
    pub disk_number: u32,
    pub disk_with_directory: u32,
    pub disk_entries: u64,
    pub total_entries: u64,
    pub directory_size: u64,
    pub directory_start: u64,
}

impl Zip64EndOfCentralDirectory {
    pub const SIGNATURE: [u8; 4] = *b"PK\x06\x06";
    pub const MIN_SIZE: usize = 56;

    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < Self::MIN_SIZE || data[..4] != Self::SIGNATURE {
            return Err(Error::Format(
                "invalid zip64 end of central directory record".into(),
            ));
        }

        let mut cursor = Cursor::new(&data[4..]);
        Ok(Self {
            record_size: cursor.read_u64::<LittleEndian>().map_err(Error::Io)?,
            version_made_by: cursor.read_u16::<LittleEndian>().map_err(Error::Io)?,
            version_needed: cursor.read_u16::<LittleEndian>().map_err(Error::Io)?,
            disk_number: cursor.read_u32::<LittleEndian>().map_err(Error::Io)?,
            disk_with_directory: cursor.read_u32::<LittleEndian>().map_err(Error::Io)?,
            disk_entries: cursor.read_u64::<LittleEndian>().map_err(Error::Io)?,
            total_entries: cursor.read_u64::<LittleEndian>().map_err(Error::Io)?,
            directory_size: cursor.read_u64::<LittleEndian>().map_err(Error::Io)?,
            directory_start: cursor.read_u64::<LittleEndian>().map_err(Error::Io)?,
        })
    }
}

/// One member of the archive, as described by its central directory entry.
#[derive(Debug, Clone)]
pub struct MemberEntry {
    pub name: String,
    pub compression: CompressionMethod,
    pub compressed_size: u64,
    pub uncompressed_size: u64,
    pub crc32: u32,
    /// Absolute offset of the member's local file header.
    pub header_offset: u64,
    pub last_mod_time: u16,
    pub last_mod_date: u16,
    pub is_directory: bool,
}

impl MemberEntry {
    /// Parse one central directory file header from a cursor positioned at
    /// its signature, leaving the cursor at the next entry.
    ///
    /// ZIP64 extended fields (extra field id `0x0001`) override any 32-bit
    /// sizes or offsets that overflowed.
    pub fn read_from(cursor: &mut Cursor<&[u8]>) -> Result<Self> {
        let mut signature = [0u8; 4];
        cursor.read_exact(&mut signature).map_err(Error::Io)?;
        if signature != DIRECTORY_ENTRY_SIGNATURE {
            return Err(Error::Format("invalid central directory entry".into()));
        }

        let read_err = Error::Io;
        let _version_made_by = cursor.read_u16::<LittleEndian>().map_err(read_err)?;
        let _version_needed = cursor.read_u16::<LittleEndian>().map_err(read_err)?;
        let _flags = cursor.read_u16::<LittleEndian>().map_err(read_err)?;
        let method = cursor.read_u16::<LittleEndian>().map_err(read_err)?;
        let last_mod_time = cursor.read_u16::<LittleEndian>().map_err(read_err)?;
        let last_mod_date = cursor.read_u16::<LittleEndian>().map_err(read_err)?;
        let crc32 = cursor.read_u32::<LittleEndian>().map_err(read_err)?;
        let mut compressed_size = cursor.read_u32::<LittleEndian>().map_err(read_err)? as u64;
        let mut uncompressed_size = cursor.read_u32::<LittleEndian>().map_err(read_err)? as u64;
        let name_len = cursor.read_u16::<LittleEndian>().map_err(read_err)?;
        let extra_len = cursor.read_u16::<LittleEndian>().map_err(read_err)?;
        let comment_len = cursor.read_u16::<LittleEndian>().map_err(read_err)?;
        let _disk_number_start = cursor.read_u16::<LittleEndian>().map_err(read_err)?;
        let _internal_attrs = cursor.read_u16::<LittleEndian>().map_err(read_err)?;
        let _external_attrs = cursor.read_u32::<LittleEndian>().map_err(read_err)?;
        let mut header_offset = cursor.read_u32::<LittleEndian>().map_err(read_err)? as u64;

        let mut name_bytes = vec![0u8; name_len as usize];
        cursor.read_exact(&mut name_bytes).map_err(Error::Io)?;
        // lossy conversion keeps non-UTF8 names readable instead of failing
        let name = String::from_utf8_lossy(&name_bytes).to_string();
        let is_directory = name.ends_with('/');

        let extra_end = cursor.position() + extra_len as u64;
        while cursor.position() + 4 <= extra_end {
            let field_id = cursor.read_u16::<LittleEndian>().map_err(read_err)?;
            let field_size = cursor.read_u16::<LittleEndian>().map_err(read_err)?;

            if field_id == 0x0001 {
                // fields are present only when the 32-bit value overflowed
                if uncompressed_size == 0xFFFF_FFFF && cursor.position() + 8 <= extra_end {
                    uncompressed_size = cursor.read_u64::<LittleEndian>().map_err(read_err)?;
                }
                if compressed_size == 0xFFFF_FFFF && cursor.position() + 8 <= extra_end {
                    compressed_size = cursor.read_u64::<LittleEndian>().map_err(read_err)?;
                }
                if header_offset == 0xFFFF_FFFF && cursor.position() + 8 <= extra_end {
                    header_offset = cursor.read_u64::<LittleEndian>().map_err(read_err)?;
                }
                break;
            }
            cursor.set_position(cursor.position() + field_size as u64);
        }
        cursor.set_position(extra_end + comment_len as u64);

        Ok(Self {
            name,
            compression: CompressionMethod::from_u16(method),
            compressed_size,
            uncompressed_size,
            crc32,
            header_offset,
            last_mod_time,
            last_mod_date,
            is_directory,
        })
    }

    /// Modification date as (year, month, day), from the DOS date field.
    pub fn mod_date(&self) -> (u16, u8, u8) {
        let day = (self.last_mod_date & 0x1F) as u8;
        let month = ((self.last_mod_date >> 5) & 0x0F) as u8;
        let year = ((self.last_mod_date >> 9) & 0x7F) + 1980;
        (year, month, day)
    }

    /// Modification time as (hour, minute, second), from the DOS time field.
    pub fn mod_time(&self) -> (u8, u8, u8) {
        let second = ((self.last_mod_time & 0x1F) * 2) as u8;
        let minute = ((self.last_mod_time >> 5) & 0x3F) as u8;
        let hour = ((self.last_mod_time >> 11) & 0x1F) as u8;
        (hour, minute, second)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use byteorder::WriteBytesExt;
    use std::io::Write;

    fn sample_eocd() -> Vec<u8> {
        let mut raw = Vec::new();
        raw.extend_from_slice(&EndOfCentralDirectory::SIGNATURE);
        raw.write_u16::<LittleEndian>(0).unwrap(); // disk number
        raw.write_u16::<LittleEndian>(0).unwrap(); // disk with directory
        raw.write_u16::<LittleEndian>(3).unwrap(); // entries on this disk
        raw.write_u16::<LittleEndian>(3).unwrap(); // total entries
        raw.write_u32::<LittleEndian>(150).unwrap(); // directory size
        raw.write_u32::<LittleEndian>(600).unwrap(); // directory start
        raw.write_u16::<LittleEndian>(0).unwrap(); // comment length
        raw
    }

    #[test]
    fn parses_eocd() {
        let eocd = EndOfCentralDirectory::parse(&sample_eocd()).unwrap();
        assert_eq!(eocd.total_entries, 3);
        assert_eq!(eocd.directory_size, 150);
        assert_eq!(eocd.directory_start, 600);
        assert!(!eocd.needs_zip64());
    }

    #[test]
    fn rejects_bad_signature() {
        let mut raw = sample_eocd();
        raw[0] = b'Q';
        assert!(matches!(
            EndOfCentralDirectory::parse(&raw),
            Err(Error::Format(_))
        ));
    }

    #[test]
    fn overflowed_fields_request_zip64() {
        let mut raw = sample_eocd();
        raw[16..20].copy_from_slice(&0xFFFF_FFFFu32.to_le_bytes());
        assert!(EndOfCentralDirectory::parse(&raw).unwrap().needs_zip64());
    }

    #[test]
    fn parses_directory_entry_with_zip64_extra() {
        let mut raw = Vec::new();
        raw.extend_from_slice(&DIRECTORY_ENTRY_SIGNATURE);
        raw.write_u16::<LittleEndian>(20).unwrap(); // version made by
        raw.write_u16::<LittleEndian>(45).unwrap(); // version needed
        raw.write_u16::<LittleEndian>(0).unwrap(); // flags
        raw.write_u16::<LittleEndian>(0).unwrap(); // method: stored
        raw.write_u16::<LittleEndian>(0x6000).unwrap(); // time
        raw.write_u16::<LittleEndian>(0x5A21).unwrap(); // date
        raw.write_u32::<LittleEndian>(0xDEADBEEF).unwrap(); // crc32
        raw.write_u32::<LittleEndian>(9).unwrap(); // compressed size
        raw.write_u32::<LittleEndian>(9).unwrap(); // uncompressed size
        raw.write_u16::<LittleEndian>(5).unwrap(); // name length
        raw.write_u16::<LittleEndian>(12).unwrap(); // extra length
        raw.write_u16::<LittleEndian>(0).unwrap(); // comment length
        raw.write_u16::<LittleEndian>(0).unwrap(); // disk number start
        raw.write_u16::<LittleEndian>(0).unwrap(); // internal attrs
        raw.write_u32::<LittleEndian>(0).unwrap(); // external attrs
        raw.write_u32::<LittleEndian>(0xFFFF_FFFF).unwrap(); // header offset: overflowed
        raw.write_all(b"a.txt").unwrap();
        raw.write_u16::<LittleEndian>(0x0001).unwrap(); // zip64 extra field
        raw.write_u16::<LittleEndian>(8).unwrap();
        raw.write_u64::<LittleEndian>(0x1_0000_0010).unwrap(); // real header offset

        let mut cursor = Cursor::new(raw.as_slice());
        let entry = MemberEntry::read_from(&mut cursor).unwrap();
        assert_eq!(entry.name, "a.txt");
        assert_eq!(entry.compression, CompressionMethod::Stored);
        assert_eq!(entry.header_offset, 0x1_0000_0010);
        assert_eq!(entry.crc32, 0xDEADBEEF);
        assert!(!entry.is_directory);
        assert_eq!(cursor.position(), raw.len() as u64);
    }
}
