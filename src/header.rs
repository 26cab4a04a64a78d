use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

use crate::error::{KasError, Result};

/// Size in bytes of the fixed file header.
pub const HEADER_SIZE: u64 = 64;

/// KAS magic: same shape as the PNG magic convention (high-bit byte,
/// tag, CR, LF, EOF, LF) so a truncated transfer or text-mode mangling
/// is caught early.
pub const MAGIC: [u8; 8] = [0x89, b'K', b'A', b'S', b'\r', b'\n', 0x1a, b'\n'];

/// Current format major version. The reader accepts any file whose
/// major equals this value; minor is informational only.
pub const VERSION_MAJOR: u16 = 1;
pub const VERSION_MINOR: u16 = 0;

/// The fixed 64-byte file header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub version_major: u16,
    pub version_minor: u16,
    pub num_items: u32,
    pub file_size: u64,
}

impl Header {
    pub fn new(num_items: u32, file_size: u64) -> Self {
        Self {
            version_major: VERSION_MAJOR,
            version_minor: VERSION_MINOR,
            num_items,
            file_size,
        }
    }

    /// Emit exactly [`HEADER_SIZE`] bytes. Reserved bytes are zeroed.
    pub fn write<W: Write>(&self, w: &mut W) -> Result<()> {
        w.write_all(&MAGIC)?;
        w.write_u16::<LittleEndian>(self.version_major)?;
        w.write_u16::<LittleEndian>(self.version_minor)?;
        w.write_u32::<LittleEndian>(self.num_items)?;
        w.write_u64::<LittleEndian>(self.file_size)?;
        w.write_all(&[0u8; 40])?;
        Ok(())
    }

    /// Parse and validate the header from the start of a reader.
    ///
    /// Fails with [`KasError::BadFileFormat`] on short input, bad magic,
    /// or a `file_size` smaller than the header itself;
    /// [`KasError::VersionTooOld`]/[`KasError::VersionTooNew`] on a
    /// major-version mismatch.
    pub fn read<R: Read>(r: &mut R) -> Result<Self> {
        let mut magic = [0u8; 8];
        r.read_exact(&mut magic).map_err(short_read)?;
        if magic != MAGIC {
            return Err(KasError::BadFileFormat("bad magic".into()));
        }

        let version_major = r.read_u16::<LittleEndian>().map_err(short_read)?;
        let version_minor = r.read_u16::<LittleEndian>().map_err(short_read)?;
        let num_items = r.read_u32::<LittleEndian>().map_err(short_read)?;
        let file_size = r.read_u64::<LittleEndian>().map_err(short_read)?;

        let mut reserved = [0u8; 40];
        r.read_exact(&mut reserved).map_err(short_read)?;

        if version_major < VERSION_MAJOR {
            return Err(KasError::VersionTooOld {
                found: version_major,
                supported: VERSION_MAJOR,
            });
        }
        if version_major > VERSION_MAJOR {
            return Err(KasError::VersionTooNew {
                found: version_major,
                supported: VERSION_MAJOR,
            });
        }

        if file_size < HEADER_SIZE {
            return Err(KasError::BadFileFormat(format!(
                "file_size {file_size} is smaller than the header"
            )));
        }

        Ok(Header {
            version_major,
            version_minor,
            num_items,
            file_size,
        })
    }

    /// Parse the header from an in-memory buffer, e.g. a memory map.
    pub fn parse(buf: &[u8]) -> Result<Self> {
        if (buf.len() as u64) < HEADER_SIZE {
            return Err(KasError::BadFileFormat(
                "file is shorter than the 64-byte header".into(),
            ));
        }
        let mut cursor = std::io::Cursor::new(buf);
        Self::read(&mut cursor)
    }
}

/// An EOF while reading a fixed-layout region means the file is
/// truncated/corrupt, not a transient I/O failure — reclassify per the
/// defensive-read policy.
fn short_read(e: std::io::Error) -> KasError {
    if e.kind() == std::io::ErrorKind::UnexpectedEof {
        KasError::BadFileFormat("unexpected end of file while reading header".into())
    } else {
        KasError::Io(e)
    }
}
