use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

use crate::error::{KasError, Result};
use crate::types::ElementType;

/// Size in bytes of one on-disk descriptor record.
pub const DESCRIPTOR_SIZE: u64 = 64;

/// The fixed 64-byte on-disk record describing one item's type, offsets,
/// and lengths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Descriptor {
    pub element_type: ElementType,
    pub key_start: u64,
    pub key_len: u64,
    pub array_start: u64,
    pub array_len: u64,
}

impl Descriptor {
    /// Emit exactly [`DESCRIPTOR_SIZE`] bytes. Reserved bytes are zeroed.
    pub fn write<W: Write>(&self, w: &mut W) -> Result<()> {
        w.write_u8(self.element_type.code())?;
        w.write_all(&[0u8; 7])?;
        w.write_u64::<LittleEndian>(self.key_start)?;
        w.write_u64::<LittleEndian>(self.key_len)?;
        w.write_u64::<LittleEndian>(self.array_start)?;
        w.write_u64::<LittleEndian>(self.array_len)?;
        w.write_all(&[0u8; 24])?;
        Ok(())
    }

    /// Parse one descriptor and validate its bounds against `file_size`.
    ///
    /// Rejects a `type` code >= 8 with [`KasError::BadType`] and any
    /// offset/length pair that would reach past `file_size` with
    /// [`KasError::BadFileFormat`].
    pub fn read<R: Read>(r: &mut R, file_size: u64) -> Result<Self> {
        let type_code = r.read_u8().map_err(short_read)?;
        let mut reserved = [0u8; 7];
        r.read_exact(&mut reserved).map_err(short_read)?;
        let key_start = r.read_u64::<LittleEndian>().map_err(short_read)?;
        let key_len = r.read_u64::<LittleEndian>().map_err(short_read)?;
        let array_start = r.read_u64::<LittleEndian>().map_err(short_read)?;
        let array_len = r.read_u64::<LittleEndian>().map_err(short_read)?;
        let mut trailing = [0u8; 24];
        r.read_exact(&mut trailing).map_err(short_read)?;

        let element_type = ElementType::try_from(type_code)?;

        let key_end = key_start
            .checked_add(key_len)
            .ok_or_else(|| KasError::BadFileFormat("key region overflows u64".into()))?;
        if key_end > file_size {
            return Err(KasError::BadFileFormat(format!(
                "key region [{key_start}, {key_end}) exceeds file_size {file_size}"
            )));
        }

        let array_bytes = array_len
            .checked_mul(element_type.width())
            .ok_or_else(|| KasError::BadFileFormat("array region overflows u64".into()))?;
        let array_end = array_start
            .checked_add(array_bytes)
            .ok_or_else(|| KasError::BadFileFormat("array region overflows u64".into()))?;
        if array_end > file_size {
            return Err(KasError::BadFileFormat(format!(
                "array region [{array_start}, {array_end}) exceeds file_size {file_size}"
            )));
        }

        Ok(Descriptor {
            element_type,
            key_start,
            key_len,
            array_start,
            array_len,
        })
    }
}

fn short_read(e: std::io::Error) -> KasError {
    if e.kind() == std::io::ErrorKind::UnexpectedEof {
        KasError::BadFileFormat("unexpected end of file while reading a descriptor".into())
    } else {
        KasError::Io(e)
    }
}
