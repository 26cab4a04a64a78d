//! Emit a byte-exact KAS file from packed items.
//!
//! Grounded on `casc-storage::archive::archive_writer::ArchiveWriter`:
//! buffered writes, an explicit running offset, and "pad to the next
//! aligned boundary, then write" — generalized here from one caller-
//! supplied alignment constant to the packer's own per-region offsets.

use std::io::Write;

use crate::descriptor::Descriptor;
use crate::error::Result;
use crate::header::Header;
use crate::item::PendingItem;

/// Write the header, descriptor table, key region, and array region (in
/// that order) for an already-[`crate::packer::pack`]ed set of items.
pub fn write_to<W: Write>(items: &[PendingItem<'_>], file_size: u64, w: &mut W) -> Result<()> {
    Header::new(items.len() as u32, file_size).write(w)?;

    for item in items {
        Descriptor {
            element_type: item.element_type,
            key_start: item.key_start,
            key_len: item.key.len() as u64,
            array_start: item.array_start,
            array_len: item.array_len,
        }
        .write(w)?;
    }

    for item in items {
        w.write_all(&item.key)?;
    }

    let mut offset = items
        .iter()
        .map(|item| item.key_start + item.key.len() as u64)
        .max()
        .unwrap_or(crate::header::HEADER_SIZE);

    for item in items {
        let pad = item.array_start - offset;
        debug_assert!(pad < 8, "array alignment padding must stay under 8 bytes");
        if pad > 0 {
            w.write_all(&vec![0u8; pad as usize])?;
        }
        let array_bytes = (item.array_len * item.element_type.width()) as usize;
        w.write_all(&item.array[..array_bytes])?;
        offset = item.array_start + item.array_len * item.element_type.width();
    }

    Ok(())
}
