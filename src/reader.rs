//! Whole-file ingestion: validate the header, acquire a buffer (mapped
//! or owned), and parse + validate the descriptor table.
//!
//! Grounded on `casc-storage::archive::archive_reader::ArchiveReader::open`
//! for the try-mmap-then-fall-back shape, and `hfsplus::lib::HfsVolume::open`
//! for parse-header-then-parse-table sequencing.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};

use memmap2::Mmap;
use tracing::{debug, trace};

use crate::descriptor::{Descriptor, DESCRIPTOR_SIZE};
use crate::error::{KasError, Result};
use crate::header::{Header, HEADER_SIZE};
use crate::item::key_cmp;
use crate::packer::compute_layout;
use crate::types::OpenFlags;

/// The whole-file buffer backing a read-mode store: either a private,
/// read-only memory map or an owned, heap-allocated copy.
pub enum Buffer {
    Mapped(Mmap),
    Owned(Vec<u8>),
}

impl Buffer {
    pub fn as_slice(&self) -> &[u8] {
        match self {
            Buffer::Mapped(mmap) => mmap,
            Buffer::Owned(bytes) => bytes,
        }
    }

    pub fn is_mapped(&self) -> bool {
        matches!(self, Buffer::Mapped(_))
    }
}

/// Everything a validated read-mode open produces.
pub struct Ingested {
    pub header: Header,
    pub buffer: Buffer,
    pub descriptors: Vec<Descriptor>,
}

/// Read and validate the header, acquire the whole-file buffer, parse
/// the descriptor table, and check it is in canonical form.
pub fn ingest(file: &mut File, flags: OpenFlags) -> Result<Ingested> {
    let mut header_bytes = [0u8; HEADER_SIZE as usize];
    file.read_exact(&mut header_bytes).map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            KasError::BadFileFormat("file is shorter than the 64-byte header".into())
        } else {
            KasError::Io(e)
        }
    })?;
    let header = Header::parse(&header_bytes)?;
    debug!(
        num_items = header.num_items,
        file_size = header.file_size,
        "parsed KAS header"
    );

    let buffer = acquire_buffer(file, header.file_size, flags)?;

    let descriptors = parse_descriptors(buffer.as_slice(), &header)?;
    validate_canonical_layout(buffer.as_slice(), &header, &descriptors)?;

    Ok(Ingested {
        header,
        buffer,
        descriptors,
    })
}

fn acquire_buffer(file: &mut File, file_size: u64, flags: OpenFlags) -> Result<Buffer> {
    if !flags.contains(OpenFlags::NO_MMAP) {
        // SAFETY: the file is opened read-only for the exclusive use of
        // this store handle; the library does not coordinate external
        // mutation of the backing file while mapped (see §5).
        match unsafe { memmap2::MmapOptions::new().map(&*file) } {
            Ok(mmap) => {
                if mmap.len() as u64 != file_size {
                    return Err(KasError::BadFileFormat(format!(
                        "mapped length {} does not match header file_size {}",
                        mmap.len(),
                        file_size
                    )));
                }
                trace!("memory-mapped KAS file");
                return Ok(Buffer::Mapped(mmap));
            }
            Err(e) => {
                debug!("memory mapping unavailable, falling back to buffered read: {e}");
            }
        }
    }

    let actual_len = file.metadata()?.len();
    if actual_len != file_size {
        return Err(KasError::BadFileFormat(format!(
            "file length {actual_len} does not match header file_size {file_size}"
        )));
    }

    file.seek(SeekFrom::Start(0))?;
    let mut bytes = vec![0u8; file_size as usize];
    match file.read_exact(&mut bytes) {
        Ok(()) => Ok(Buffer::Owned(bytes)),
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Err(KasError::BadFileFormat(
            "file is shorter than its own declared file_size".into(),
        )),
        Err(e) => Err(KasError::Io(e)),
    }
}

fn parse_descriptors(buf: &[u8], header: &Header) -> Result<Vec<Descriptor>> {
    let mut descriptors = Vec::with_capacity(header.num_items as usize);
    if header.num_items == 0 {
        return Ok(descriptors);
    }

    let table_start = HEADER_SIZE as usize;
    let table_end = table_start + header.num_items as usize * DESCRIPTOR_SIZE as usize;
    if table_end as u64 > header.file_size {
        return Err(KasError::BadFileFormat(
            "descriptor table extends past file_size".into(),
        ));
    }

    let mut cursor = std::io::Cursor::new(&buf[table_start..table_end]);
    for _ in 0..header.num_items {
        descriptors.push(Descriptor::read(&mut cursor, header.file_size)?);
    }
    Ok(descriptors)
}

/// Recompute expected offsets for every descriptor in file order and
/// compare them to what is actually on disk; any mismatch means the
/// file is not in canonical form (overlapping items, holes beyond
/// alignment padding, or out-of-order keys) and is rejected.
fn validate_canonical_layout(buf: &[u8], header: &Header, descriptors: &[Descriptor]) -> Result<()> {
    let shapes: Vec<_> = descriptors
        .iter()
        .map(|d| (d.key_len, d.element_type, d.array_len))
        .collect();
    let (expected, expected_file_size) = compute_layout(header.num_items as u64, &shapes);

    if expected_file_size != header.file_size {
        return Err(KasError::BadFileFormat(format!(
            "expected file_size {expected_file_size}, header says {}",
            header.file_size
        )));
    }

    let mut previous_key: Option<&[u8]> = None;
    for (descriptor, expected) in descriptors.iter().zip(&expected) {
        if descriptor.key_start != expected.key_start || descriptor.array_start != expected.array_start {
            return Err(KasError::BadFileFormat(format!(
                "non-canonical layout: expected key_start={} array_start={}, found key_start={} array_start={}",
                expected.key_start, expected.array_start, descriptor.key_start, descriptor.array_start
            )));
        }

        let key = &buf[descriptor.key_start as usize..(descriptor.key_start + descriptor.key_len) as usize];
        if key.is_empty() {
            return Err(KasError::BadFileFormat("empty key in descriptor table".into()));
        }
        if let Some(prev) = previous_key {
            if key_cmp(prev, key) != std::cmp::Ordering::Less {
                return Err(KasError::BadFileFormat(
                    "descriptor table is not sorted by key".into(),
                ));
            }
        }
        previous_key = Some(key);
    }

    Ok(())
}
