//! The `Store` facade: open/close lifecycle, `put`, `get`.
//!
//! Grounded on `hfsplus::lib::HfsVolume<R>` for gating every operation
//! behind a single owned facade type, and on `casc-storage`'s split
//! between "accumulate then flush" (write) and "ingest then serve
//! lookups" (read) responsibilities living on one type across its
//! lifetime.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write as _};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::descriptor::Descriptor;
use crate::error::{KasError, Result};
use crate::item::{key_cmp, Item, PendingItem};
use crate::packer::pack;
use crate::reader::{self, Buffer};
use crate::types::{ElementType, OpenFlags};
use crate::writer;

enum Mode<'a> {
    Write {
        path: PathBuf,
        items: Vec<PendingItem<'a>>,
    },
    Read {
        descriptors: Vec<Descriptor>,
        buffer: Buffer,
    },
}

/// A KAS store handle, open in either write or read mode.
///
/// `Uninitialized -> Open(Read | Write) -> Closed` is encoded as owned
/// value transitions: [`Store::create`]/[`Store::open`] produce an open
/// store, and [`Store::close`] consumes it by value, so operating on a
/// closed store is a compile error rather than a runtime state check.
pub struct Store<'a> {
    mode: Mode<'a>,
}

impl<'a> Store<'a> {
    /// Begin a new write-mode store. Nothing reaches disk until
    /// [`Store::close`] — items accumulate in memory via [`Store::put`].
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Store<'a>> {
        debug!(path = %path.as_ref().display(), "creating KAS store (write mode)");
        Ok(Store {
            mode: Mode::Write {
                path: path.as_ref().to_path_buf(),
                items: Vec::new(),
            },
        })
    }

    /// Open an existing store for reading. Validates the header, acquires
    /// a whole-file buffer (mapped unless `flags` contains
    /// [`OpenFlags::NO_MMAP`]), and parses + validates the descriptor
    /// table, all before returning.
    pub fn open<P: AsRef<Path>>(path: P, flags: OpenFlags) -> Result<Store<'static>> {
        debug!(path = %path.as_ref().display(), "opening KAS store (read mode)");
        let mut file = File::open(path)?;
        let ingested = reader::ingest(&mut file, flags)?;
        Ok(Store {
            mode: Mode::Read {
                descriptors: ingested.descriptors,
                buffer: ingested.buffer,
            },
        })
    }

    /// Insert one (key, array) item. Write mode only.
    ///
    /// `array`'s backing storage must outlive this store. `flags` is
    /// reserved and must be `0`.
    pub fn put(
        &mut self,
        key: &[u8],
        type_code: u8,
        array: &'a [u8],
        array_len: u64,
        flags: u32,
    ) -> Result<()> {
        if flags != 0 {
            return Err(KasError::BadMode);
        }
        let element_type = ElementType::try_from(type_code)?;
        if key.is_empty() {
            return Err(KasError::EmptyKey);
        }
        let expected = array_len * element_type.width();
        if array.len() as u64 != expected {
            return Err(KasError::ArrayLengthMismatch {
                expected,
                actual: array.len() as u64,
                array_len,
                width: element_type.width(),
            });
        }

        let items = match &mut self.mode {
            Mode::Write { items, .. } => items,
            Mode::Read { .. } => return Err(KasError::BadMode),
        };

        if items.iter().any(|existing| &*existing.key == key) {
            return Err(KasError::DuplicateKey);
        }

        items.push(PendingItem::new(key, element_type, array, array_len));
        Ok(())
    }

    /// Look up a key. Read mode only. Binary searches the sorted
    /// descriptor table using the same comparator the packer sorted by.
    pub fn get(&self, key: &[u8]) -> Result<Item<'_>> {
        let (descriptors, buffer) = match &self.mode {
            Mode::Read { descriptors, buffer } => (descriptors, buffer),
            Mode::Write { .. } => return Err(KasError::BadMode),
        };

        let buf = buffer.as_slice();
        let idx = descriptors
            .binary_search_by(|d| {
                let candidate = &buf[d.key_start as usize..(d.key_start + d.key_len) as usize];
                key_cmp(candidate, key)
            })
            .map_err(|_| KasError::KeyNotFound)?;

        let d = &descriptors[idx];
        let k = &buf[d.key_start as usize..(d.key_start + d.key_len) as usize];
        let array_bytes = d.array_len * d.element_type.width();
        let a = &buf[d.array_start as usize..(d.array_start + array_bytes) as usize];

        Ok(Item {
            key: k,
            element_type: d.element_type,
            array: a,
            array_len: d.array_len,
            key_start: d.key_start,
            array_start: d.array_start,
        })
    }

    /// Number of items currently in the store (accumulated `put`s in
    /// write mode, parsed descriptors in read mode).
    pub fn len(&self) -> usize {
        match &self.mode {
            Mode::Write { items, .. } => items.len(),
            Mode::Read { descriptors, .. } => descriptors.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the read-mode buffer is memory-mapped rather than
    /// heap-allocated. Always `false` in write mode.
    pub fn is_memory_mapped(&self) -> bool {
        matches!(&self.mode, Mode::Read { buffer, .. } if buffer.is_mapped())
    }

    /// Iterate all items in ascending key order. Read mode only.
    pub fn iter(&self) -> impl Iterator<Item = Item<'_>> {
        let (descriptors, buffer) = match &self.mode {
            Mode::Read { descriptors, buffer } => (descriptors.as_slice(), Some(buffer)),
            Mode::Write { .. } => (&[][..], None),
        };
        let buf = buffer.map(Buffer::as_slice).unwrap_or(&[]);
        descriptors.iter().map(move |d| {
            let k = &buf[d.key_start as usize..(d.key_start + d.key_len) as usize];
            let array_bytes = d.array_len * d.element_type.width();
            let a = &buf[d.array_start as usize..(d.array_start + array_bytes) as usize];
            Item {
                key: k,
                element_type: d.element_type,
                array: a,
                array_len: d.array_len,
                key_start: d.key_start,
                array_start: d.array_start,
            }
        })
    }

    /// Flush (write mode) or release (read mode) all resources. Always
    /// terminal: the store cannot be used afterward regardless of the
    /// outcome, since `close` takes `self` by value.
    pub fn close(self) -> Result<()> {
        match self.mode {
            Mode::Write { path, mut items } => {
                let file_size = pack(&mut items);
                debug!(
                    path = %path.display(),
                    num_items = items.len(),
                    file_size,
                    "flushing KAS store"
                );
                let file = OpenOptions::new()
                    .create(true)
                    .write(true)
                    .truncate(true)
                    .open(&path)?;
                let mut out = BufWriter::new(file);
                writer::write_to(&items, file_size, &mut out)?;
                out.flush()?;
                Ok(())
            }
            Mode::Read { .. } => {
                debug!("releasing KAS store read buffer");
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn le32(values: &[i32]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_le_bytes()).collect()
    }

    #[test]
    fn empty_store_round_trips() {
        let tmp = NamedTempFile::new().unwrap();
        let store = Store::create(tmp.path()).unwrap();
        store.close().unwrap();

        let meta = std::fs::metadata(tmp.path()).unwrap();
        assert_eq!(meta.len(), 64);

        let opened = Store::open(tmp.path(), OpenFlags::empty()).unwrap();
        assert_eq!(opened.len(), 0);
        assert!(opened.is_empty());
    }

    #[test]
    fn single_small_item_round_trips() {
        let tmp = NamedTempFile::new().unwrap();
        let array = le32(&[1, 2, 3]);
        let mut store = Store::create(tmp.path()).unwrap();
        store.put(b"x", ElementType::Int32.code(), &array, 3, 0).unwrap();
        store.close().unwrap();

        let meta = std::fs::metadata(tmp.path()).unwrap();
        assert_eq!(meta.len(), 148);

        let opened = Store::open(tmp.path(), OpenFlags::empty()).unwrap();
        let item = opened.get(b"x").unwrap();
        assert_eq!(item.array_view().as_i32().unwrap(), vec![1, 2, 3]);
        assert_eq!(item.array_start, 136);
    }

    #[test]
    fn sort_ordering_shorter_first_tiebreak() {
        let tmp = NamedTempFile::new().unwrap();
        let array = le32(&[0]);
        let mut store = Store::create(tmp.path()).unwrap();
        store.put(b"b", ElementType::Int32.code(), &array, 1, 0).unwrap();
        store.put(b"aa", ElementType::Int32.code(), &array, 1, 0).unwrap();
        store.put(b"a", ElementType::Int32.code(), &array, 1, 0).unwrap();
        store.close().unwrap();

        let opened = Store::open(tmp.path(), OpenFlags::empty()).unwrap();
        let keys: Vec<Vec<u8>> = opened.iter().map(|item| item.key.to_vec()).collect();
        assert_eq!(keys, vec![b"a".to_vec(), b"aa".to_vec(), b"b".to_vec()]);
    }

    #[test]
    fn duplicate_key_is_rejected_and_leaves_store_unchanged() {
        let tmp = NamedTempFile::new().unwrap();
        let array = le32(&[1]);
        let mut store = Store::create(tmp.path()).unwrap();
        store.put(b"k", ElementType::Int32.code(), &array, 1, 0).unwrap();
        assert!(matches!(
            store.put(b"k", ElementType::Int32.code(), &array, 1, 0),
            Err(KasError::DuplicateKey)
        ));
        assert_eq!(store.len(), 1);
        store.close().unwrap();

        let opened = Store::open(tmp.path(), OpenFlags::empty()).unwrap();
        assert_eq!(opened.len(), 1);
    }

    #[test]
    fn put_after_duplicate_rejection_still_succeeds() {
        let tmp = NamedTempFile::new().unwrap();
        let array = le32(&[1]);
        let mut store = Store::create(tmp.path()).unwrap();
        store.put(b"k", ElementType::Int32.code(), &array, 1, 0).unwrap();
        assert!(store.put(b"k", ElementType::Int32.code(), &array, 1, 0).is_err());
        store.put(b"other", ElementType::Int32.code(), &array, 1, 0).unwrap();
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn empty_key_is_rejected() {
        let tmp = NamedTempFile::new().unwrap();
        let array = le32(&[1]);
        let mut store = Store::create(tmp.path()).unwrap();
        assert!(matches!(
            store.put(b"", ElementType::Int32.code(), &array, 1, 0),
            Err(KasError::EmptyKey)
        ));
    }

    #[test]
    fn array_shorter_than_declared_len_is_rejected() {
        let tmp = NamedTempFile::new().unwrap();
        let array = le32(&[1, 2]); // 8 bytes, but array_len=3 needs 12
        let mut store = Store::create(tmp.path()).unwrap();
        assert!(matches!(
            store.put(b"x", ElementType::Int32.code(), &array, 3, 0),
            Err(KasError::ArrayLengthMismatch { expected: 12, actual: 8, .. })
        ));
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn array_longer_than_declared_len_is_rejected() {
        let tmp = NamedTempFile::new().unwrap();
        let array = le32(&[1, 2, 3, 4]); // 16 bytes, but array_len=3 needs 12
        let mut store = Store::create(tmp.path()).unwrap();
        assert!(matches!(
            store.put(b"x", ElementType::Int32.code(), &array, 3, 0),
            Err(KasError::ArrayLengthMismatch { expected: 12, actual: 16, .. })
        ));
    }

    #[test]
    fn bad_type_code_is_rejected() {
        let tmp = NamedTempFile::new().unwrap();
        let array = le32(&[1]);
        let mut store = Store::create(tmp.path()).unwrap();
        assert!(matches!(
            store.put(b"x", 9, &array, 1, 0),
            Err(KasError::BadType(9))
        ));
    }

    #[test]
    fn zero_length_array_round_trips() {
        let tmp = NamedTempFile::new().unwrap();
        let array: [u8; 0] = [];
        let mut store = Store::create(tmp.path()).unwrap();
        store
            .put(b"empty", ElementType::Float64.code(), &array, 0, 0)
            .unwrap();
        store.close().unwrap();

        let opened = Store::open(tmp.path(), OpenFlags::empty()).unwrap();
        let item = opened.get(b"empty").unwrap();
        assert_eq!(item.array_len, 0);
        assert_eq!(item.array_start % 8, 0);
    }

    #[test]
    fn get_miss_reports_key_not_found() {
        let tmp = NamedTempFile::new().unwrap();
        let store = Store::create(tmp.path()).unwrap();
        store.close().unwrap();
        let opened = Store::open(tmp.path(), OpenFlags::empty()).unwrap();
        assert!(matches!(opened.get(b"missing"), Err(KasError::KeyNotFound)));
    }

    #[test]
    fn put_in_read_mode_is_rejected() {
        let tmp = NamedTempFile::new().unwrap();
        let store = Store::create(tmp.path()).unwrap();
        store.close().unwrap();
        let mut opened = Store::open(tmp.path(), OpenFlags::empty()).unwrap();
        let array = [0u8; 4];
        assert!(matches!(
            opened.put(b"x", ElementType::Int32.code(), &array, 1, 0),
            Err(KasError::BadMode)
        ));
    }

    #[test]
    fn no_mmap_flag_produces_identical_results() {
        let tmp = NamedTempFile::new().unwrap();
        let array = le32(&[7, 8, 9]);
        let mut store = Store::create(tmp.path()).unwrap();
        store.put(b"y", ElementType::Int32.code(), &array, 3, 0).unwrap();
        store.close().unwrap();

        let mapped = Store::open(tmp.path(), OpenFlags::empty()).unwrap();
        let buffered = Store::open(tmp.path(), OpenFlags::NO_MMAP).unwrap();
        assert!(mapped.is_memory_mapped());
        assert!(!buffered.is_memory_mapped());

        let a = mapped.get(b"y").unwrap().array_view().as_i32().unwrap();
        let b = buffered.get(b"y").unwrap().array_view().as_i32().unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn no_mmap_and_mmap_agree_on_trailing_garbage() {
        let tmp = NamedTempFile::new().unwrap();
        let array = le32(&[7, 8, 9]);
        let mut store = Store::create(tmp.path()).unwrap();
        store.put(b"y", ElementType::Int32.code(), &array, 3, 0).unwrap();
        store.close().unwrap();

        let mut bytes = std::fs::read(tmp.path()).unwrap();
        bytes.push(0); // file_size in the header no longer matches the real length
        std::fs::write(tmp.path(), &bytes).unwrap();

        assert!(matches!(
            Store::open(tmp.path(), OpenFlags::empty()),
            Err(KasError::BadFileFormat(_))
        ));
        assert!(matches!(
            Store::open(tmp.path(), OpenFlags::NO_MMAP),
            Err(KasError::BadFileFormat(_))
        ));
    }

    #[test]
    fn corrupted_magic_is_rejected() {
        let tmp = NamedTempFile::new().unwrap();
        let store = Store::create(tmp.path()).unwrap();
        store.close().unwrap();

        let mut bytes = std::fs::read(tmp.path()).unwrap();
        bytes[0] ^= 0xff;
        std::fs::write(tmp.path(), &bytes).unwrap();

        assert!(matches!(
            Store::open(tmp.path(), OpenFlags::empty()),
            Err(KasError::BadFileFormat(_))
        ));
    }

    #[test]
    fn truncated_file_is_rejected() {
        let tmp = NamedTempFile::new().unwrap();
        let array = le32(&[1, 2, 3]);
        let mut store = Store::create(tmp.path()).unwrap();
        store.put(b"x", ElementType::Int32.code(), &array, 3, 0).unwrap();
        store.close().unwrap();

        let mut bytes = std::fs::read(tmp.path()).unwrap();
        bytes.pop();
        std::fs::write(tmp.path(), &bytes).unwrap();

        assert!(matches!(
            Store::open(tmp.path(), OpenFlags::empty()),
            Err(KasError::BadFileFormat(_))
        ));
    }
}
