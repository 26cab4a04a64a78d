//! KAS (Key-Array Store): a single-file, write-once, read-many container
//! mapping short byte-string keys to typed, homogeneous numeric arrays.
//!
//! The on-disk format is fixed-layout and self-describing: a 64-byte
//! header, a sorted table of fixed-size descriptors, a tightly-packed
//! key region, and an 8-byte-aligned array region. Readers may
//! memory-map the file and get pointers to array data with no copying
//! and no per-value decoding (see [`Store::open`]); writers buffer all
//! items in memory and emit the file in one pass at [`Store::close`].
//!
//! ```no_run
//! use kas::{ElementType, OpenFlags, Store};
//!
//! # fn main() -> kas::Result<()> {
//! let array: [i32; 3] = [1, 2, 3];
//! let array_bytes: Vec<u8> = array.iter().flat_map(|v| v.to_le_bytes()).collect();
//!
//! let mut store = Store::create("example.kas")?;
//! store.put(b"x", ElementType::Int32.code(), &array_bytes, 3, 0)?;
//! store.close()?;
//!
//! let opened = Store::open("example.kas", OpenFlags::empty())?;
//! let item = opened.get(b"x")?;
//! assert_eq!(item.array_view().as_i32()?, vec![1, 2, 3]);
//! # Ok(())
//! # }
//! ```
//!
//! Out of scope for this crate (external collaborators): a CLI/diagnostic
//! printer, curated end-user error text, and language bindings.
//! Non-goals: concurrent writers, incremental/streaming writes, schema
//! evolution beyond reserved-bytes headroom, compression, encryption,
//! and any byte order other than little-endian.

pub mod descriptor;
pub mod error;
pub mod header;
pub mod item;
pub mod packer;
pub mod reader;
pub mod store;
pub mod types;
pub mod writer;

pub use error::{KasError, Result};
pub use item::{ArrayView, Item};
pub use store::Store;
pub use types::{ElementType, OpenFlags};
