//! Pure layout computation: sort items by key and assign the byte
//! offsets the writer and reader both rely on. No I/O happens here,
//! mirroring how the teacher keeps on-disk offset math (e.g.
//! `hfsplus::btree`'s node/record offset arithmetic) separate from the
//! `Read`/`Write` plumbing that consumes it.

use crate::descriptor::DESCRIPTOR_SIZE;
use crate::header::HEADER_SIZE;
use crate::item::{key_cmp, PendingItem};
use crate::types::ElementType;

/// 8-byte alignment applied to every array region, regardless of
/// element width, so a mapped buffer is safe to alias as the widest
/// supported type.
pub const ARRAY_ALIGNMENT: u64 = 8;

/// The byte offsets the packer assigned, plus the resulting file size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemLayout {
    pub key_start: u64,
    pub array_start: u64,
}

/// Sort `items` into canonical key order and assign `key_start`/
/// `array_start` on each, returning the final `file_size`.
///
/// Sorting uses [`key_cmp`]: byte-wise comparison over the shorter
/// prefix, ties (one key a prefix of the other) broken shorter-first.
pub fn pack(items: &mut [PendingItem<'_>]) -> u64 {
    items.sort_by(|a, b| key_cmp(&a.key, &b.key));

    let num_items = items.len() as u64;
    let shapes: Vec<(u64, ElementType, u64)> = items
        .iter()
        .map(|item| (item.key.len() as u64, item.element_type, item.array_len))
        .collect();

    let (layouts, file_size) = compute_layout(num_items, &shapes);
    for (item, layout) in items.iter_mut().zip(layouts) {
        item.key_start = layout.key_start;
        item.array_start = layout.array_start;
    }
    file_size
}

/// The pure offset-assignment rule (spec §4.4), usable both by [`pack`]
/// (after sorting) and by the reader's canonical-layout check (which
/// recomputes the same offsets over the on-disk, already-sorted order
/// and compares them to what the descriptors actually say).
///
/// `shapes` is `(key_len, element_type, array_len)` per item, in the
/// order offsets should be assigned. Returns one [`ItemLayout`] per
/// shape plus the final `file_size`.
pub fn compute_layout(num_items: u64, shapes: &[(u64, ElementType, u64)]) -> (Vec<ItemLayout>, u64) {
    let descriptor_table_size = num_items * DESCRIPTOR_SIZE;
    let mut offset = HEADER_SIZE + descriptor_table_size;

    let mut key_starts = Vec::with_capacity(shapes.len());
    for (key_len, _, _) in shapes {
        key_starts.push(offset);
        offset += key_len;
    }

    let mut layouts = Vec::with_capacity(shapes.len());
    for (i, (_, element_type, array_len)) in shapes.iter().enumerate() {
        offset = align_up(offset, ARRAY_ALIGNMENT);
        let array_start = offset;
        offset += array_len * element_type.width();
        layouts.push(ItemLayout {
            key_start: key_starts[i],
            array_start,
        });
    }

    (layouts, offset)
}

/// Round `value` up to the next multiple of `alignment` (`alignment`
/// must be a power of two).
pub const fn align_up(value: u64, alignment: u64) -> u64 {
    (value + alignment - 1) & !(alignment - 1)
}
