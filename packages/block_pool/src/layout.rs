use std::num::NonZero;
use std::ops::Range;

use crate::{Error, Result};

/// Size in bytes of the header that precedes the payload of every block.
///
/// The header is one address-width word. It does not depend on the block size or on any
/// particular pool instance.
pub const HEADER_SIZE: usize = size_of::<usize>();

/// Address arithmetic for a pool of `max_blocks` blocks, each `block_size + HEADER_SIZE` bytes.
///
/// Block `i` has its header at byte offset `i * block_stride` and its payload right after the
/// header. Blocks are laid out back to back with no padding, so there is no alignment guarantee
/// for payloads beyond what the caller's block size implies.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) struct BlockLayout {
    block_size: NonZero<usize>,
    max_blocks: NonZero<usize>,
    block_stride: NonZero<usize>,

    /// Offset of the last block's header. The first block's header is always at offset zero.
    range_end: usize,
}

impl BlockLayout {
    /// Validates the requested pool shape.
    ///
    /// The total size `block_stride * max_blocks` is never computed before it is known to fit in
    /// `usize`, so a wrapped-around product cannot sneak a huge request through as a small one.
    pub(crate) fn new(block_size: usize, max_blocks: usize) -> Result<Self> {
        let invalid = |problem| Error::InvalidParameters {
            block_size,
            max_blocks,
            problem,
        };

        let block_size_nz =
            NonZero::new(block_size).ok_or_else(|| invalid("block size must be non-zero"))?;
        let max_blocks_nz =
            NonZero::new(max_blocks).ok_or_else(|| invalid("block count must be non-zero"))?;

        let max_block_stride = usize::MAX / max_blocks_nz;

        let max_block_size = max_block_stride
            .checked_sub(HEADER_SIZE)
            .ok_or_else(|| invalid("block count leaves no room for block headers"))?;

        if block_size > max_block_size {
            return Err(invalid("total pool size does not fit in the address space"));
        }

        let block_stride = block_size
            .checked_add(HEADER_SIZE)
            .expect("guarded by block_size <= max_block_size above");
        let block_stride =
            NonZero::new(block_stride).expect("block_stride includes a non-zero header size");

        let range_end = block_stride
            .get()
            .checked_mul(max_blocks.wrapping_sub(1)) // max_blocks is non-zero here
            .expect("guarded by block_stride <= usize::MAX / max_blocks above");

        Ok(Self {
            block_size: block_size_nz,
            max_blocks: max_blocks_nz,
            block_stride,
            range_end,
        })
    }

    pub(crate) fn block_size(&self) -> usize {
        self.block_size.get()
    }

    pub(crate) fn max_blocks(&self) -> usize {
        self.max_blocks.get()
    }

    pub(crate) fn block_stride(&self) -> usize {
        self.block_stride.get()
    }

    /// Number of bytes the backing buffer must have to hold every block.
    pub(crate) fn total_size(&self) -> usize {
        self.range_end
            .checked_add(self.block_stride.get())
            .expect("guarded by overflow check in ctor")
    }

    /// # Panics
    ///
    /// Panics if the index is out of bounds.
    pub(crate) fn header_offset(&self, index: usize) -> usize {
        assert!(
            index < self.max_blocks.get(),
            "block index {index} out of bounds in pool of {} blocks",
            self.max_blocks
        );

        self.block_stride
            .get()
            .checked_mul(index)
            .expect("guarded by bounds check above")
    }

    /// # Panics
    ///
    /// Panics if the index is out of bounds.
    pub(crate) fn header_range(&self, index: usize) -> Range<usize> {
        let start = self.header_offset(index);

        let end = start
            .checked_add(HEADER_SIZE)
            .expect("guarded by overflow check in ctor");

        start..end
    }

    /// # Panics
    ///
    /// Panics if the index is out of bounds.
    pub(crate) fn payload_offset(&self, index: usize) -> usize {
        self.header_offset(index)
            .checked_add(HEADER_SIZE)
            .expect("guarded by overflow check in ctor")
    }

    /// # Panics
    ///
    /// Panics if the index is out of bounds.
    pub(crate) fn payload_range(&self, index: usize) -> Range<usize> {
        let start = self.payload_offset(index);

        let end = start
            .checked_add(self.block_size.get())
            .expect("guarded by overflow check in ctor");

        start..end
    }

    /// Maps a payload offset back to the index of its block.
    ///
    /// Returns `None` for offsets that do not point to the first payload byte of some block,
    /// including offsets that point into a header and offsets past the last block.
    pub(crate) fn block_index(&self, payload_offset: usize) -> Option<usize> {
        let header_offset = payload_offset.checked_sub(HEADER_SIZE)?;

        if header_offset > self.range_end {
            return None;
        }

        if header_offset % self.block_stride != 0 {
            return None;
        }

        Some(header_offset / self.block_stride)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn header_is_one_word() {
        assert_eq!(HEADER_SIZE, size_of::<*const u8>());
    }

    #[test]
    fn zero_block_size_is_rejected() {
        assert!(matches!(
            BlockLayout::new(0, 1),
            Err(Error::InvalidParameters { .. })
        ));
    }

    #[test]
    fn zero_block_count_is_rejected() {
        assert!(matches!(
            BlockLayout::new(1, 0),
            Err(Error::InvalidParameters { .. })
        ));
        assert!(matches!(
            BlockLayout::new(0, 0),
            Err(Error::InvalidParameters { .. })
        ));
    }

    #[test]
    fn huge_block_size_is_rejected() {
        assert!(matches!(
            BlockLayout::new(usize::MAX, 2),
            Err(Error::InvalidParameters { .. })
        ));
    }

    #[test]
    fn huge_block_count_is_rejected() {
        assert!(matches!(
            BlockLayout::new(2, usize::MAX),
            Err(Error::InvalidParameters { .. })
        ));
    }

    #[test]
    fn largest_single_block_is_accepted() {
        let layout = BlockLayout::new(usize::MAX - HEADER_SIZE, 1).unwrap();

        assert_eq!(layout.total_size(), usize::MAX);
    }

    #[test]
    fn one_past_largest_single_block_is_rejected() {
        assert!(BlockLayout::new(usize::MAX - HEADER_SIZE + 1, 1).is_err());
    }

    #[test]
    fn stride_and_total_size() {
        let layout = BlockLayout::new(64, 4).unwrap();

        assert_eq!(layout.block_size(), 64);
        assert_eq!(layout.max_blocks(), 4);
        assert_eq!(layout.block_stride(), 64 + HEADER_SIZE);
        assert_eq!(layout.total_size(), (64 + HEADER_SIZE) * 4);
    }

    #[test]
    fn block_smaller_than_header_is_permitted() {
        let layout = BlockLayout::new(1, 3).unwrap();

        assert_eq!(layout.block_stride(), 1 + HEADER_SIZE);
        assert_eq!(
            layout.payload_range(2),
            (2 * (1 + HEADER_SIZE) + HEADER_SIZE)..(3 * (1 + HEADER_SIZE))
        );
    }

    #[test]
    fn offsets_are_stride_apart() {
        let layout = BlockLayout::new(16, 4).unwrap();
        let stride = layout.block_stride();

        for index in 0..4 {
            assert_eq!(layout.header_offset(index), index * stride);
            assert_eq!(layout.payload_offset(index), index * stride + HEADER_SIZE);
            assert_eq!(
                layout.header_range(index),
                (index * stride)..(index * stride + HEADER_SIZE)
            );
        }
    }

    #[test]
    #[should_panic]
    fn header_offset_out_of_bounds_panics() {
        let layout = BlockLayout::new(16, 4).unwrap();

        _ = layout.header_offset(4);
    }

    #[test]
    fn block_index_round_trips_for_every_block() {
        let layout = BlockLayout::new(16, 4).unwrap();

        for index in 0..4 {
            assert_eq!(layout.block_index(layout.payload_offset(index)), Some(index));
        }
    }

    #[test]
    fn block_index_rejects_off_stride_and_out_of_range() {
        let layout = BlockLayout::new(16, 4).unwrap();
        let first = layout.payload_offset(0);
        let last = layout.payload_offset(3);

        assert_eq!(layout.block_index(0), None);
        assert_eq!(layout.block_index(HEADER_SIZE - 1), None);
        assert_eq!(layout.block_index(first + 1), None);
        assert_eq!(layout.block_index(first + 15), None);
        assert_eq!(layout.block_index(last - 1), None);
        assert_eq!(layout.block_index(last + 1), None);
        assert_eq!(layout.block_index(last + layout.block_stride()), None);
        assert_eq!(layout.block_index(usize::MAX), None);
    }
}
