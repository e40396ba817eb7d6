use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Identifies one [`BlockPool`][crate::BlockPool] instance for the lifetime of the process.
///
/// Addresses carry the identity of the pool that produced them, so an address handed to the
/// wrong pool is rejected even if its offset happens to fall on a valid block boundary there.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub(crate) struct PoolId(u64);

static NEXT_POOL_ID: AtomicU64 = AtomicU64::new(0);

impl PoolId {
    pub(crate) fn next() -> Self {
        // Only uniqueness matters, there is no ordering relationship with any other memory.
        Self(NEXT_POOL_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// The address of a block's payload, as handed out by [`BlockPool::allocate()`][1].
///
/// This is an opaque handle, not a pointer: it names a byte offset inside the buffer of one
/// specific pool. The payload itself is reached through [`BlockPool::read_block()`][2] and
/// [`BlockPool::write_block()`][3].
///
/// The offset of an address is the distance in bytes from the start of the pool's buffer to the
/// first payload byte of the block, so the first block of every pool has the offset
/// [`HEADER_SIZE`][crate::HEADER_SIZE] and consecutive blocks are
/// [`block_stride()`][4] bytes apart.
///
/// Addresses may be reused by the pool after the block has been deallocated.
///
/// # Example
///
/// ```rust
/// use block_pool::{BlockPool, HEADER_SIZE};
///
/// let pool = BlockPool::new(64, 4).unwrap();
///
/// let first = pool.allocate().unwrap();
/// let second = pool.allocate().unwrap();
///
/// assert_eq!(first.offset(), HEADER_SIZE);
/// assert_eq!(second.offset() - first.offset(), 64 + HEADER_SIZE);
/// ```
///
/// [1]: crate::BlockPool::allocate
/// [2]: crate::BlockPool::read_block
/// [3]: crate::BlockPool::write_block
/// [4]: crate::BlockPool::block_stride
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct BlockAddress {
    pool_id: PoolId,
    offset: usize,
}

impl BlockAddress {
    pub(crate) fn new(pool_id: PoolId, offset: usize) -> Self {
        Self { pool_id, offset }
    }

    pub(crate) fn pool_id(self) -> PoolId {
        self.pool_id
    }

    /// The byte offset of the block's payload from the start of the pool's buffer.
    #[must_use]
    pub fn offset(self) -> usize {
        self.offset
    }

    /// Returns the address `bytes` further into the same pool's buffer.
    ///
    /// The result is not necessarily a valid block address. Use
    /// [`BlockPool::is_block_address()`][crate::BlockPool::is_block_address] to check.
    ///
    /// Returns `None` if the offset would overflow.
    #[must_use]
    pub fn checked_add(self, bytes: usize) -> Option<Self> {
        Some(Self {
            pool_id: self.pool_id,
            offset: self.offset.checked_add(bytes)?,
        })
    }

    /// Returns the address `bytes` earlier in the same pool's buffer.
    ///
    /// The result is not necessarily a valid block address. Use
    /// [`BlockPool::is_block_address()`][crate::BlockPool::is_block_address] to check.
    ///
    /// Returns `None` if the offset would go below zero.
    #[must_use]
    pub fn checked_sub(self, bytes: usize) -> Option<Self> {
        Some(Self {
            pool_id: self.pool_id,
            offset: self.offset.checked_sub(bytes)?,
        })
    }
}

impl fmt::Display for BlockAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x} in pool #{}", self.offset, self.pool_id.0)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn pool_ids_are_unique() {
        let a = PoolId::next();
        let b = PoolId::next();

        assert_ne!(a, b);
    }

    #[test]
    fn arithmetic_keeps_pool_identity() {
        let pool_id = PoolId::next();
        let address = BlockAddress::new(pool_id, 100);

        let forward = address.checked_add(20).unwrap();
        assert_eq!(forward.offset(), 120);
        assert_eq!(forward.pool_id(), pool_id);

        let backward = address.checked_sub(100).unwrap();
        assert_eq!(backward.offset(), 0);
        assert_eq!(backward.pool_id(), pool_id);
    }

    #[test]
    fn arithmetic_out_of_range_is_none() {
        let address = BlockAddress::new(PoolId::next(), 8);

        assert!(address.checked_sub(9).is_none());
        assert!(address.checked_add(usize::MAX).is_none());
    }

    #[test]
    fn display_shows_hex_offset() {
        let address = BlockAddress::new(PoolId(7), 0x48);

        assert_eq!(address.to_string(), "0x48 in pool #7");
    }
}
