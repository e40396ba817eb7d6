use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{debug, trace};

use crate::{
    Backing, BlockAddress, BlockLayout, BlockPoolBuilder, Error, FreeList, HEADER_SIZE, PoolId,
    PoolType, Result,
};

/// A fixed-size block allocator over a single contiguous buffer.
///
/// The buffer is carved into [`max_blocks()`][1] blocks of [`block_size()`][2] payload bytes, each
/// preceded by a [`HEADER_SIZE`]-byte header. Free blocks are chained through their headers into a
/// free list, so [`allocate()`][3] and [`deallocate()`][4] take constant time and the pool never
/// fragments.
///
/// The most recently deallocated block is the next one to be allocated.
///
/// # Backing memory
///
/// * [`BlockPool::new()`] acquires the buffer from the system. The pool owns it and gives it back
///   when dropped ([`PoolType::Owned`]).
/// * [`BlockPool::with_external_buffer()`] places the blocks in a buffer borrowed from the caller.
///   The pool never releases it ([`PoolType::External`]).
///
/// # Thread safety
///
/// The pool is `Send` and `Sync`. [`allocate()`][3] and [`deallocate()`][4] are serialized by a
/// lock scoped to the pool instance and are totally ordered with respect to each other. A call
/// that fails releases the lock before it returns, so errors on one thread never block another.
///
/// Payloads are reached through [`read_block()`][7] and [`write_block()`][8], which copy at most
/// [`block_size()`][2] bytes under the lock. Caller code never runs while the lock is held.
///
/// [`is_block_address()`][5] is pure arithmetic and never takes the lock. The answers of
/// [`is_block_address()`][5] and [`is_block_in_use()`][6] are advisory: another thread may change
/// the state of the block right after the query returns.
///
/// # Example
///
/// ```rust
/// use block_pool::BlockPool;
///
/// let pool = BlockPool::new(64, 4).unwrap();
///
/// let block = pool.allocate().unwrap();
///
/// pool.write_block(block, b"hello").unwrap();
///
/// let mut greeting = [0_u8; 5];
/// pool.read_block(block, &mut greeting).unwrap();
/// assert_eq!(&greeting, b"hello");
///
/// pool.deallocate(block).unwrap();
/// ```
///
/// [1]: Self::max_blocks
/// [2]: Self::block_size
/// [3]: Self::allocate
/// [4]: Self::deallocate
/// [5]: Self::is_block_address
/// [6]: Self::is_block_in_use
/// [7]: Self::read_block
/// [8]: Self::write_block
#[derive(Debug)]
pub struct BlockPool<'buf> {
    id: PoolId,

    layout: BlockLayout,

    pool_type: PoolType,

    /// The blocks and the free-list head. Every mutation happens with this lock held.
    free_list: Mutex<FreeList<'buf>>,
}

impl BlockPool<'static> {
    /// Creates a pool of `max_blocks` blocks of `block_size` bytes, acquiring the buffer from
    /// the system.
    ///
    /// # Errors
    ///
    /// * [`Error::InvalidParameters`] if either argument is zero or the total pool size does not
    ///   fit in `usize`.
    /// * [`Error::OutOfSystemMemory`] if the system cannot supply the buffer.
    ///
    /// # Example
    ///
    /// ```rust
    /// use block_pool::{BlockPool, Error};
    ///
    /// let pool = BlockPool::new(32, 10).unwrap();
    /// assert_eq!(pool.block_size(), 32);
    ///
    /// assert!(matches!(
    ///     BlockPool::new(32, 0),
    ///     Err(Error::InvalidParameters { .. })
    /// ));
    /// ```
    pub fn new(block_size: usize, max_blocks: usize) -> Result<Self> {
        Self::builder()
            .block_size(block_size)
            .max_blocks(max_blocks)
            .build()
    }
}

impl<'buf> BlockPool<'buf> {
    /// Creates a pool of `max_blocks` blocks of `block_size` bytes inside `buffer`.
    ///
    /// The buffer must be at least `(block_size + HEADER_SIZE) * max_blocks` bytes long. The pool
    /// borrows it until the pool is dropped and never releases it.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidParameters`] if either argument is zero, the total pool size does not fit
    /// in `usize` or the buffer is too small.
    ///
    /// # Example
    ///
    /// ```rust
    /// use block_pool::{BlockPool, HEADER_SIZE};
    ///
    /// let mut buffer = [0_u8; (16 + HEADER_SIZE) * 2];
    ///
    /// let pool = BlockPool::with_external_buffer(16, 2, &mut buffer).unwrap();
    /// let block = pool.allocate().unwrap();
    ///
    /// assert_eq!(block.offset(), HEADER_SIZE);
    /// ```
    pub fn with_external_buffer(
        block_size: usize,
        max_blocks: usize,
        buffer: &'buf mut [u8],
    ) -> Result<Self> {
        Self::builder()
            .block_size(block_size)
            .max_blocks(max_blocks)
            .external_buffer(buffer)
            .build()
    }

    /// Starts building a new [`BlockPool`].
    ///
    /// Use this when you want to supply a custom [`MemoryProvider`][crate::MemoryProvider].
    pub fn builder() -> BlockPoolBuilder<'buf> {
        BlockPoolBuilder::new()
    }

    pub(crate) fn from_parts(layout: BlockLayout, backing: Backing<'buf>) -> Self {
        let pool_type = backing.pool_type();

        Self {
            id: PoolId::next(),
            layout,
            pool_type,
            free_list: Mutex::new(FreeList::new(layout, backing)),
        }
    }

    /// Takes a free block out of the pool and returns the address of its payload.
    ///
    /// Blocks of a freshly created pool are handed out in ascending address order. After that,
    /// the most recently deallocated block is handed out first.
    ///
    /// # Errors
    ///
    /// [`Error::OutOfAllocatableMemory`] if every block is in use. The pool is unchanged and
    /// the call may be retried after another block has been deallocated.
    ///
    /// # Example
    ///
    /// ```rust
    /// use block_pool::{BlockPool, Error};
    ///
    /// let pool = BlockPool::new(8, 1).unwrap();
    ///
    /// let block = pool.allocate().unwrap();
    /// assert!(matches!(
    ///     pool.allocate(),
    ///     Err(Error::OutOfAllocatableMemory { .. })
    /// ));
    ///
    /// pool.deallocate(block).unwrap();
    /// assert_eq!(pool.allocate().unwrap(), block);
    /// ```
    pub fn allocate(&self) -> Result<BlockAddress> {
        let index = self
            .lock()
            .pop()
            .ok_or(Error::OutOfAllocatableMemory {
                max_blocks: self.layout.max_blocks(),
            })?;

        let address = self.address_of(index);

        trace!(%address, "allocated block");

        Ok(address)
    }

    /// Returns a block to the pool, making it the next block to be allocated.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidBlockAddress`] if `address` was not produced by this pool, does not point
    /// to the start of a block payload or names a block that is not currently in use. The pool is
    /// unchanged in that case, so a double deallocation is reported without harm.
    ///
    /// # Example
    ///
    /// ```rust
    /// use block_pool::{BlockPool, Error};
    ///
    /// let pool = BlockPool::new(8, 2).unwrap();
    /// let block = pool.allocate().unwrap();
    ///
    /// pool.deallocate(block).unwrap();
    ///
    /// assert!(matches!(
    ///     pool.deallocate(block),
    ///     Err(Error::InvalidBlockAddress { .. })
    /// ));
    /// ```
    pub fn deallocate(&self, address: BlockAddress) -> Result<()> {
        let released = self
            .block_index(address)
            .is_some_and(|index| self.lock().push(index));

        if !released {
            debug!(%address, "rejected deallocation of invalid block address");
            return Err(Error::InvalidBlockAddress { address });
        }

        trace!(%address, "deallocated block");

        Ok(())
    }

    /// Whether `address` points to the start of the payload of one of this pool's blocks,
    /// regardless of whether that block is in use.
    ///
    /// This never takes the pool's lock.
    #[must_use]
    pub fn is_block_address(&self, address: BlockAddress) -> bool {
        self.block_index(address).is_some()
    }

    /// Whether `address` names one of this pool's blocks and that block is currently in use.
    #[must_use]
    pub fn is_block_in_use(&self, address: BlockAddress) -> bool {
        self.block_index(address)
            .is_some_and(|index| self.lock().header(index).is_in_use())
    }

    /// Copies the payload of an in-use block into `buffer` and returns the number of bytes copied.
    ///
    /// That number is the smaller of `buffer.len()` and [`block_size()`][Self::block_size]. The
    /// pool's lock is held only for the copy, so other threads are delayed by at most one
    /// `block_size()` memcpy.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidBlockAddress`] if `address` does not name a block of this pool that is
    /// currently in use. `buffer` is left untouched in that case.
    ///
    /// # Example
    ///
    /// ```rust
    /// use block_pool::BlockPool;
    ///
    /// let pool = BlockPool::new(64, 4).unwrap();
    /// let block = pool.allocate().unwrap();
    ///
    /// pool.write_block(block, b"hello").unwrap();
    ///
    /// let mut greeting = [0_u8; 5];
    /// assert_eq!(pool.read_block(block, &mut greeting).unwrap(), 5);
    /// assert_eq!(&greeting, b"hello");
    /// ```
    pub fn read_block(&self, address: BlockAddress, buffer: &mut [u8]) -> Result<usize> {
        let free_list = self.lock();
        let index = self.in_use_index(&free_list, address)?;

        let payload = free_list.payload(index);
        let len = payload.len().min(buffer.len());

        buffer
            .get_mut(..len)
            .expect("guarded by min() above")
            .copy_from_slice(payload.get(..len).expect("guarded by min() above"));

        Ok(len)
    }

    /// Copies `data` to the start of the payload of an in-use block.
    ///
    /// Payload bytes past `data.len()` keep their previous contents. The pool's lock is held only
    /// for the copy.
    ///
    /// # Errors
    ///
    /// * [`Error::PayloadTooLarge`] if `data` is longer than [`block_size()`][Self::block_size].
    /// * [`Error::InvalidBlockAddress`] if `address` does not name a block of this pool that is
    ///   currently in use.
    ///
    /// Nothing is written in either case.
    pub fn write_block(&self, address: BlockAddress, data: &[u8]) -> Result<()> {
        if data.len() > self.layout.block_size() {
            return Err(Error::PayloadTooLarge {
                len: data.len(),
                block_size: self.layout.block_size(),
            });
        }

        let mut free_list = self.lock();
        let index = self.in_use_index(&free_list, address)?;

        free_list
            .payload_mut(index)
            .get_mut(..data.len())
            .expect("guarded by block size check above")
            .copy_from_slice(data);

        Ok(())
    }

    /// The payload size of each block, in bytes.
    #[must_use]
    pub fn block_size(&self) -> usize {
        self.layout.block_size()
    }

    /// The size of the header that precedes every block payload. Same as [`HEADER_SIZE`].
    #[must_use]
    pub const fn header_size() -> usize {
        HEADER_SIZE
    }

    /// The distance in bytes between the starts of two adjacent blocks, i.e.
    /// `block_size() + HEADER_SIZE`.
    #[must_use]
    pub fn block_stride(&self) -> usize {
        self.layout.block_stride()
    }

    /// The total number of blocks in the pool.
    #[must_use]
    pub fn max_blocks(&self) -> usize {
        self.layout.max_blocks()
    }

    /// Whether the pool owns its buffer or borrows it from the caller.
    #[must_use]
    pub fn pool_type(&self) -> PoolType {
        self.pool_type
    }

    /// The payload address of the block at the lowest address.
    #[must_use]
    pub fn first_block_address(&self) -> BlockAddress {
        self.address_of(0)
    }

    /// The payload address of the block at the highest address.
    #[must_use]
    pub fn last_block_address(&self) -> BlockAddress {
        // max_blocks is non-zero for every constructed pool.
        self.address_of(self.layout.max_blocks().wrapping_sub(1))
    }

    /// The number of blocks currently in use.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether no block is in use.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether every block is in use, so the next [`allocate()`][Self::allocate] would fail.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.lock().is_full()
    }

    fn address_of(&self, index: usize) -> BlockAddress {
        BlockAddress::new(self.id, self.layout.payload_offset(index))
    }

    fn block_index(&self, address: BlockAddress) -> Option<usize> {
        if address.pool_id() != self.id {
            return None;
        }

        self.layout.block_index(address.offset())
    }

    fn in_use_index(&self, free_list: &FreeList<'buf>, address: BlockAddress) -> Result<usize> {
        self.block_index(address)
            .filter(|index| free_list.header(*index).is_in_use())
            .ok_or(Error::InvalidBlockAddress { address })
    }

    fn lock(&self) -> MutexGuard<'_, FreeList<'buf>> {
        // No caller code runs with the lock held and every critical section checks its inputs
        // before writing, so a poisoned free list is still consistent.
        self.free_list
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    #[cfg(test)]
    pub(crate) fn integrity_check(&self) {
        self.lock().integrity_check();
    }
}

impl Drop for BlockPool<'_> {
    fn drop(&mut self) {
        let in_use = self
            .free_list
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .len();

        debug!(
            block_size = self.layout.block_size(),
            max_blocks = self.layout.max_blocks(),
            in_use,
            pool_type = ?self.pool_type,
            "dropping block pool"
        );
    }
}
