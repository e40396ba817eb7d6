use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::{Backing, BlockLayout, BlockPool, Error, MemoryProvider, Result, SystemMemory};

/// Builder for creating an instance of [`BlockPool`].
///
/// [`BlockPool::new()`] and [`BlockPool::with_external_buffer()`] cover the common cases. Use the
/// builder when you also want to supply a custom [`MemoryProvider`].
///
/// Both the block size and the block count must be set to non-zero values, otherwise
/// [`build()`][Self::build] fails with [`Error::InvalidParameters`].
///
/// # Examples
///
/// ```
/// use block_pool::{BlockPool, PoolType};
///
/// let pool = BlockPool::builder()
///     .block_size(128)
///     .max_blocks(16)
///     .build()
///     .unwrap();
///
/// assert_eq!(pool.block_size(), 128);
/// assert_eq!(pool.max_blocks(), 16);
/// assert_eq!(pool.pool_type(), PoolType::Owned);
/// ```
#[must_use]
pub struct BlockPoolBuilder<'buf> {
    block_size: usize,
    max_blocks: usize,
    external_buffer: Option<&'buf mut [u8]>,
    memory_provider: Option<Arc<dyn MemoryProvider>>,
}

impl fmt::Debug for BlockPoolBuilder<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockPoolBuilder")
            .field("block_size", &self.block_size)
            .field("max_blocks", &self.max_blocks)
            .field(
                "external_buffer_len",
                &self.external_buffer.as_ref().map(|buffer| buffer.len()),
            )
            .field("memory_provider", &self.memory_provider)
            .finish()
    }
}

impl<'buf> BlockPoolBuilder<'buf> {
    pub(crate) fn new() -> Self {
        Self {
            block_size: 0,
            max_blocks: 0,
            external_buffer: None,
            memory_provider: None,
        }
    }

    /// Sets the payload size of each block, in bytes.
    ///
    /// Any non-zero size is accepted, including sizes smaller than [`HEADER_SIZE`][1].
    ///
    /// [1]: crate::HEADER_SIZE
    pub fn block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size;
        self
    }

    /// Sets the number of blocks in the pool. The pool never grows beyond this.
    pub fn max_blocks(mut self, max_blocks: usize) -> Self {
        self.max_blocks = max_blocks;
        self
    }

    /// Places the pool in a caller-supplied buffer instead of acquiring memory.
    ///
    /// The buffer must be at least `(block_size + HEADER_SIZE) * max_blocks` bytes long. Any
    /// bytes past that are left untouched. The pool borrows the buffer until it is dropped and
    /// never releases it.
    ///
    /// When an external buffer is set, the [memory provider][Self::memory_provider] is not used.
    ///
    /// # Examples
    ///
    /// ```
    /// use block_pool::{BlockPool, HEADER_SIZE, PoolType};
    ///
    /// let mut buffer = vec![0_u8; (32 + HEADER_SIZE) * 4];
    ///
    /// let pool = BlockPool::builder()
    ///     .block_size(32)
    ///     .max_blocks(4)
    ///     .external_buffer(&mut buffer)
    ///     .build()
    ///     .unwrap();
    ///
    /// assert_eq!(pool.pool_type(), PoolType::External);
    /// ```
    pub fn external_buffer(mut self, buffer: &'buf mut [u8]) -> Self {
        self.external_buffer = Some(buffer);
        self
    }

    /// Sets the provider that supplies and takes back the pool's buffer.
    ///
    /// Defaults to [`SystemMemory`].
    pub fn memory_provider(mut self, provider: Arc<dyn MemoryProvider>) -> Self {
        self.memory_provider = Some(provider);
        self
    }

    /// Validates the configuration and builds the pool, with every block free.
    ///
    /// # Errors
    ///
    /// * [`Error::InvalidParameters`] if the block size or block count is zero, if the total pool
    ///   size does not fit in `usize` or if the external buffer is too small.
    /// * [`Error::OutOfSystemMemory`] if the memory provider cannot supply the buffer.
    pub fn build(self) -> Result<BlockPool<'buf>> {
        let layout = BlockLayout::new(self.block_size, self.max_blocks)?;
        let total_size = layout.total_size();

        let backing = match self.external_buffer {
            Some(buffer) => {
                let Some(buffer) = buffer.get_mut(..total_size) else {
                    return Err(Error::InvalidParameters {
                        block_size: self.block_size,
                        max_blocks: self.max_blocks,
                        problem: "external buffer is smaller than (block_size + HEADER_SIZE) * max_blocks",
                    });
                };

                Backing::External(buffer)
            }
            None => {
                let provider = self
                    .memory_provider
                    .unwrap_or_else(|| Arc::new(SystemMemory));

                let buffer = provider
                    .acquire(total_size)
                    .ok_or(Error::OutOfSystemMemory { bytes: total_size })?;

                if buffer.len() < total_size {
                    // A provider that hands out less than asked for has failed just the same.
                    provider.release(buffer);
                    return Err(Error::OutOfSystemMemory { bytes: total_size });
                }

                Backing::Owned { buffer, provider }
            }
        };

        let pool = BlockPool::from_parts(layout, backing);

        debug!(
            block_size = layout.block_size(),
            max_blocks = layout.max_blocks(),
            total_size,
            pool_type = ?pool.pool_type(),
            "created block pool"
        );

        Ok(pool)
    }
}
