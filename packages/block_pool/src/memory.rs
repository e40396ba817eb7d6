use std::fmt::Debug;

/// Supplies and takes back the backing buffers of [`PoolType::Owned`][crate::PoolType::Owned]
/// pools.
///
/// A pool asks its provider for exactly one buffer when it is created and hands that same buffer
/// back exactly once when it is dropped. Pools created over an external buffer never talk to a
/// provider.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicUsize, Ordering};
///
/// use block_pool::{BlockPool, MemoryProvider, SystemMemory};
///
/// /// Delegates to the system but counts how many buffers are outstanding.
/// #[derive(Debug, Default)]
/// struct Counting {
///     outstanding: AtomicUsize,
/// }
///
/// impl MemoryProvider for Counting {
///     fn acquire(&self, len: usize) -> Option<Box<[u8]>> {
///         let buffer = SystemMemory.acquire(len)?;
///         self.outstanding.fetch_add(1, Ordering::Relaxed);
///         Some(buffer)
///     }
///
///     fn release(&self, buffer: Box<[u8]>) {
///         self.outstanding.fetch_sub(1, Ordering::Relaxed);
///         SystemMemory.release(buffer);
///     }
/// }
///
/// let provider = Arc::new(Counting::default());
///
/// let pool = BlockPool::builder()
///     .block_size(32)
///     .max_blocks(8)
///     .memory_provider(Arc::<Counting>::clone(&provider))
///     .build()
///     .unwrap();
///
/// assert_eq!(provider.outstanding.load(Ordering::Relaxed), 1);
///
/// drop(pool);
///
/// assert_eq!(provider.outstanding.load(Ordering::Relaxed), 0);
/// ```
#[cfg_attr(test, mockall::automock)]
pub trait MemoryProvider: Debug + Send + Sync {
    /// Acquires a buffer of exactly `len` bytes.
    ///
    /// Returns `None` if the memory cannot be provided. The contents of the buffer do not matter,
    /// the pool initializes every block header before use.
    fn acquire(&self, len: usize) -> Option<Box<[u8]>>;

    /// Takes back a buffer previously returned by [`acquire()`][Self::acquire].
    fn release(&self, buffer: Box<[u8]>);
}

/// The default [`MemoryProvider`], backed by the global allocator.
///
/// Allocation failure is reported to the pool as a failed acquisition instead of aborting the
/// process, so oversized requests surface as [`Error::OutOfSystemMemory`][crate::Error].
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemMemory;

impl MemoryProvider for SystemMemory {
    fn acquire(&self, len: usize) -> Option<Box<[u8]>> {
        let mut buffer = Vec::new();
        buffer.try_reserve_exact(len).ok()?;
        buffer.resize(len, 0);

        Some(buffer.into_boxed_slice())
    }

    fn release(&self, buffer: Box<[u8]>) {
        drop(buffer);
    }
}
