/// Who manages the lifetime of a pool's backing buffer.
///
/// # Examples
///
/// ```
/// use block_pool::{BlockPool, HEADER_SIZE, PoolType};
///
/// let owned = BlockPool::new(16, 2).unwrap();
/// assert_eq!(owned.pool_type(), PoolType::Owned);
///
/// let mut buffer = vec![0_u8; (16 + HEADER_SIZE) * 2];
/// let external = BlockPool::with_external_buffer(16, 2, &mut buffer).unwrap();
/// assert_eq!(external.pool_type(), PoolType::External);
/// ```
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[non_exhaustive]
pub enum PoolType {
    /// The pool acquired its buffer from a [`MemoryProvider`][crate::MemoryProvider] and releases
    /// it back to that provider when the pool is dropped.
    Owned,

    /// The pool works on a buffer borrowed from the caller. Dropping the pool ends the borrow and
    /// leaves the buffer with the caller.
    External,
}
