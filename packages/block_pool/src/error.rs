use thiserror::Error;

use crate::BlockAddress;

/// Errors that can occur when creating or operating a [`BlockPool`][crate::BlockPool].
///
/// None of these are fatal to an existing pool. A pool that returned an error from
/// [`allocate()`][crate::BlockPool::allocate] or [`deallocate()`][crate::BlockPool::deallocate]
/// is left exactly as it was before the call and remains fully usable.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The pool configuration was rejected before any memory was touched.
    ///
    /// This happens when the block size or block count is zero, when the total pool size would
    /// not fit in `usize` or when an external buffer is too small for the requested layout.
    #[error(
        "invalid constructor parameters (block_size = {block_size}, max_blocks = {max_blocks}): {problem}"
    )]
    InvalidParameters {
        /// The requested payload size of each block.
        block_size: usize,

        /// The requested number of blocks.
        max_blocks: usize,

        /// A human-readable description of the problem.
        problem: &'static str,
    },

    /// The memory provider could not supply a buffer of the required size.
    #[error("cannot acquire enough memory from the system ({bytes} bytes requested)")]
    OutOfSystemMemory {
        /// The number of bytes that were requested from the memory provider.
        bytes: usize,
    },

    /// Every block of the pool is currently in use.
    ///
    /// The caller may retry after some block has been returned to the pool.
    #[error("out of free blocks in pool (all {max_blocks} blocks are in use)")]
    OutOfAllocatableMemory {
        /// The capacity of the pool that ran out of blocks.
        max_blocks: usize,
    },

    /// The address does not name a block of this pool that is currently in use.
    ///
    /// This covers addresses from other pools, addresses that do not fall on a block boundary
    /// and blocks that are already free (double deallocation).
    #[error("invalid block address {address}")]
    InvalidBlockAddress {
        /// The rejected address.
        address: BlockAddress,
    },

    /// The data written to a block is longer than the block's payload.
    #[error("payload of {len} bytes does not fit in a block of {block_size} bytes")]
    PayloadTooLarge {
        /// The length of the rejected data.
        len: usize,

        /// The payload size of each block of the pool.
        block_size: usize,
    },
}

/// A specialized `Result` type for block pool operations, returning the crate's
/// [`Error`] type as the error value.
pub(crate) type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::fmt::Debug;

    use static_assertions::assert_impl_all;

    use super::*;

    assert_impl_all!(Error: Send, Sync, Debug);

    #[test]
    fn invalid_parameters_message_names_the_problem() {
        let error = Error::InvalidParameters {
            block_size: 0,
            max_blocks: 1,
            problem: "block size must be non-zero",
        };

        let message = error.to_string();
        assert!(message.starts_with("invalid constructor parameters"));
        assert!(message.contains("block size must be non-zero"));
    }

    #[test]
    fn out_of_system_memory_message() {
        let error = Error::OutOfSystemMemory { bytes: 1024 };

        assert_eq!(
            error.to_string(),
            "cannot acquire enough memory from the system (1024 bytes requested)"
        );
    }

    #[test]
    fn out_of_allocatable_memory_message() {
        let error = Error::OutOfAllocatableMemory { max_blocks: 4 };

        assert_eq!(
            error.to_string(),
            "out of free blocks in pool (all 4 blocks are in use)"
        );
    }

    #[test]
    fn payload_too_large_message() {
        let error = Error::PayloadTooLarge {
            len: 17,
            block_size: 16,
        };

        assert_eq!(
            error.to_string(),
            "payload of 17 bytes does not fit in a block of 16 bytes"
        );
    }
}
