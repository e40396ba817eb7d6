#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! A fixed-size block allocator with constant-time allocation and no fragmentation.
//!
//! This crate provides [`BlockPool`], which carves one contiguous buffer into equally sized
//! blocks and hands them out one at a time. The buffer is either acquired from the system when
//! the pool is created or borrowed from the caller.
//!
//! # Key Features
//!
//! - **Constant time**: allocation and deallocation only touch the head of an intrusive free list
//! - **No fragmentation**: every block has the same size, so any free block satisfies any request
//! - **Owned or external memory**: place the pool in a buffer you already have, see [`PoolType`]
//! - **Checked addresses**: foreign, misaligned and double-freed addresses are rejected with
//!   [`Error::InvalidBlockAddress`] instead of corrupting the pool
//! - **Thread safe**: a pool can be shared between threads, operations are serialized by a lock
//!
//! # Memory layout
//!
//! Each block consists of a [`HEADER_SIZE`]-byte header followed by the caller's payload. Blocks
//! are packed back to back, so a pool of `max_blocks` blocks of `block_size` bytes needs
//! `(block_size + HEADER_SIZE) * max_blocks` bytes of memory.
//!
//! ```text
//! | header | payload 0 | header | payload 1 | ... | header | payload N-1 |
//!          ^                    ^                          ^
//!          first block address  + block_stride             last block address
//! ```
//!
//! The header of a free block links to the next free block. The header of a block in use marks it
//! as such, which is how invalid deallocations are detected.
//!
//! # Examples
//!
//! ## Pool with system memory
//!
//! ```rust
//! use block_pool::{BlockPool, Error};
//!
//! let pool = BlockPool::new(64, 2)?;
//!
//! let a = pool.allocate()?;
//! let b = pool.allocate()?;
//!
//! // The pool is now exhausted.
//! assert!(matches!(
//!     pool.allocate(),
//!     Err(Error::OutOfAllocatableMemory { .. })
//! ));
//!
//! // The most recently freed block is the next one handed out.
//! pool.deallocate(a)?;
//! assert_eq!(pool.allocate()?, a);
//!
//! pool.deallocate(a)?;
//! pool.deallocate(b)?;
//! # Ok::<(), Error>(())
//! ```
//!
//! ## Pool in a caller-supplied buffer
//!
//! ```rust
//! use block_pool::{BlockPool, Error, HEADER_SIZE, PoolType};
//!
//! let mut buffer = vec![0_u8; (32 + HEADER_SIZE) * 4];
//!
//! {
//!     let pool = BlockPool::with_external_buffer(32, 4, &mut buffer)?;
//!     assert_eq!(pool.pool_type(), PoolType::External);
//!
//!     let block = pool.allocate()?;
//!     pool.write_block(block, &[42])?;
//! }
//!
//! // The pool is gone but the buffer and whatever was written through the pool remain.
//! assert_eq!(buffer[HEADER_SIZE], 42);
//! # Ok::<(), Error>(())
//! ```

mod address;
mod builder;
mod error;
mod free_list;
mod header;
mod layout;
mod memory;
mod pool;
mod pool_type;

pub use address::BlockAddress;
pub(crate) use address::PoolId;
pub use builder::*;
pub use error::Error;
pub(crate) use error::Result;
pub(crate) use free_list::*;
pub(crate) use header::*;
pub use layout::HEADER_SIZE;
pub(crate) use layout::BlockLayout;
pub use memory::*;
pub use pool::BlockPool;
pub use pool_type::*;
