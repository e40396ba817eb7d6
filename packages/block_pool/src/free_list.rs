use std::fmt;
use std::mem;
use std::sync::Arc;

use crate::{BlockLayout, Header, MemoryProvider, PoolType};

/// The memory that holds the blocks of a pool.
pub(crate) enum Backing<'buf> {
    Owned {
        buffer: Box<[u8]>,
        provider: Arc<dyn MemoryProvider>,
    },

    External(&'buf mut [u8]),
}

impl Backing<'_> {
    pub(crate) fn pool_type(&self) -> PoolType {
        match self {
            Self::Owned { .. } => PoolType::Owned,
            Self::External(_) => PoolType::External,
        }
    }

    fn bytes(&self) -> &[u8] {
        match self {
            Self::Owned { buffer, .. } => &**buffer,
            Self::External(buffer) => &**buffer,
        }
    }

    fn bytes_mut(&mut self) -> &mut [u8] {
        match self {
            Self::Owned { buffer, .. } => &mut **buffer,
            Self::External(buffer) => &mut **buffer,
        }
    }
}

impl fmt::Debug for Backing<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Owned { buffer, provider } => f
                .debug_struct("Owned")
                .field("len", &buffer.len())
                .field("provider", provider)
                .finish(),
            Self::External(buffer) => f
                .debug_struct("External")
                .field("len", &buffer.len())
                .finish(),
        }
    }
}

impl Drop for Backing<'_> {
    fn drop(&mut self) {
        // External buffers belong to the caller, the borrow simply ends here.
        if let Self::Owned { buffer, provider } = self {
            provider.release(mem::take(buffer));
        }
    }
}

/// The blocks of a pool and the intrusive list of the free ones among them.
///
/// Think of the free list as a stack of the most recently freed blocks, with the stack entries
/// stored in the block headers themselves. Popping and pushing touch only the head of the stack,
/// so both are O(1) regardless of pool size.
///
/// This type is not synchronized. The owning pool serializes all access through its lock.
#[derive(Debug)]
pub(crate) struct FreeList<'buf> {
    layout: BlockLayout,

    backing: Backing<'buf>,

    /// Index of the first free block, `None` if every block is in use.
    head: Option<usize>,

    /// Number of blocks currently in use.
    in_use: usize,
}

impl<'buf> FreeList<'buf> {
    /// Marks every block as free, linked in ascending address order.
    ///
    /// # Panics
    ///
    /// Panics if the backing buffer is smaller than the layout requires.
    pub(crate) fn new(layout: BlockLayout, backing: Backing<'buf>) -> Self {
        assert!(
            backing.bytes().len() >= layout.total_size(),
            "backing buffer of {} bytes cannot hold {} bytes of blocks",
            backing.bytes().len(),
            layout.total_size()
        );

        let mut free_list = Self {
            layout,
            backing,
            head: Some(0),
            in_use: 0,
        };

        let max_blocks = layout.max_blocks();

        for index in 0..max_blocks {
            // For the last block this is `None`, terminating the list.
            let next = index.checked_add(1).filter(|next| *next < max_blocks);

            free_list.write_header(index, Header::Free { next });
        }

        free_list
    }

    #[cfg(test)]
    pub(crate) fn pool_type(&self) -> PoolType {
        self.backing.pool_type()
    }

    pub(crate) fn len(&self) -> usize {
        self.in_use
    }

    pub(crate) fn is_full(&self) -> bool {
        self.head.is_none()
    }

    /// Detaches the first free block and marks it as in use.
    ///
    /// Returns `None` without changing anything if no block is free.
    pub(crate) fn pop(&mut self) -> Option<usize> {
        let index = self.head?;

        self.head = match self.header(index) {
            Header::Free { next } => next,
            Header::InUse => panic!("block {index} at the head of the free list is in use"),
        };

        self.write_header(index, Header::InUse);

        self.in_use = self
            .in_use
            .checked_add(1)
            .expect("cannot have more blocks in use than exist in the pool");

        Some(index)
    }

    /// Returns an in-use block to the head of the free list.
    ///
    /// Returns `false` without changing anything if the block is not currently in use.
    ///
    /// # Panics
    ///
    /// Panics if the index is out of bounds.
    pub(crate) fn push(&mut self, index: usize) -> bool {
        if !self.header(index).is_in_use() {
            return false;
        }

        self.write_header(index, Header::Free { next: self.head });
        self.head = Some(index);

        self.in_use = self
            .in_use
            .checked_sub(1)
            .expect("we checked above that the block is in use so count must be non-zero");

        true
    }

    /// # Panics
    ///
    /// Panics if the index is out of bounds.
    pub(crate) fn header(&self, index: usize) -> Header {
        let range = self.layout.header_range(index);

        Header::read(
            self.backing
                .bytes()
                .get(range)
                .expect("buffer length verified in ctor"),
        )
    }

    fn write_header(&mut self, index: usize, header: Header) {
        let range = self.layout.header_range(index);

        header.write(
            self.backing
                .bytes_mut()
                .get_mut(range)
                .expect("buffer length verified in ctor"),
        );
    }

    /// # Panics
    ///
    /// Panics if the index is out of bounds.
    pub(crate) fn payload(&self, index: usize) -> &[u8] {
        let range = self.layout.payload_range(index);

        self.backing
            .bytes()
            .get(range)
            .expect("buffer length verified in ctor")
    }

    /// # Panics
    ///
    /// Panics if the index is out of bounds.
    pub(crate) fn payload_mut(&mut self, index: usize) -> &mut [u8] {
        let range = self.layout.payload_range(index);

        self.backing
            .bytes_mut()
            .get_mut(range)
            .expect("buffer length verified in ctor")
    }

    /// Walks the free list and every header, asserting that the two views agree.
    #[cfg(test)]
    #[cfg_attr(test, mutants::skip)] // This is essentially test logic, mutation is meaningless.
    pub(crate) fn integrity_check(&self) {
        let max_blocks = self.layout.max_blocks();
        let mut on_free_list = vec![false; max_blocks];
        let mut free_count: usize = 0;

        let mut cursor = self.head;

        while let Some(index) = cursor {
            assert!(
                index < max_blocks,
                "free list links to block {index} outside pool of {max_blocks} blocks"
            );
            assert!(!on_free_list[index], "free list visits block {index} twice");

            on_free_list[index] = true;
            free_count += 1;

            cursor = match self.header(index) {
                Header::Free { next } => next,
                Header::InUse => panic!("block {index} is on the free list but marked in use"),
            };
        }

        for (index, listed) in on_free_list.iter().enumerate() {
            if !listed {
                assert_eq!(
                    self.header(index),
                    Header::InUse,
                    "block {index} is neither on the free list nor in use"
                );
            }
        }

        assert_eq!(
            free_count + self.in_use,
            max_blocks,
            "free and in-use blocks do not add up to the pool size"
        );
    }
}
