use crate::HEADER_SIZE;

/// The state of one block, as stored in the first [`HEADER_SIZE`] bytes of the block.
///
/// Free blocks form an intrusive singly-linked list: each free header names the index of the
/// next free block, with the last one naming nothing. In-use blocks are not part of the list.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum Header {
    Free { next: Option<usize> },

    InUse,
}

// Header words are tagged by value. Free-list links are stored biased by `LINK_BIAS` so that
// every block index maps to a word distinct from both markers. A block index is always below
// `max_blocks`, which is at most `usize::MAX / (1 + HEADER_SIZE)`, so the bias never overflows.
const FREE_TAIL_WORD: usize = 0;
const IN_USE_WORD: usize = 1;
const LINK_BIAS: usize = 2;

impl Header {
    pub(crate) fn to_word(self) -> usize {
        match self {
            Self::InUse => IN_USE_WORD,
            Self::Free { next: None } => FREE_TAIL_WORD,
            Self::Free { next: Some(index) } => index
                .checked_add(LINK_BIAS)
                .expect("block indexes are far below usize::MAX"),
        }
    }

    pub(crate) fn from_word(word: usize) -> Self {
        match word {
            FREE_TAIL_WORD => Self::Free { next: None },
            IN_USE_WORD => Self::InUse,
            link => Self::Free {
                next: Some(link.wrapping_sub(LINK_BIAS)), // link >= LINK_BIAS in this arm
            },
        }
    }

    /// Reads a header from the first [`HEADER_SIZE`] bytes of `bytes`.
    ///
    /// # Panics
    ///
    /// Panics if `bytes` is shorter than a header.
    pub(crate) fn read(bytes: &[u8]) -> Self {
        let word: [u8; HEADER_SIZE] = bytes
            .get(..HEADER_SIZE)
            .and_then(|header| header.try_into().ok())
            .expect("caller passes a slice that starts with a complete header");

        Self::from_word(usize::from_ne_bytes(word))
    }

    /// Writes this header into the first [`HEADER_SIZE`] bytes of `bytes`.
    ///
    /// # Panics
    ///
    /// Panics if `bytes` is shorter than a header.
    pub(crate) fn write(self, bytes: &mut [u8]) {
        bytes
            .get_mut(..HEADER_SIZE)
            .expect("caller passes a slice that starts with a complete header")
            .copy_from_slice(&self.to_word().to_ne_bytes());
    }

    pub(crate) fn is_in_use(self) -> bool {
        matches!(self, Self::InUse)
    }
}
