//! Byte Queue
//!
//! Flat ring buffer holding length-prefixed blocks without per-entry heap
//! objects. Writes append at `tail`, eviction pops from `head`.
//!
//! # Layout
//!
//! ```text
//! linear:   [ free | head ..live.. tail | free ]
//! wrapped:  [ ..live.. tail | free | head ..live.. right_margin | slack ]
//! ```
//!
//! A push that does not fit after `tail` first tries to wrap to the start of
//! the buffer, then grows by doubling (capped at `max_capacity`). Growth
//! compacts live blocks to offset zero and reports the offset mapping as a
//! [`Relocation`] so that owners of stored offsets can rewrite them. A push
//! never evicts; a bounded queue that cannot grow returns
//! [`QueueError::Full`] and the caller decides what to pop.

use thiserror::Error;

/// Size of the length prefix in front of every block
pub const BLOCK_HEADER_SIZE: usize = 4;

/// Largest block payload the length prefix can describe
pub const MAX_BLOCK_SIZE: usize = u32::MAX as usize;

/// Byte queue errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueueError {
    /// Pop on an empty queue
    #[error("Queue is empty")]
    Empty,

    /// Bounded queue cannot make room without eviction
    #[error("Queue is full: {requested} bytes requested, capacity limit is {capacity} bytes")]
    Full { requested: usize, capacity: usize },

    /// Offset outside the live region
    #[error("Offset {offset} does not reference a live block")]
    InvalidOffset { offset: usize },

    /// Length prefix points past the end of the live region
    #[error("Block at offset {offset} is corrupted")]
    Corrupted { offset: usize },

    /// Payload longer than the length prefix allows
    #[error("Block of {len} bytes exceeds the maximum block size")]
    BlockTooLarge { len: usize },
}

/// Offset mapping produced when growth compacts the queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Relocation {
    head: usize,
    right_margin: usize,
}

impl Relocation {
    /// Map an offset that was live before the relocation to its new position
    #[inline]
    pub fn apply(&self, offset: usize) -> usize {
        if offset >= self.head {
            offset - self.head
        } else {
            offset + (self.right_margin - self.head)
        }
    }
}

/// Result of a successful push
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pushed {
    /// Offset of the new block, valid after any relocation
    pub offset: usize,
    /// Set when previously returned offsets moved
    pub relocation: Option<Relocation>,
}

/// Ring buffer of length-prefixed byte blocks
#[derive(Debug)]
pub struct BytesQueue {
    buf: Vec<u8>,
    head: usize,
    tail: usize,
    /// End of the live region that starts at `head` while wrapped
    right_margin: usize,
    wrapped: bool,
    count: usize,
    max_capacity: Option<usize>,
}

impl BytesQueue {
    /// Create a queue with `initial_capacity` bytes, optionally capped
    pub fn new(initial_capacity: usize, max_capacity: Option<usize>) -> Self {
        let capacity = match max_capacity {
            Some(max) => initial_capacity.min(max),
            None => initial_capacity,
        };
        Self {
            buf: vec![0; capacity],
            head: 0,
            tail: 0,
            right_margin: 0,
            wrapped: false,
            count: 0,
            max_capacity,
        }
    }

    /// Append a block, returning its offset
    pub fn push(&mut self, data: &[u8]) -> Result<Pushed, QueueError> {
        if data.len() > MAX_BLOCK_SIZE {
            return Err(QueueError::BlockTooLarge { len: data.len() });
        }
        let need = BLOCK_HEADER_SIZE + data.len();

        if self.count == 0 {
            self.reset();
        }

        let mut relocation = None;
        let offset = if !self.wrapped {
            if self.capacity() - self.tail >= need {
                self.tail
            } else if self.head >= need {
                self.wrapped = true;
                0
            } else {
                relocation = self.grow(need)?;
                self.tail
            }
        } else if self.head - self.tail >= need {
            self.tail
        } else {
            relocation = self.grow(need)?;
            self.tail
        };

        self.write_block(offset, data);
        self.tail = offset + need;
        if !self.wrapped {
            self.right_margin = self.tail;
        }
        self.count += 1;

        Ok(Pushed { offset, relocation })
    }

    /// Remove the block at `head`, returning its offset and payload
    pub fn pop(&mut self) -> Result<(usize, &[u8]), QueueError> {
        if self.count == 0 {
            return Err(QueueError::Empty);
        }
        let offset = self.head;
        let (start, end) = self.block_bounds(offset)?;

        self.head = end;
        self.count -= 1;
        if self.wrapped && self.head == self.right_margin {
            self.head = 0;
            self.wrapped = false;
            self.right_margin = self.tail;
        }
        if self.count == 0 {
            // Bytes stay in place, so the returned slice is still valid.
            self.reset();
        }

        Ok((offset, &self.buf[start..end]))
    }

    /// Read the block at `offset` without moving any cursor
    pub fn peek(&self, offset: usize) -> Result<&[u8], QueueError> {
        let (start, end) = self.block_bounds(offset)?;
        Ok(&self.buf[start..end])
    }

    /// Mutable access to the payload at `offset`, for same-length overwrites
    pub fn peek_mut(&mut self, offset: usize) -> Result<&mut [u8], QueueError> {
        let (start, end) = self.block_bounds(offset)?;
        Ok(&mut self.buf[start..end])
    }

    /// Offset of the oldest block
    pub fn head_offset(&self) -> Option<usize> {
        (self.count > 0).then_some(self.head)
    }

    /// Payload of the oldest block
    pub fn peek_head(&self) -> Result<&[u8], QueueError> {
        if self.count == 0 {
            return Err(QueueError::Empty);
        }
        self.peek(self.head)
    }

    /// Drop every block while keeping the allocation
    pub fn reset(&mut self) {
        self.head = 0;
        self.tail = 0;
        self.right_margin = 0;
        self.wrapped = false;
        self.count = 0;
    }

    /// Number of live blocks
    pub fn len(&self) -> usize {
        self.count
    }

    /// True when no block is live
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Allocated bytes
    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Growth ceiling, if any
    pub fn max_capacity(&self) -> Option<usize> {
        self.max_capacity
    }

    /// Bytes held by live blocks, length prefixes included
    pub fn used_bytes(&self) -> usize {
        if self.count == 0 {
            0
        } else if self.wrapped {
            (self.right_margin - self.head) + self.tail
        } else {
            self.tail - self.head
        }
    }

    fn segment_end(&self, offset: usize) -> Option<usize> {
        if self.count == 0 {
            return None;
        }
        if self.wrapped {
            if offset >= self.head && offset < self.right_margin {
                Some(self.right_margin)
            } else if offset < self.tail {
                Some(self.tail)
            } else {
                None
            }
        } else if offset >= self.head && offset < self.tail {
            Some(self.tail)
        } else {
            None
        }
    }

    /// Payload range of the block at `offset`, bounds-checked against the
    /// live segment containing it
    fn block_bounds(&self, offset: usize) -> Result<(usize, usize), QueueError> {
        let segment_end = self
            .segment_end(offset)
            .ok_or(QueueError::InvalidOffset { offset })?;

        let start = offset + BLOCK_HEADER_SIZE;
        if start > segment_end {
            return Err(QueueError::Corrupted { offset });
        }
        let mut raw = [0u8; BLOCK_HEADER_SIZE];
        raw.copy_from_slice(&self.buf[offset..start]);
        let end = start + u32::from_le_bytes(raw) as usize;
        if end > segment_end {
            return Err(QueueError::Corrupted { offset });
        }
        Ok((start, end))
    }

    fn write_block(&mut self, offset: usize, data: &[u8]) {
        let start = offset + BLOCK_HEADER_SIZE;
        self.buf[offset..start].copy_from_slice(&(data.len() as u32).to_le_bytes());
        self.buf[start..start + data.len()].copy_from_slice(data);
    }

    /// Compact the live region to offset 0 so that `need` more bytes fit after
    /// it, enlarging the buffer in place when compaction alone is not enough
    fn grow(&mut self, need: usize) -> Result<Option<Relocation>, QueueError> {
        let used = self.used_bytes();
        let required = used + need;
        let old_capacity = self.capacity();

        let mut new_capacity = old_capacity.max(1).saturating_mul(2);
        while new_capacity < required {
            new_capacity = new_capacity.saturating_mul(2);
        }
        if let Some(max) = self.max_capacity {
            new_capacity = new_capacity.min(max);
            if new_capacity < required {
                return Err(QueueError::Full {
                    requested: need,
                    capacity: max,
                });
            }
        }

        // At the cap this is a no-op and the compaction below reuses the buffer.
        if new_capacity > old_capacity {
            self.buf.resize(new_capacity, 0);
        }

        let relocation = if self.wrapped {
            // [front | gap | back] becomes [back | front | gap].
            self.buf[..self.right_margin].rotate_left(self.head);
            Some(Relocation {
                head: self.head,
                right_margin: self.right_margin,
            })
        } else if self.head > 0 {
            self.buf.copy_within(self.head..self.tail, 0);
            Some(Relocation {
                head: self.head,
                right_margin: self.tail,
            })
        } else {
            None
        };

        tracing::debug!(
            old_capacity,
            new_capacity,
            relocated = relocation.is_some(),
            "Grew byte queue"
        );

        self.head = 0;
        self.tail = used;
        self.right_margin = used;
        self.wrapped = false;

        Ok(relocation)
    }
}

// =============================================================================
// Tests
// =============================================================================
