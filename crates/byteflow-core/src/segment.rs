//! Segment - The Fixed-Size Block Behind Every Buffer
//!
//! This module implements `Segment`, the storage unit that buffers chain together.
//!
//! ## What Is a Segment?
//!
//! A segment is a handle onto a fixed 8 KiB byte block, with a read cursor and a
//! write cursor:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │ block (SEGMENT_SIZE = 8192 bytes)                           │
//! │                                                             │
//! │ ├── consumed ──┤├── readable ──┤├──── writable ────┤        │
//! │ 0             pos            limit            SEGMENT_SIZE  │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! - `[0, pos)` has been read and can be reclaimed by shifting
//! - `[pos, limit)` is the readable range; its length is `len()`
//! - `[limit, SEGMENT_SIZE)` is free space for appends
//!
//! ## Sharing and Ownership
//!
//! The same block may be referenced by several segment handles at once: a buffer's
//! segment, a snapshot chunk, and a split prefix can all point at one allocation.
//! Two flags encode the aliasing discipline:
//!
//! - **owner**: exactly one handle per block may append at `limit`. A freshly
//!   allocated segment owns its block; copies produced by `shared_copy` never do.
//! - **shared**: set on *both* handles the moment a block is aliased, and sticky
//!   for the rest of the handle's life. A shared handle is read-only: its bytes
//!   are frozen, only `pos` may advance, and the block is never handed back to
//!   the pool (the last handle to drop frees it through the allocator instead).
//!
//! Every mutation path requires `owner && !shared`. Because a block is only ever
//! aliased through `shared_copy`, an unshared segment is provably the unique
//! referent of its `Arc`, which is what makes in-place writes sound.
//!
//! ## Split Policy
//!
//! `split(n)` carves the first `n` readable bytes into a new segment that goes in
//! front of this one. Large prefixes (`n >= SHARE_MINIMUM`) are shared copies of
//! the same block: no bytes move, but the block becomes permanently shared and
//! unrecyclable. Small prefixes are copied into a fresh pool segment instead,
//! which keeps short-lived transfers from pinning 8 KiB blocks forever.
//!
//! ## Thread Safety
//!
//! A segment handle is owned by exactly one buffer (or snapshot) and is not
//! synchronized. Blocks are `Arc`-backed, so handles may migrate between threads
//! with their owning buffer.

use std::fmt;
use std::sync::Arc;

use crate::pool;

/// Capacity of every segment block in bytes.
pub const SEGMENT_SIZE: usize = 8192;

/// Smallest split prefix that is shared rather than copied.
pub const SHARE_MINIMUM: usize = 1024;

/// The underlying fixed-size allocation.
pub(crate) type Block = [u8; SEGMENT_SIZE];

/// A handle onto one block: cursors, sharing state, and the block itself.
pub(crate) struct Segment {
    /// The backing block. Unshared segments hold the only reference.
    block: Arc<Block>,

    /// Index of the next readable byte.
    pos: usize,

    /// Index one past the last readable byte.
    limit: usize,

    /// True once the block is aliased by another handle. Sticky.
    shared: bool,

    /// True iff this handle may append at `limit`.
    owner: bool,
}

impl Segment {
    /// Allocate a segment with a brand-new zeroed block.
    pub(crate) fn fresh() -> Self {
        Self {
            block: Arc::new([0u8; SEGMENT_SIZE]),
            pos: 0,
            limit: 0,
            shared: false,
            owner: true,
        }
    }

    /// Number of readable bytes, `limit - pos`.
    pub(crate) fn len(&self) -> usize {
        self.limit - self.pos
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.pos == self.limit
    }

    pub(crate) fn is_shared(&self) -> bool {
        self.shared
    }

    /// True iff this handle may mutate the block: appends, shifts, absorbs.
    pub(crate) fn is_writable(&self) -> bool {
        self.owner && !self.shared
    }

    /// The readable bytes, `[pos, limit)`.
    pub(crate) fn data(&self) -> &[u8] {
        &self.block[self.pos..self.limit]
    }

    /// Free bytes at the end of the block, without shifting.
    pub(crate) fn tail_capacity(&self) -> usize {
        SEGMENT_SIZE - self.limit
    }

    /// Free bytes available once consumed space is reclaimed by a shift.
    /// Shared blocks cannot shift, so their consumed prefix stays lost.
    pub(crate) fn total_capacity(&self) -> usize {
        SEGMENT_SIZE - self.limit + if self.shared { 0 } else { self.pos }
    }

    /// Exclusive access to the block. Only legal while unshared: the `Arc` is
    /// then the unique referent. A failure here is a bug in this library.
    fn block_mut(&mut self) -> &mut Block {
        debug_assert!(self.is_writable());
        Arc::get_mut(&mut self.block).expect("segment block is aliased but not marked shared")
    }

    /// Slide the readable range to the front of the block, reclaiming the
    /// consumed prefix as writable space.
    fn shift(&mut self) {
        let (pos, limit) = (self.pos, self.limit);
        if pos == 0 {
            return;
        }
        self.block_mut().copy_within(pos..limit, 0);
        self.pos = 0;
        self.limit = limit - pos;
    }

    /// Append `src` at `limit`. The caller has checked that it fits.
    pub(crate) fn put(&mut self, src: &[u8]) {
        debug_assert!(src.len() <= self.tail_capacity());
        let limit = self.limit;
        self.block_mut()[limit..limit + src.len()].copy_from_slice(src);
        self.limit += src.len();
    }

    /// Consume exactly `dst.len()` bytes from the front of the readable range.
    pub(crate) fn read(&mut self, dst: &mut [u8]) {
        debug_assert!(dst.len() <= self.len());
        dst.copy_from_slice(&self.block[self.pos..self.pos + dst.len()]);
        self.pos += dst.len();
    }

    /// Discard `n` readable bytes.
    pub(crate) fn advance(&mut self, n: usize) {
        debug_assert!(n <= self.len());
        self.pos += n;
    }

    /// The writable range `[limit, SEGMENT_SIZE)`, for scoped tail filling.
    pub(crate) fn free_space_mut(&mut self) -> &mut [u8] {
        let limit = self.limit;
        &mut self.block_mut()[limit..]
    }

    /// Extend `limit` over bytes a producer wrote into `free_space_mut`.
    pub(crate) fn commit(&mut self, n: usize) {
        debug_assert!(self.limit + n <= SEGMENT_SIZE);
        self.limit += n;
    }

    /// Alias this segment's block. Marks both handles shared; the returned
    /// handle observes the readable range frozen at this moment and never owns.
    pub(crate) fn shared_copy(&mut self) -> Segment {
        self.shared = true;
        Segment {
            block: Arc::clone(&self.block),
            pos: self.pos,
            limit: self.limit,
            shared: true,
            owner: false,
        }
    }

    /// Alias a sub-range of an already-shared segment, offsets relative to the
    /// readable range. Used by snapshot slicing.
    pub(crate) fn alias_range(&self, start: usize, end: usize) -> Segment {
        debug_assert!(self.shared);
        debug_assert!(start <= end && end <= self.len());
        Segment {
            block: Arc::clone(&self.block),
            pos: self.pos + start,
            limit: self.pos + end,
            shared: true,
            owner: false,
        }
    }

    /// Split the first `n` readable bytes into a segment that precedes this one.
    ///
    /// Prefixes of `SHARE_MINIMUM` bytes or more become shared copies of the
    /// same block; smaller prefixes are copied into a fresh pool segment. The
    /// heuristic trades per-byte copy cost against keeping small, permanently
    /// unrecyclable shared fragments alive.
    pub(crate) fn split(&mut self, n: usize) -> Segment {
        debug_assert!(n > 0 && n <= self.len());
        let prefix = if n >= SHARE_MINIMUM {
            let mut prefix = self.shared_copy();
            prefix.limit = prefix.pos + n;
            prefix
        } else {
            let mut prefix = pool::take();
            prefix.put(&self.block[self.pos..self.pos + n]);
            prefix
        };
        self.pos += n;
        prefix
    }

    /// Move `n` bytes from the front of this segment to the back of `sink`.
    ///
    /// `sink` must be writable and must have `n` bytes of total capacity; if the
    /// tail alone is too small, `sink` is first shifted to reclaim its consumed
    /// prefix. Both cursors advance.
    pub(crate) fn write_to(&mut self, sink: &mut Segment, n: usize) {
        debug_assert!(sink.is_writable());
        debug_assert!(n <= self.len());
        debug_assert!(n <= sink.total_capacity());
        if sink.limit + n > SEGMENT_SIZE {
            sink.shift();
        }
        let src = &self.block[self.pos..self.pos + n];
        let limit = sink.limit;
        sink.block_mut()[limit..limit + n].copy_from_slice(src);
        sink.limit += n;
        self.pos += n;
    }

    /// Offset of `byte` within the readable range, scanning relative offsets
    /// `[start, end)`. `end` is clamped to `len()`.
    pub(crate) fn index_of(&self, byte: u8, start: usize, end: usize) -> Option<usize> {
        let end = end.min(self.len());
        if start >= end {
            return None;
        }
        self.data()[start..end]
            .iter()
            .position(|&b| b == byte)
            .map(|i| i + start)
    }

    /// First occurrence of `pattern` lying entirely inside the readable range,
    /// candidates starting at relative offset `start`.
    pub(crate) fn index_of_bytes_inbound(&self, pattern: &[u8], start: usize) -> Option<usize> {
        let data = self.data();
        if pattern.is_empty() || pattern.len() > data.len() {
            return None;
        }
        let last = data.len() - pattern.len();
        (start..=last).find(|&i| &data[i..i + pattern.len()] == pattern)
    }

    /// Restore the cleared state the pool hands out: empty cursors, sole owner.
    /// Never called on shared segments (they are not recycled).
    pub(crate) fn reset(&mut self) {
        debug_assert!(!self.shared);
        self.pos = 0;
        self.limit = 0;
        self.owner = true;
    }

    /// Identity of the backing block, for aliasing assertions in tests.
    #[cfg(test)]
    pub(crate) fn block_ptr(&self) -> *const u8 {
        self.block.as_ptr()
    }
}

impl fmt::Debug for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Segment")
            .field("pos", &self.pos)
            .field("limit", &self.limit)
            .field("shared", &self.shared)
            .field("owner", &self.owner)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ---------------------------------------------------------------
    // Cursor basics
    // ---------------------------------------------------------------

    #[test]
    fn test_fresh_segment_is_empty_and_writable() {
        let seg = Segment::fresh();
        assert_eq!(seg.len(), 0);
        assert!(seg.is_empty());
        assert!(seg.is_writable());
        assert!(!seg.is_shared());
        assert_eq!(seg.tail_capacity(), SEGMENT_SIZE);
        assert_eq!(seg.total_capacity(), SEGMENT_SIZE);
    }

    #[test]
    fn test_put_then_read_round_trips() {
        let mut seg = Segment::fresh();
        seg.put(b"hello segment");
        assert_eq!(seg.len(), 13);
        assert_eq!(seg.data(), b"hello segment");

        let mut dst = [0u8; 5];
        seg.read(&mut dst);
        assert_eq!(&dst, b"hello");
        assert_eq!(seg.len(), 8);
        assert_eq!(seg.data(), b" segment");
    }

    #[test]
    fn test_advance_discards_bytes() {
        let mut seg = Segment::fresh();
        seg.put(&[1, 2, 3, 4]);
        seg.advance(3);
        assert_eq!(seg.data(), &[4]);
    }

    #[test]
    fn test_total_capacity_counts_consumed_prefix() {
        let mut seg = Segment::fresh();
        seg.put(&[0u8; 100]);
        seg.advance(40);
        assert_eq!(seg.tail_capacity(), SEGMENT_SIZE - 100);
        assert_eq!(seg.total_capacity(), SEGMENT_SIZE - 60);
    }

    // ---------------------------------------------------------------
    // Sharing
    // ---------------------------------------------------------------

    #[test]
    fn test_shared_copy_freezes_range_and_marks_both() {
        let mut seg = Segment::fresh();
        seg.put(b"frozen");
        let copy = seg.shared_copy();

        assert!(seg.is_shared());
        assert!(copy.is_shared());
        assert!(!copy.is_writable());
        assert!(!seg.is_writable());
        assert_eq!(copy.data(), b"frozen");
        assert_eq!(seg.block_ptr(), copy.block_ptr());
    }

    #[test]
    fn test_shared_total_capacity_ignores_consumed_prefix() {
        let mut seg = Segment::fresh();
        seg.put(&[0u8; 200]);
        seg.advance(50);
        let copy = seg.shared_copy();
        // A shared block cannot shift, so only the true tail counts.
        assert_eq!(seg.total_capacity(), SEGMENT_SIZE - 200);
        assert_eq!(copy.total_capacity(), SEGMENT_SIZE - 200);
    }

    #[test]
    fn test_alias_range_clips_cursors() {
        let mut seg = Segment::fresh();
        seg.put(b"abcdefgh");
        let copy = seg.shared_copy();
        let mid = copy.alias_range(2, 6);
        assert_eq!(mid.data(), b"cdef");
        assert_eq!(mid.block_ptr(), seg.block_ptr());
    }

    // ---------------------------------------------------------------
    // Split policy
    // ---------------------------------------------------------------

    #[test]
    fn test_split_small_prefix_copies_into_fresh_block() {
        let mut seg = Segment::fresh();
        let payload: Vec<u8> = (0..2048).map(|i| (i & 0xFF) as u8).collect();
        seg.put(&payload);

        let prefix = seg.split(SHARE_MINIMUM - 1);
        assert_ne!(prefix.block_ptr(), seg.block_ptr());
        assert!(!prefix.is_shared());
        assert!(!seg.is_shared());
        assert_eq!(prefix.data(), &payload[..SHARE_MINIMUM - 1]);
        assert_eq!(seg.data(), &payload[SHARE_MINIMUM - 1..]);
    }

    #[test]
    fn test_split_large_prefix_shares_the_block() {
        let mut seg = Segment::fresh();
        let payload: Vec<u8> = (0..4096).map(|i| (i & 0xFF) as u8).collect();
        seg.put(&payload);

        let prefix = seg.split(SHARE_MINIMUM);
        assert_eq!(prefix.block_ptr(), seg.block_ptr());
        assert!(prefix.is_shared());
        assert!(seg.is_shared());
        assert_eq!(prefix.data(), &payload[..SHARE_MINIMUM]);
        assert_eq!(seg.data(), &payload[SHARE_MINIMUM..]);
    }

    // ---------------------------------------------------------------
    // write_to
    // ---------------------------------------------------------------

    #[test]
    fn test_write_to_moves_bytes_and_advances_both() {
        let mut src = Segment::fresh();
        let mut dst = Segment::fresh();
        src.put(b"move these bytes");
        dst.put(b"keep:");

        src.write_to(&mut dst, 4);
        assert_eq!(dst.data(), b"keep:move");
        assert_eq!(src.data(), b" these bytes");
    }

    #[test]
    fn test_write_to_shifts_sink_when_tail_is_short() {
        let mut src = Segment::fresh();
        src.put(&[0xAB; 100]);

        // Fill the sink, then consume most of it: room exists only via a shift.
        let mut dst = Segment::fresh();
        dst.put(&[0xCD; SEGMENT_SIZE]);
        dst.advance(SEGMENT_SIZE - 10);
        assert_eq!(dst.tail_capacity(), 0);
        assert!(dst.total_capacity() >= 100);

        src.write_to(&mut dst, 100);
        assert_eq!(dst.len(), 110);
        assert_eq!(&dst.data()[..10], &[0xCD; 10]);
        assert_eq!(&dst.data()[10..], &[0xAB; 100]);
    }

    // ---------------------------------------------------------------
    // Searching
    // ---------------------------------------------------------------

    #[test]
    fn test_index_of_respects_window() {
        let mut seg = Segment::fresh();
        seg.put(b"abcabc");
        assert_eq!(seg.index_of(b'a', 0, 6), Some(0));
        assert_eq!(seg.index_of(b'a', 1, 6), Some(3));
        assert_eq!(seg.index_of(b'a', 4, 6), None);
        assert_eq!(seg.index_of(b'z', 0, 6), None);
        // End past the readable range is clamped.
        assert_eq!(seg.index_of(b'c', 0, 100), Some(2));
    }

    #[test]
    fn test_index_of_bytes_inbound_finds_first_full_match() {
        let mut seg = Segment::fresh();
        seg.put(b"xxhellohello");
        assert_eq!(seg.index_of_bytes_inbound(b"hello", 0), Some(2));
        assert_eq!(seg.index_of_bytes_inbound(b"hello", 3), Some(7));
        assert_eq!(seg.index_of_bytes_inbound(b"hello", 8), None);
        // A pattern longer than the readable range can never match inbound.
        assert_eq!(seg.index_of_bytes_inbound(&[0u8; 64], 0), None);
    }

    // ---------------------------------------------------------------
    // Pool reset contract
    // ---------------------------------------------------------------

    #[test]
    fn test_reset_restores_fresh_state() {
        let mut seg = Segment::fresh();
        seg.put(b"leftovers");
        seg.advance(3);
        seg.reset();
        assert_eq!(seg.len(), 0);
        assert!(seg.is_writable());
        assert_eq!(seg.tail_capacity(), SEGMENT_SIZE);
    }
}
