//! Buffer - A Segmented FIFO Byte Queue
//!
//! This module implements `Buffer`, the central data structure of the crate:
//! an in-memory queue of bytes backed by a chain of pooled 8 KiB segments.
//!
//! ## Structure
//!
//! ```text
//! Buffer (len = 19_000)
//!   │
//!   ▼ head                                        tail ▼
//! ┌──────────┐      ┌──────────┐      ┌──────────────┐
//! │ segment  │ ───► │ segment  │ ───► │ segment      │
//! │ 8192 B   │      │ 8192 B   │      │ 2616 B used  │
//! └──────────┘      └──────────┘      └──────────────┘
//! ```
//!
//! Appends go to the tail segment (allocating a new one from the pool when the
//! tail is full, shared, or absent). Reads consume from the head segment; a
//! drained segment is unlinked and recycled immediately, and a drain that
//! leaves the head half-full next to a segment that fits in its reclaimable
//! space compacts the two into one. The chain never contains an empty segment
//! between calls.
//!
//! ## Zero-Copy Transfers
//!
//! `transfer_from` moves bytes between buffers by relinking segments instead of
//! copying them:
//!
//! 1. While a whole source head segment is being moved, the segment handle is
//!    popped from the source and pushed onto this buffer. No bytes are copied.
//!    If this buffer's tail has room for the whole incoming segment, the bytes
//!    are absorbed into the tail instead, so alternating small writes do not
//!    accumulate short segments.
//! 2. The final partial segment is split first: prefixes of `SHARE_MINIMUM`
//!    bytes or more share the source block (still no copy), smaller prefixes
//!    are copied into a fresh pool segment.
//!
//! The result is O(moved bytes / SEGMENT_SIZE) relink work per transfer, with
//! copies only for small leading or trailing chunks.
//!
//! ## Snapshots and Peeking
//!
//! `snapshot` freezes the current contents into an immutable
//! [`ByteString`](crate::ByteString) by sharing every segment — including the
//! tail, so later appends allocate a new segment and can never leak
//! written-past-snapshot bytes into the snapshot. `peek` is cheaper: it borrows
//! the buffer, which already excludes mutation, and walks the chain without
//! marking anything shared.
//!
//! ## Example
//! ```ignore
//! use byteflow_core::Buffer;
//!
//! let mut incoming = Buffer::new();
//! incoming.put_u32(0xCAFE_BABE);
//! incoming.put_slice(b"payload");
//!
//! let mut staged = Buffer::new();
//! staged.transfer_from(&mut incoming, incoming.len())?;
//!
//! assert_eq!(staged.read_u32()?, 0xCAFE_BABE);
//! ```
//!
//! ## Thread Safety
//!
//! A buffer is single-owner and not synchronized; move it between threads with
//! whatever handoff your program already uses. Distinct buffers may share
//! underlying blocks through snapshots and splits — each advances its own
//! cursors and never writes through a shared block.

use std::collections::VecDeque;
use std::fmt;

use bytes::Buf;

use crate::byte_string::ByteString;
use crate::error::{Error, Result};
use crate::pool;
use crate::segment::{Segment, SEGMENT_SIZE};

/// A segmented FIFO byte queue. All byte-order-sensitive operations are
/// big-endian.
#[derive(Default)]
pub struct Buffer {
    /// Segment chain: front is the read side, back is the write side.
    segments: VecDeque<Segment>,

    /// Cached total of readable bytes across the chain.
    len: usize,
}

impl Buffer {
    /// Create an empty buffer. Allocates nothing until the first append.
    pub fn new() -> Self {
        Self::default()
    }

    /// Total readable bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    // ---------------------------------------------------------------
    // Appending
    // ---------------------------------------------------------------

    /// Append a single byte.
    pub fn put_u8(&mut self, value: u8) {
        self.writable_tail(1).put(&[value]);
        self.len += 1;
    }

    /// Append a big-endian `u16`.
    pub fn put_u16(&mut self, value: u16) {
        self.writable_tail(2).put(&value.to_be_bytes());
        self.len += 2;
    }

    /// Append a big-endian `u32`.
    pub fn put_u32(&mut self, value: u32) {
        self.writable_tail(4).put(&value.to_be_bytes());
        self.len += 4;
    }

    /// Append a big-endian `u64`.
    pub fn put_u64(&mut self, value: u64) {
        self.writable_tail(8).put(&value.to_be_bytes());
        self.len += 8;
    }

    /// Append a byte slice, spilling across as many segments as needed.
    pub fn put_slice(&mut self, mut src: &[u8]) {
        while !src.is_empty() {
            let tail = self.writable_tail(1);
            let n = src.len().min(tail.tail_capacity());
            tail.put(&src[..n]);
            self.len += n;
            src = &src[n..];
        }
    }

    /// Hand a producer the writable tail range and commit however many bytes
    /// it reports written.
    ///
    /// The producer receives at least `min_capacity` writable bytes (often
    /// more) and returns the number it actually filled, which may be zero.
    /// This is the bridge for external readers that fill raw byte ranges:
    ///
    /// ```ignore
    /// let n = buffer.fill_tail(512, |dst| stream.read(dst).unwrap_or(0))?;
    /// ```
    ///
    /// `min_capacity` must be between 1 and `SEGMENT_SIZE`; a producer
    /// reporting more bytes than it was given is a caller bug and panics.
    pub fn fill_tail<F>(&mut self, min_capacity: usize, producer: F) -> Result<usize>
    where
        F: FnOnce(&mut [u8]) -> usize,
    {
        if min_capacity == 0 || min_capacity > SEGMENT_SIZE {
            return Err(Error::InvalidCapacity {
                requested: min_capacity,
                max: SEGMENT_SIZE,
            });
        }
        let tail = self.writable_tail(min_capacity);
        let available = tail.tail_capacity();
        let written = producer(tail.free_space_mut());
        assert!(
            written <= available,
            "producer reported {written} bytes written but only {available} were available"
        );
        tail.commit(written);
        self.len += written;

        // A fresh tail the producer left empty must not linger in the chain.
        if self.segments.back().is_some_and(Segment::is_empty) {
            if let Some(seg) = self.segments.pop_back() {
                pool::recycle(seg);
            }
        }
        Ok(written)
    }

    // ---------------------------------------------------------------
    // Consuming
    // ---------------------------------------------------------------

    /// Consume a single byte.
    pub fn read_u8(&mut self) -> Result<u8> {
        let mut bytes = [0u8; 1];
        self.read_slice(&mut bytes)?;
        Ok(bytes[0])
    }

    /// Consume a big-endian `u16`.
    pub fn read_u16(&mut self) -> Result<u16> {
        let mut bytes = [0u8; 2];
        self.read_slice(&mut bytes)?;
        Ok(u16::from_be_bytes(bytes))
    }

    /// Consume a big-endian `u32`.
    pub fn read_u32(&mut self) -> Result<u32> {
        let mut bytes = [0u8; 4];
        self.read_slice(&mut bytes)?;
        Ok(u32::from_be_bytes(bytes))
    }

    /// Consume a big-endian `u64`.
    pub fn read_u64(&mut self) -> Result<u64> {
        let mut bytes = [0u8; 8];
        self.read_slice(&mut bytes)?;
        Ok(u64::from_be_bytes(bytes))
    }

    /// Fill `dst` completely from the front of the buffer, or fail without
    /// consuming anything.
    pub fn read_slice(&mut self, dst: &mut [u8]) -> Result<()> {
        self.require(dst.len())?;
        self.read_into(dst);
        Ok(())
    }

    /// Discard `n` bytes from the front of the buffer.
    pub fn skip(&mut self, n: usize) -> Result<()> {
        self.require(n)?;
        self.consume(n);
        Ok(())
    }

    /// Discard everything, recycling every unshared segment to the pool.
    pub fn clear(&mut self) {
        while let Some(seg) = self.segments.pop_front() {
            pool::recycle(seg);
        }
        self.len = 0;
    }

    // ---------------------------------------------------------------
    // Buffer-to-buffer transfer
    // ---------------------------------------------------------------

    /// Move exactly `len` bytes from the front of `source` onto the back of
    /// this buffer, relinking whole segments instead of copying wherever
    /// possible (see the module docs for the splice/absorb/split policy).
    pub fn transfer_from(&mut self, source: &mut Buffer, len: usize) -> Result<()> {
        if len > source.len {
            return Err(Error::Underflow {
                requested: len,
                available: source.len,
            });
        }
        self.transfer(source, len);
        Ok(())
    }

    /// Move the entire contents of `source` onto the back of this buffer.
    pub fn transfer_all(&mut self, source: &mut Buffer) {
        let len = source.len;
        self.transfer(source, len);
    }

    fn transfer(&mut self, source: &mut Buffer, mut len: usize) {
        debug_assert!(len <= source.len);
        while len > 0 {
            let head_len = source.segments.front().map_or(0, Segment::len);
            debug_assert!(head_len > 0);

            if len < head_len {
                // Final partial move: split by the share/copy policy and link
                // the prefix in as-is, leaving the suffix with the source.
                let head = source
                    .segments
                    .front_mut()
                    .expect("source has a readable head");
                let prefix = head.split(len);
                source.len -= len;
                self.len += len;
                self.segments.push_back(prefix);
                // The shrunken source head may now fit its neighbor.
                source.compact_head();
                return;
            }

            // Whole-segment move: splice the handle across, or absorb its
            // bytes into a tail that has room for all of them.
            let seg = source
                .segments
                .pop_front()
                .expect("source has a readable head");
            source.len -= head_len;
            self.push_segment(seg);
            self.len += head_len;
            len -= head_len;
        }
    }

    // ---------------------------------------------------------------
    // Snapshots and peeking
    // ---------------------------------------------------------------

    /// Freeze the current contents into an immutable, zero-copy
    /// [`ByteString`].
    ///
    /// Every segment in the chain (the tail included) becomes shared: its
    /// block is pinned until the snapshot and all of its clones are dropped,
    /// and subsequent appends to this buffer allocate a new tail segment.
    pub fn snapshot(&mut self) -> ByteString {
        if self.len == 0 {
            return ByteString::new();
        }
        let parts = self.segments.iter_mut().map(Segment::shared_copy).collect();
        ByteString::from_segments(parts)
    }

    /// A read cursor over the buffer's contents that consumes nothing.
    ///
    /// The cursor borrows the buffer, so the contents cannot change while it
    /// exists. It implements [`bytes::Buf`] and the same `read_*` primitives
    /// as the buffer itself.
    pub fn peek(&self) -> Peek<'_> {
        Peek {
            segments: &self.segments,
            seg: 0,
            off: 0,
            remaining: self.len,
        }
    }

    // ---------------------------------------------------------------
    // Searching
    // ---------------------------------------------------------------

    /// Absolute offset of the first occurrence of `byte` at or after `from`.
    pub fn index_of(&self, byte: u8, from: usize) -> Option<usize> {
        let mut base = 0;
        for seg in &self.segments {
            let seg_len = seg.len();
            if from < base + seg_len {
                let start = from.saturating_sub(base);
                if let Some(i) = seg.index_of(byte, start, seg_len) {
                    return Some(base + i);
                }
            }
            base += seg_len;
        }
        None
    }

    /// Absolute offset of the first occurrence of `pattern` at or after
    /// `from`, matching across segment boundaries.
    ///
    /// Candidates that fit inside one segment are scanned there directly;
    /// the trailing window of each segment is then probed byte-by-byte into
    /// its successors. An empty pattern matches at `from`.
    pub fn index_of_bytes(&self, pattern: &[u8], from: usize) -> Option<usize> {
        if pattern.is_empty() {
            return (from <= self.len).then_some(from);
        }
        if self.len < pattern.len() {
            return None;
        }
        // Start offsets past this cannot fit the whole pattern.
        let last_candidate = self.len - pattern.len();

        let mut base = 0;
        for (idx, seg) in self.segments.iter().enumerate() {
            let seg_len = seg.len();
            if base + seg_len <= from {
                base += seg_len;
                continue;
            }
            let start = from.saturating_sub(base);

            // Matches lying entirely inside this segment.
            if let Some(i) = seg.index_of_bytes_inbound(pattern, start) {
                return Some(base + i);
            }

            // Matches beginning in this segment's trailing window and
            // straddling into its successors.
            let straddle_from = seg_len.saturating_sub(pattern.len() - 1).max(start);
            for i in straddle_from..seg_len {
                let abs = base + i;
                if abs > last_candidate {
                    return None;
                }
                if self.matches_at(idx, i, pattern) {
                    return Some(abs);
                }
            }
            base += seg_len;
        }
        None
    }

    /// Compare `pattern` against the bytes starting at `off` within segment
    /// `seg_idx`, walking into following segments as each one is exhausted.
    fn matches_at(&self, mut seg_idx: usize, mut off: usize, pattern: &[u8]) -> bool {
        for &expected in pattern {
            loop {
                let Some(seg) = self.segments.get(seg_idx) else {
                    return false;
                };
                if off < seg.len() {
                    if seg.data()[off] != expected {
                        return false;
                    }
                    off += 1;
                    break;
                }
                seg_idx += 1;
                off = 0;
            }
        }
        true
    }

    // ---------------------------------------------------------------
    // Internals
    // ---------------------------------------------------------------

    /// A tail segment that is writable and has at least `min_capacity` free
    /// bytes, appending a fresh pool segment when the current tail is absent,
    /// shared, not the owner, or too full.
    fn writable_tail(&mut self, min_capacity: usize) -> &mut Segment {
        debug_assert!(min_capacity >= 1 && min_capacity <= SEGMENT_SIZE);
        let reuse = self
            .segments
            .back()
            .is_some_and(|tail| tail.is_writable() && tail.tail_capacity() >= min_capacity);
        if !reuse {
            self.segments.push_back(pool::take());
        }
        self.segments
            .back_mut()
            .expect("a writable tail was just ensured")
    }

    /// Link a segment onto the back of the chain, absorbing its bytes into
    /// the current tail when the tail can hold all of them (shifting the
    /// tail's consumed prefix out of the way if necessary).
    fn push_segment(&mut self, mut seg: Segment) {
        if let Some(tail) = self.segments.back_mut() {
            if tail.is_writable() && seg.len() <= tail.total_capacity() {
                let n = seg.len();
                seg.write_to(tail, n);
                pool::recycle(seg);
                return;
            }
        }
        self.segments.push_back(seg);
    }

    fn require(&self, n: usize) -> Result<()> {
        if self.len < n {
            return Err(Error::Underflow {
                requested: n,
                available: self.len,
            });
        }
        Ok(())
    }

    /// Copy `dst.len()` bytes out of the front of the chain. Length already
    /// validated by the caller.
    fn read_into(&mut self, dst: &mut [u8]) {
        debug_assert!(dst.len() <= self.len);
        let mut filled = 0;
        while filled < dst.len() {
            let head = self
                .segments
                .front_mut()
                .expect("readable head segment");
            let n = (dst.len() - filled).min(head.len());
            head.read(&mut dst[filled..filled + n]);
            self.len -= n;
            filled += n;
            self.trim_head();
        }
    }

    /// Discard `n` bytes. Length already validated by the caller.
    fn consume(&mut self, mut n: usize) {
        debug_assert!(n <= self.len);
        while n > 0 {
            let head = self
                .segments
                .front_mut()
                .expect("readable head segment");
            let step = n.min(head.len());
            head.advance(step);
            self.len -= step;
            n -= step;
            self.trim_head();
        }
    }

    /// Unlink and recycle the head segment once it is drained, then compact
    /// the two front segments when a drain left them both half-full.
    fn trim_head(&mut self) {
        if self.segments.front().is_some_and(Segment::is_empty) {
            if let Some(seg) = self.segments.pop_front() {
                pool::recycle(seg);
            }
        }
        self.compact_head();
    }

    /// Opportunistic compaction at the read side: when the head is writable
    /// and reclaiming its consumed prefix makes room for the whole next
    /// segment, absorb those bytes into the head and recycle the emptied
    /// handle. Keeps alternating reads and writes from accumulating short
    /// segments.
    fn compact_head(&mut self) {
        if self.segments.len() < 2 {
            return;
        }
        let head = &self.segments[0];
        let next_len = self.segments[1].len();
        if !head.is_writable() || head.total_capacity() < next_len {
            return;
        }
        let mut next = self
            .segments
            .remove(1)
            .expect("successor segment was just checked");
        let head = self.segments.front_mut().expect("head segment");
        next.write_to(head, next_len);
        pool::recycle(next);
    }

    #[cfg(test)]
    fn check_invariants(&self) {
        let total: usize = self.segments.iter().map(Segment::len).sum();
        assert_eq!(self.len, total, "cached len diverged from segment sum");
        if self.len == 0 {
            assert!(self.segments.is_empty(), "empty buffer retains segments");
        } else {
            for (i, seg) in self.segments.iter().enumerate() {
                assert!(!seg.is_empty(), "empty segment at index {i}");
            }
        }
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        self.clear();
    }
}

impl fmt::Debug for Buffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Buffer")
            .field("len", &self.len)
            .field("segments", &self.segments.len())
            .finish()
    }
}

impl Buf for Buffer {
    fn remaining(&self) -> usize {
        self.len
    }

    fn chunk(&self) -> &[u8] {
        self.segments.front().map_or(&[], Segment::data)
    }

    fn advance(&mut self, cnt: usize) {
        assert!(
            cnt <= self.len,
            "cannot advance past the end of the buffer ({cnt} > {})",
            self.len
        );
        self.consume(cnt);
    }
}

impl std::io::Read for Buffer {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = self.len.min(buf.len());
        self.read_into(&mut buf[..n]);
        Ok(n)
    }
}

impl std::io::Write for Buffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.put_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// A non-consuming read cursor returned by [`Buffer::peek`].
#[derive(Debug)]
pub struct Peek<'a> {
    segments: &'a VecDeque<Segment>,
    seg: usize,
    off: usize,
    remaining: usize,
}

impl Peek<'_> {
    /// Read a byte without consuming it from the underlying buffer.
    pub fn read_u8(&mut self) -> Result<u8> {
        let mut bytes = [0u8; 1];
        self.read_slice(&mut bytes)?;
        Ok(bytes[0])
    }

    /// Read a big-endian `u16` without consuming it from the buffer.
    pub fn read_u16(&mut self) -> Result<u16> {
        let mut bytes = [0u8; 2];
        self.read_slice(&mut bytes)?;
        Ok(u16::from_be_bytes(bytes))
    }

    /// Read a big-endian `u32` without consuming it from the buffer.
    pub fn read_u32(&mut self) -> Result<u32> {
        let mut bytes = [0u8; 4];
        self.read_slice(&mut bytes)?;
        Ok(u32::from_be_bytes(bytes))
    }

    /// Read a big-endian `u64` without consuming it from the buffer.
    pub fn read_u64(&mut self) -> Result<u64> {
        let mut bytes = [0u8; 8];
        self.read_slice(&mut bytes)?;
        Ok(u64::from_be_bytes(bytes))
    }

    /// Fill `dst` from the cursor position, or fail without advancing.
    pub fn read_slice(&mut self, dst: &mut [u8]) -> Result<()> {
        if dst.len() > self.remaining {
            return Err(Error::Underflow {
                requested: dst.len(),
                available: self.remaining,
            });
        }
        let mut filled = 0;
        while filled < dst.len() {
            let chunk = self.chunk();
            let n = (dst.len() - filled).min(chunk.len());
            dst[filled..filled + n].copy_from_slice(&chunk[..n]);
            self.advance(n);
            filled += n;
        }
        Ok(())
    }
}

impl Buf for Peek<'_> {
    fn remaining(&self) -> usize {
        self.remaining
    }

    fn chunk(&self) -> &[u8] {
        if self.remaining == 0 {
            return &[];
        }
        &self.segments[self.seg].data()[self.off..]
    }

    fn advance(&mut self, mut cnt: usize) {
        assert!(
            cnt <= self.remaining,
            "cannot advance past the end of the buffer ({cnt} > {})",
            self.remaining
        );
        self.remaining -= cnt;
        while cnt > 0 {
            let avail = self.segments[self.seg].len() - self.off;
            if cnt < avail {
                self.off += cnt;
                return;
            }
            cnt -= avail;
            self.seg += 1;
            self.off = 0;
        }
    }
}
