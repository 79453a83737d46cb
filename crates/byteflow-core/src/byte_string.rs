//! ByteString - Immutable Views Over Frozen Bytes
//!
//! A `ByteString` is the read-only counterpart of [`Buffer`](crate::Buffer):
//! an immutable byte sequence that can be cloned, sliced, and handed to other
//! threads freely.
//!
//! Two representations back it:
//!
//! - **Flat**: one contiguous [`bytes::Bytes`] allocation. Produced by the
//!   `From` conversions and by slicing small ranges out of snapshots.
//! - **Segmented**: shared segment blocks taken from a buffer by
//!   [`Buffer::snapshot`](crate::Buffer::snapshot). Nothing is copied; the
//!   blocks are pinned (never recycled, never written again) until the last
//!   view drops.
//!
//! Equality, indexing, and iteration behave identically for both; which one
//! you hold is an allocation detail, observable only through
//! [`as_contiguous`](ByteString::as_contiguous).

use std::fmt;
use std::ops::{Bound, Index, RangeBounds};

use bytes::{Bytes, BytesMut};

use crate::segment::{Segment, SHARE_MINIMUM};

/// An immutable byte sequence, either contiguous or built from shared
/// buffer segments.
pub struct ByteString {
    repr: Repr,
}

enum Repr {
    Flat(Bytes),
    Segmented {
        /// Shared, read-only segments in order. None are empty.
        parts: Vec<Segment>,

        /// Cumulative end offsets; `ends[i]` is one past the last absolute
        /// index covered by `parts[i]`. Drives binary-searched indexing.
        ends: Vec<usize>,
    },
}

impl ByteString {
    /// The empty byte string. Allocates nothing.
    pub fn new() -> Self {
        Self {
            repr: Repr::Flat(Bytes::new()),
        }
    }

    /// Build the zero-copy form from segments a buffer has already shared.
    pub(crate) fn from_segments(parts: Vec<Segment>) -> Self {
        debug_assert!(parts.iter().all(|p| !p.is_empty()));
        let mut ends = Vec::with_capacity(parts.len());
        let mut total = 0;
        for part in &parts {
            total += part.len();
            ends.push(total);
        }
        Self {
            repr: Repr::Segmented { parts, ends },
        }
    }

    pub fn len(&self) -> usize {
        match &self.repr {
            Repr::Flat(bytes) => bytes.len(),
            Repr::Segmented { ends, .. } => ends.last().copied().unwrap_or(0),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The byte at `index`, or `None` past the end.
    pub fn get(&self, index: usize) -> Option<u8> {
        if index >= self.len() {
            return None;
        }
        Some(self[index])
    }

    /// The whole sequence as one slice, when it happens to be contiguous.
    pub fn as_contiguous(&self) -> Option<&[u8]> {
        match &self.repr {
            Repr::Flat(bytes) => Some(bytes),
            Repr::Segmented { parts, .. } if parts.len() == 1 => Some(parts[0].data()),
            Repr::Segmented { .. } => None,
        }
    }

    /// Iterate the sequence as contiguous chunks, in order.
    pub fn chunks(&self) -> Chunks<'_> {
        Chunks(match &self.repr {
            Repr::Flat(bytes) => ChunksRepr::Flat(Some(bytes)),
            Repr::Segmented { parts, .. } => ChunksRepr::Segmented(parts.iter()),
        })
    }

    /// A view of `range` within this byte string.
    ///
    /// Slicing a segmented string stays zero-copy for ranges of
    /// `SHARE_MINIMUM` bytes or more; shorter ranges are flattened into a
    /// fresh contiguous allocation so tiny views do not pin 8 KiB blocks.
    ///
    /// Panics when the range falls outside the sequence, matching
    /// [`Bytes::slice`].
    pub fn slice(&self, range: impl RangeBounds<usize>) -> ByteString {
        let start = match range.start_bound() {
            Bound::Included(&n) => n,
            Bound::Excluded(&n) => n + 1,
            Bound::Unbounded => 0,
        };
        let end = match range.end_bound() {
            Bound::Included(&n) => n + 1,
            Bound::Excluded(&n) => n,
            Bound::Unbounded => self.len(),
        };
        assert!(
            start <= end && end <= self.len(),
            "range {start}..{end} out of bounds for length {}",
            self.len()
        );
        if start == end {
            return ByteString::new();
        }

        match &self.repr {
            Repr::Flat(bytes) => ByteString {
                repr: Repr::Flat(bytes.slice(start..end)),
            },
            Repr::Segmented { parts, .. } => {
                let mut covering = Vec::new();
                let mut base = 0;
                for part in parts {
                    let part_start = base;
                    let part_end = base + part.len();
                    base = part_end;
                    if part_end <= start {
                        continue;
                    }
                    if part_start >= end {
                        break;
                    }
                    let from = start.saturating_sub(part_start);
                    let to = part.len() - part_end.saturating_sub(end);
                    covering.push(part.alias_range(from, to));
                }

                if end - start < SHARE_MINIMUM {
                    let mut out = BytesMut::with_capacity(end - start);
                    for part in &covering {
                        out.extend_from_slice(part.data());
                    }
                    return ByteString {
                        repr: Repr::Flat(out.freeze()),
                    };
                }
                ByteString::from_segments(covering)
            }
        }
    }

    /// Copy the contents into a fresh `Vec<u8>`.
    pub fn to_vec(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.len());
        for chunk in self.chunks() {
            out.extend_from_slice(chunk);
        }
        out
    }

    /// The contents as [`Bytes`]: a cheap clone for the flat form, one copy
    /// for the segmented form.
    pub fn to_bytes(&self) -> Bytes {
        match &self.repr {
            Repr::Flat(bytes) => bytes.clone(),
            Repr::Segmented { parts, .. } => {
                let mut out = BytesMut::with_capacity(self.len());
                for part in parts {
                    out.extend_from_slice(part.data());
                }
                out.freeze()
            }
        }
    }

    fn bytes_iter(&self) -> impl Iterator<Item = u8> + '_ {
        self.chunks().flatten().copied()
    }
}

impl Default for ByteString {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for ByteString {
    fn clone(&self) -> Self {
        let repr = match &self.repr {
            Repr::Flat(bytes) => Repr::Flat(bytes.clone()),
            Repr::Segmented { parts, ends } => Repr::Segmented {
                parts: parts.iter().map(|p| p.alias_range(0, p.len())).collect(),
                ends: ends.clone(),
            },
        };
        Self { repr }
    }
}

impl fmt::Debug for ByteString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match &self.repr {
            Repr::Flat(_) => "flat",
            Repr::Segmented { .. } => "segmented",
        };
        f.debug_struct("ByteString")
            .field("len", &self.len())
            .field("repr", &kind)
            .finish()
    }
}

impl Index<usize> for ByteString {
    type Output = u8;

    fn index(&self, index: usize) -> &u8 {
        match &self.repr {
            Repr::Flat(bytes) => &bytes[index],
            Repr::Segmented { parts, ends } => {
                let len = ends.last().copied().unwrap_or(0);
                assert!(index < len, "index {index} out of bounds for length {len}");
                let part = ends.partition_point(|&e| e <= index);
                let start = if part == 0 { 0 } else { ends[part - 1] };
                &parts[part].data()[index - start]
            }
        }
    }
}

impl From<&[u8]> for ByteString {
    fn from(src: &[u8]) -> Self {
        Self {
            repr: Repr::Flat(Bytes::copy_from_slice(src)),
        }
    }
}

impl From<Vec<u8>> for ByteString {
    fn from(src: Vec<u8>) -> Self {
        Self {
            repr: Repr::Flat(Bytes::from(src)),
        }
    }
}

impl From<Bytes> for ByteString {
    fn from(src: Bytes) -> Self {
        Self {
            repr: Repr::Flat(src),
        }
    }
}

impl PartialEq for ByteString {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.bytes_iter().eq(other.bytes_iter())
    }
}

impl Eq for ByteString {}

impl PartialEq<[u8]> for ByteString {
    fn eq(&self, other: &[u8]) -> bool {
        self.len() == other.len() && self.bytes_iter().eq(other.iter().copied())
    }
}

impl PartialEq<&[u8]> for ByteString {
    fn eq(&self, other: &&[u8]) -> bool {
        *self == **other
    }
}

impl PartialEq<Vec<u8>> for ByteString {
    fn eq(&self, other: &Vec<u8>) -> bool {
        *self == other[..]
    }
}

/// Iterator over the contiguous chunks of a [`ByteString`].
pub struct Chunks<'a>(ChunksRepr<'a>);

enum ChunksRepr<'a> {
    Flat(Option<&'a Bytes>),
    Segmented(std::slice::Iter<'a, Segment>),
}

impl<'a> Iterator for Chunks<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<&'a [u8]> {
        match &mut self.0 {
            ChunksRepr::Flat(slot) => slot.take().map(|b| &b[..]).filter(|s| !s.is_empty()),
            ChunksRepr::Segmented(iter) => iter.next().map(Segment::data),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Buffer;

    fn segmented(payload: &[u8]) -> ByteString {
        let mut buf = Buffer::new();
        buf.put_slice(payload);
        buf.snapshot()
    }

    // ---------------------------------------------------------------
    // Construction and equality across representations
    // ---------------------------------------------------------------

    #[test]
    fn test_empty_byte_string() {
        let s = ByteString::new();
        assert!(s.is_empty());
        assert_eq!(s.len(), 0);
        assert_eq!(s.get(0), None);
        assert_eq!(s.chunks().count(), 0);
    }

    #[test]
    fn test_flat_and_segmented_compare_equal() {
        let payload: Vec<u8> = (0..20_000).map(|i| (i % 251) as u8).collect();
        let flat = ByteString::from(payload.clone());
        let seg = segmented(&payload);

        assert_eq!(flat, seg);
        assert_eq!(seg, flat);
        assert_eq!(seg, payload);
        assert!(seg.chunks().count() > 1);
        assert!(seg.as_contiguous().is_none());
        assert_eq!(flat.as_contiguous().unwrap(), &payload[..]);
    }

    #[test]
    fn test_inequality_on_content_and_length() {
        let a = ByteString::from(&b"abcd"[..]);
        assert_ne!(a, ByteString::from(&b"abce"[..]));
        assert_ne!(a, ByteString::from(&b"abc"[..]));
    }

    // ---------------------------------------------------------------
    // Indexing
    // ---------------------------------------------------------------

    #[test]
    fn test_indexing_crosses_chunk_boundaries() {
        let payload: Vec<u8> = (0..20_000).map(|i| (i % 251) as u8).collect();
        let seg = segmented(&payload);
        for &i in &[0, 1, 8191, 8192, 16383, 16384, 19_999] {
            assert_eq!(seg[i], payload[i], "mismatch at index {i}");
            assert_eq!(seg.get(i), Some(payload[i]));
        }
        assert_eq!(seg.get(20_000), None);
    }

    // ---------------------------------------------------------------
    // Slicing
    // ---------------------------------------------------------------

    #[test]
    fn test_slice_small_range_flattens() {
        let payload: Vec<u8> = (0..10_000).map(|i| (i % 251) as u8).collect();
        let seg = segmented(&payload);

        let small = seg.slice(8000..8500);
        assert_eq!(small.len(), 500);
        // Small slices copy out into a contiguous allocation.
        assert!(small.as_contiguous().is_some());
        assert_eq!(small, payload[8000..8500]);
    }

    #[test]
    fn test_slice_large_range_stays_zero_copy() {
        let payload: Vec<u8> = (0..10_000).map(|i| (i % 251) as u8).collect();
        let seg = segmented(&payload);

        // Straddles the 8192 boundary, so the view keeps two shared parts.
        let large = seg.slice(4000..10_000);
        assert_eq!(large.len(), 6_000);
        assert!(large.as_contiguous().is_none());
        assert_eq!(large, payload[4000..10_000]);
    }

    #[test]
    fn test_slice_bounds_and_empty() {
        let s = ByteString::from(&b"hello"[..]);
        assert_eq!(s.slice(..), s);
        assert_eq!(s.slice(1..4), b"ell"[..]);
        assert!(s.slice(2..2).is_empty());
    }

    #[test]
    #[should_panic(expected = "out of bounds")]
    fn test_slice_past_end_panics() {
        ByteString::from(&b"abc"[..]).slice(1..5);
    }

    // ---------------------------------------------------------------
    // Conversions and cloning
    // ---------------------------------------------------------------

    #[test]
    fn test_to_vec_and_to_bytes_round_trip() {
        let payload: Vec<u8> = (0..9000).map(|i| (i % 127) as u8).collect();
        let seg = segmented(&payload);
        assert_eq!(seg.to_vec(), payload);
        assert_eq!(&seg.to_bytes()[..], &payload[..]);
    }

    #[test]
    fn test_clone_shares_segments() {
        let payload = vec![42u8; 5000];
        let seg = segmented(&payload);
        let clone = seg.clone();
        assert_eq!(seg, clone);
        drop(seg);
        // The clone keeps the blocks alive on its own.
        assert_eq!(clone, payload);
    }
}
