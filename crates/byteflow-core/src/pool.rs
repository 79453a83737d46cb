//! Segment Pool - Recycling Blocks Across Buffers and Threads
//!
//! This module implements the free-list that buffers draw segments from and
//! return segments to. Pooling exists purely to bound allocator traffic; every
//! operation stays correct if the pool is empty or full.
//!
//! ## Two-Level Structure
//!
//! ```text
//!        take() / recycle()
//!               │
//!               ▼
//! ┌──────────────────────────┐   per thread, no locking
//! │ thread cache (RefCell)   │   capacity PER_THREAD_MAX_BYTES
//! └──────────────────────────┘
//!               │ miss / overflow
//!               ▼
//! ┌──────────────────────────┐   shared by all threads, mutex-guarded
//! │ global free list         │   capacity GLOBAL_MAX_BYTES
//! └──────────────────────────┘
//!               │ miss / overflow
//!               ▼
//!        fresh allocation  /  drop to allocator
//! ```
//!
//! `take` prefers the calling thread's cache, falls back to the global list,
//! and finally allocates a fresh block. `recycle` runs the same path in
//! reverse: fill the local cache, spill to the global list, abandon the rest.
//! Under steady-state producers and consumers the caches absorb nearly all
//! traffic and the mutex is rarely touched.
//!
//! ## What Never Enters the Pool
//!
//! Shared segments are silently dropped by `recycle`: their block is aliased by
//! a snapshot or a split sibling, and handing it out again would let a writer
//! scribble over frozen bytes. The block is freed by the allocator when the
//! last alias goes away.
//!
//! ## Concurrency
//!
//! `take` and `recycle` are safe from any thread; a segment recycled on one
//! thread may satisfy a `take` on another (via the global list). No ordering
//! is guaranteed. Nothing here blocks beyond the short global mutex section.

use std::cell::RefCell;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use crate::segment::{Segment, SEGMENT_SIZE};

/// Cap on bytes held idle in the shared free list.
pub const GLOBAL_MAX_BYTES: usize = 64 * SEGMENT_SIZE;

/// Cap on bytes held idle in each thread's cache.
pub const PER_THREAD_MAX_BYTES: usize = 8 * SEGMENT_SIZE;

/// First level: shared free list, bounded by `GLOBAL_MAX_BYTES`.
static FREE_LIST: Mutex<Vec<Segment>> = Mutex::new(Vec::new());

/// Bytes currently parked in `FREE_LIST`. Updated under the lock; read lock-free.
static GLOBAL_BYTES: AtomicUsize = AtomicUsize::new(0);

thread_local! {
    /// Second level: this thread's cache, bounded by `PER_THREAD_MAX_BYTES`.
    static THREAD_CACHE: RefCell<Vec<Segment>> = const { RefCell::new(Vec::new()) };
}

/// Obtain a cleared, writable segment: empty cursors, sole owner of its block.
pub(crate) fn take() -> Segment {
    if let Ok(Some(seg)) = THREAD_CACHE.try_with(|cache| cache.borrow_mut().pop()) {
        tracing::trace!(origin = "thread-cache", "segment reused");
        return seg;
    }

    let popped = {
        let mut list = FREE_LIST.lock().unwrap_or_else(PoisonError::into_inner);
        let seg = list.pop();
        if seg.is_some() {
            GLOBAL_BYTES.fetch_sub(SEGMENT_SIZE, Ordering::Relaxed);
        }
        seg
    };
    if let Some(seg) = popped {
        tracing::trace!(origin = "free-list", "segment reused");
        return seg;
    }

    tracing::trace!("segment allocated");
    Segment::fresh()
}

/// Return a segment to the pool.
///
/// Shared segments are dropped rather than enqueued: their block stays alive
/// until the last alias releases it. Everything else is reset and cached,
/// preferring the thread cache, spilling to the global list, and falling back
/// to the allocator when both levels are at capacity.
pub(crate) fn recycle(mut seg: Segment) {
    if seg.is_shared() {
        tracing::trace!("shared segment dropped, not pooled");
        return;
    }
    seg.reset();

    let mut slot = Some(seg);
    let _ = THREAD_CACHE.try_with(|cache| {
        let mut cache = cache.borrow_mut();
        if cache.len() * SEGMENT_SIZE < PER_THREAD_MAX_BYTES {
            if let Some(seg) = slot.take() {
                cache.push(seg);
            }
        }
    });
    let Some(seg) = slot else {
        return;
    };

    let mut list = FREE_LIST.lock().unwrap_or_else(PoisonError::into_inner);
    if GLOBAL_BYTES.load(Ordering::Relaxed) + SEGMENT_SIZE <= GLOBAL_MAX_BYTES {
        GLOBAL_BYTES.fetch_add(SEGMENT_SIZE, Ordering::Relaxed);
        list.push(seg);
    } else {
        tracing::trace!("pool at capacity, segment dropped");
    }
}

/// Bytes currently held idle: the global free list plus the calling thread's
/// cache. Other threads' caches are not visible and not counted.
pub fn pooled_bytes() -> usize {
    global_bytes() + thread_cached_bytes()
}

fn global_bytes() -> usize {
    GLOBAL_BYTES.load(Ordering::Relaxed)
}

fn thread_cached_bytes() -> usize {
    THREAD_CACHE
        .try_with(|cache| cache.borrow().len() * SEGMENT_SIZE)
        .unwrap_or(0)
}
