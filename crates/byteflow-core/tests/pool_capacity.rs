//! Pool accounting tests. These observe the process-global free list, so each
//! test takes a shared lock and this file stays free of unrelated tests.

use std::sync::{Mutex, MutexGuard};

use byteflow_core::{
    pool, Buffer, GLOBAL_MAX_BYTES, PER_THREAD_MAX_BYTES, SEGMENT_SIZE,
};

static POOL_LOCK: Mutex<()> = Mutex::new(());

fn pool_guard() -> MutexGuard<'static, ()> {
    POOL_LOCK.lock().unwrap_or_else(|e| e.into_inner())
}

#[test]
fn clear_returns_segments_to_the_pool() {
    let _guard = pool_guard();

    let mut buf = Buffer::new();
    buf.put_u8(1);
    let before = pool::pooled_bytes();
    buf.clear();
    assert!(
        pool::pooled_bytes() >= before + SEGMENT_SIZE,
        "clearing a one-segment buffer must recycle at least one block"
    );
}

#[test]
fn shared_segments_are_never_pooled() {
    let _guard = pool_guard();

    let mut buf = Buffer::new();
    buf.put_u8(1);
    let snapshot = buf.snapshot();

    let before = pool::pooled_bytes();
    buf.clear();
    assert_eq!(
        pool::pooled_bytes(),
        before,
        "a snapshotted segment must bypass the pool"
    );
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0], 1);
}

#[test]
fn pooled_bytes_never_exceed_the_two_level_cap() {
    let _guard = pool_guard();

    // Hold far more segments than the pool can keep, then release them all.
    let count = (GLOBAL_MAX_BYTES + PER_THREAD_MAX_BYTES) / SEGMENT_SIZE + 16;
    let mut buffers: Vec<Buffer> = (0..count)
        .map(|_| {
            let mut buf = Buffer::new();
            buf.put_u8(0xFF);
            buf
        })
        .collect();
    buffers.clear();

    // Releasing from one thread fills that thread's cache and the global
    // list to their exact caps; the overflow went back to the allocator.
    assert_eq!(
        pool::pooled_bytes(),
        GLOBAL_MAX_BYTES + PER_THREAD_MAX_BYTES
    );
}

#[test]
fn pool_tolerates_concurrent_producers_and_consumers() {
    let _guard = pool_guard();

    let workers: Vec<_> = (0..4)
        .map(|_| {
            std::thread::spawn(|| {
                for round in 0..64 {
                    let mut a = Buffer::new();
                    a.put_slice(&vec![round as u8; SEGMENT_SIZE * 2]);

                    let mut b = Buffer::new();
                    b.transfer_from(&mut a, SEGMENT_SIZE + 1).unwrap();
                    assert_eq!(b.len(), SEGMENT_SIZE + 1);
                    assert_eq!(a.len(), SEGMENT_SIZE - 1);

                    b.clear();
                    a.clear();
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().expect("pool worker panicked");
    }

    // Whatever interleaving happened, the idle-byte bound still holds for
    // everything this thread can observe.
    assert!(pool::pooled_bytes() <= GLOBAL_MAX_BYTES + PER_THREAD_MAX_BYTES);
}
