//! Source and Sink - The Streaming Contracts Around Buffers
//!
//! This module defines the two traits byte producers and byte consumers
//! implement to exchange data through a [`Buffer`]. The buffer core performs
//! no I/O itself; bridges to files, sockets, or other transports live behind
//! these traits and move whole byte runs in and out of buffers.
//!
//! ```text
//! Source ──readAtMost──► Buffer ──write──► Sink
//! (producer)            (queue)           (consumer)
//! ```
//!
//! `Buffer` implements both traits: a buffer is its own transport, which
//! makes it the natural stand-in for either end in tests and in-process
//! pipelines.
//!
//! ## End of Stream
//!
//! Exhaustion is data, not failure: [`Source::read_at_most`] returns
//! `Ok(None)` once the stream is done. `Error::Io` is reserved for real
//! transport failures and passes through the core untouched.

use crate::buffer::Buffer;
use crate::error::Result;

/// A producer of bytes, drained into buffers.
pub trait Source {
    /// Append up to `max` bytes to `sink`.
    ///
    /// Returns the number of bytes appended, `Some(0)` only when `max == 0`,
    /// or `None` at end of stream.
    fn read_at_most(&mut self, sink: &mut Buffer, max: usize) -> Result<Option<usize>>;

    /// Release the source. Closing an already-closed source is a no-op.
    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// A consumer of bytes, fed from buffers.
pub trait Sink {
    /// Consume exactly `len` bytes from the front of `source`.
    fn write(&mut self, source: &mut Buffer, len: usize) -> Result<()>;

    /// Push any buffered bytes down to the underlying transport.
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    /// Release the sink. Closing an already-closed sink is a no-op.
    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

impl Source for Buffer {
    fn read_at_most(&mut self, sink: &mut Buffer, max: usize) -> Result<Option<usize>> {
        if self.is_empty() {
            return Ok(if max == 0 { Some(0) } else { None });
        }
        let n = max.min(self.len());
        sink.transfer_from(self, n)?;
        Ok(Some(n))
    }
}

impl Sink for Buffer {
    fn write(&mut self, source: &mut Buffer, len: usize) -> Result<()> {
        self.transfer_from(source, len)
    }
}
