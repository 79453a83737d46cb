//! Error Types for Byteflow
//!
//! This module defines all error types that can occur in buffer operations.
//!
//! ## Error Categories
//!
//! ### Bounds Violations
//! - `Underflow`: reading, skipping, or transferring more bytes than the buffer holds
//! - `InvalidCapacity`: asking for a writable tail range larger than a segment block
//!
//! ### I/O Errors
//! - `Io`: raised only by [`Source`](crate::Source) / [`Sink`](crate::Sink)
//!   implementations that bridge to a real transport. The buffer core itself
//!   performs no I/O and never produces this variant; it propagates it untouched.
//!
//! ## What Is NOT an Error
//!
//! - **End of stream** is a sentinel return value from
//!   [`Source::read_at_most`](crate::Source::read_at_most) (`Ok(None)`), not an error.
//! - **Sharing violations** (writing through a shared segment) indicate a bug in
//!   this library, not in the caller. They are fatal assertions, not `Error` values.
//!
//! ## Usage
//! All fallible operations return `Result<T>` which is aliased to `Result<T, Error>`.
//! This allows using `?` operator for error propagation.
//!
//! ## Example
//! ```ignore
//! use byteflow_core::{Buffer, Error};
//!
//! let mut buf = Buffer::new();
//! buf.put_u8(1);
//!
//! match buf.read_u32() {
//!     Err(Error::Underflow { requested, available }) => {
//!         println!("wanted {requested} bytes, buffer holds {available}");
//!     }
//!     other => panic!("expected underflow, got {other:?}"),
//! }
//! ```

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("buffer underflow: requested {requested} bytes but only {available} are readable")]
    Underflow { requested: usize, available: usize },

    #[error("invalid tail capacity request: {requested} (must be between 1 and {max})")]
    InvalidCapacity { requested: usize, max: usize },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
