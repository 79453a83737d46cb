pub mod buffer;
pub mod byte_string;
pub mod error;
pub mod io;
pub mod pool;

mod segment;

pub use buffer::{Buffer, Peek};
pub use byte_string::ByteString;
pub use error::{Error, Result};
pub use io::{Sink, Source};
pub use pool::{GLOBAL_MAX_BYTES, PER_THREAD_MAX_BYTES};
pub use segment::{SEGMENT_SIZE, SHARE_MINIMUM};
