//! Fixed-capacity paged buffer pool with zero-copy views.
//!
//! This crate provides a pool allocator for the receive/send buffers of a
//! high-throughput network server, built to keep buffer churn off the global
//! allocator on the hot path:
//!
//! - All memory is reserved up front as a fixed array of pages, each divided
//!   into equal-size chunks.
//! - Requests of arbitrary byte size are satisfied by a first-fit run of
//!   contiguous chunks within a single page and handed back as zero-copy
//!   [`PooledBuf`] views.
//! - A racy, lock-free page cursor spreads successive allocations across
//!   pages; each page guards its own chunk map behind its own lock, so
//!   contention shards across the page array.
//! - Views are returned by value ([`BufferPool::recycle`] consumes them), so
//!   use-after-return and double-return are compile-time impossible, and a
//!   dropped view releases its chunks automatically.
//!
//! The pool never grows, never blocks, and never defragments: exhaustion is
//! an ordinary [`Err`](PoolError::Exhausted) and the caller picks the
//! fallback. Long-lived large allocations can fragment a page over time;
//! that is a documented property of first-fit chunk runs, not a defect.
//!
//! # Example
//!
//! ```
//! use pagepool::{BufferPool, PoolConfig};
//!
//! # fn main() -> pagepool::Result<()> {
//! // 4 pages x 4 chunks x 1024 bytes = 16 KB of pooled memory.
//! let pool = BufferPool::new(PoolConfig::new(4096, 1024, 4))?;
//!
//! let mut buf = pool.allocate(1500)?;
//! buf.put_slice(b"partial message")?;
//!
//! // A message outgrew its buffer: double the view, contents preserved.
//! pool.expand(&mut buf)?;
//! assert_eq!(&buf[..], b"partial message");
//! assert_eq!(buf.capacity(), 4096);
//!
//! pool.recycle(buf);
//! assert_eq!(pool.free_chunks(), 16);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

mod buffer;
pub mod config;
pub mod error;
mod page;
mod pool;
mod stats;
mod utils;

pub use buffer::PooledBuf;
pub use config::PoolConfig;
pub use error::{PoolError, Result};
pub use pool::BufferPool;
pub use stats::{PageOccupancy, PoolStatsSnapshot, PoolStatus};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
