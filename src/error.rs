//! Error types for buffer pool operations.

use thiserror::Error;

/// Result type for pool operations.
pub type Result<T> = core::result::Result<T, PoolError>;

/// Errors returned by the buffer pool.
///
/// Running out of capacity is an ordinary outcome, not a fault: the pool
/// never blocks or grows, so callers decide the fallback policy (reject the
/// request, or fall back to an unpooled allocation). The only variant that
/// indicates a programming error rather than a runtime condition is
/// [`PoolError::InvalidConfig`], which is rejected at construction time.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PoolError {
    /// Construction-time misconfiguration (zero sizes, page size not a
    /// multiple of chunk size). A pool is never built from a bad config.
    #[error("invalid pool configuration: {0}")]
    InvalidConfig(&'static str),

    /// The requested size was zero.
    #[error("requested buffer size must be positive")]
    InvalidSize,

    /// No contiguous run of the required chunk count exists on any page.
    #[error("pool exhausted: no free run of {chunks} chunks for {requested} byte request")]
    Exhausted {
        /// Requested size in bytes.
        requested: usize,
        /// Chunk run length the request maps to.
        chunks: usize,
    },

    /// The buffer passed to [`expand`](crate::BufferPool::expand) was not
    /// allocated from this pool. Pool state is untouched.
    #[error("buffer was not allocated from this pool")]
    ForeignBuffer,

    /// A write does not fit in the view's remaining capacity. The caller
    /// may [`expand`](crate::BufferPool::expand) the view and retry.
    #[error("buffer capacity exceeded: capacity {capacity}, write needs {needed}")]
    CapacityExceeded {
        /// Total capacity of the view in bytes.
        capacity: usize,
        /// Bytes the view would have to hold after the write.
        needed: usize,
    },
}
