//! Pool configuration.

use crate::error::{PoolError, Result};

/// Construction-time configuration for a [`BufferPool`](crate::BufferPool).
///
/// Every value is fixed for the pool's lifetime: the pool reserves
/// `page_count` pages of `page_size` bytes up front and never grows,
/// shrinks, or re-chunks them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    /// Bytes per page. Must be a positive multiple of `chunk_size`.
    pub page_size: usize,

    /// Bytes per chunk, the smallest allocatable unit. Shared by every page.
    pub chunk_size: usize,

    /// Number of pages reserved at construction.
    pub page_count: usize,

    /// Chunk count reserved for a cooperating component's shared read
    /// buffers. Carried through for that component to query; the pool
    /// itself does not interpret it.
    pub shared_read_chunk_count: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            page_size: 2 * 1024 * 1024,
            chunk_size: 4096,
            page_count: 64,
            shared_read_chunk_count: 0,
        }
    }
}

impl PoolConfig {
    /// Create a configuration with explicit geometry.
    pub fn new(page_size: usize, chunk_size: usize, page_count: usize) -> Self {
        Self {
            page_size,
            chunk_size,
            page_count,
            shared_read_chunk_count: 0,
        }
    }

    /// Set the page size in bytes.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    /// Set the chunk size in bytes.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Set the number of pages.
    pub fn with_page_count(mut self, page_count: usize) -> Self {
        self.page_count = page_count;
        self
    }

    /// Set the shared read buffer chunk count.
    pub fn with_shared_read_chunk_count(mut self, chunks: usize) -> Self {
        self.shared_read_chunk_count = chunks;
        self
    }

    /// Chunks per page.
    pub fn chunks_per_page(&self) -> usize {
        self.page_size / self.chunk_size
    }

    /// Total reserved capacity in bytes.
    pub fn capacity_bytes(&self) -> usize {
        self.page_size * self.page_count
    }

    /// Validate the configuration.
    ///
    /// A pool built from an invalid configuration could never satisfy a
    /// request, so this is checked once at construction and never on the
    /// request path.
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(PoolError::InvalidConfig("chunk size must be positive"));
        }
        if self.page_size == 0 {
            return Err(PoolError::InvalidConfig("page size must be positive"));
        }
        if self.page_count == 0 {
            return Err(PoolError::InvalidConfig("page count must be positive"));
        }
        if self.page_size % self.chunk_size != 0 {
            return Err(PoolError::InvalidConfig(
                "page size must be a multiple of chunk size",
            ));
        }
        Ok(())
    }
}
