//! The pool: page selection, allocation, recycling, and accounting.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, warn};

use crate::buffer::{BufHandle, PooledBuf};
use crate::config::PoolConfig;
use crate::error::{PoolError, Result};
use crate::page::Page;
use crate::stats::{PageOccupancy, PoolStats, PoolStatsSnapshot, PoolStatus};
use crate::utils::chunks_for;

/// Fixed-capacity, page-structured pool of raw byte buffers.
///
/// The pool reserves all of its pages at construction and satisfies
/// arbitrary-size requests from fixed-size chunks, handing back zero-copy
/// [`PooledBuf`] views. Allocation shards contention across pages: a racy
/// atomic cursor spreads successive requests over the page array, and each
/// page serializes its own chunk bookkeeping behind its own lock.
///
/// `BufferPool` is cheap to clone (the clone shares the same pages) and is
/// `Send + Sync`, so one pool can serve many worker threads directly.
///
/// # Example
///
/// ```
/// use pagepool::{BufferPool, PoolConfig};
///
/// # fn main() -> pagepool::Result<()> {
/// let pool = BufferPool::new(PoolConfig::new(4096, 1024, 4))?;
///
/// let mut buf = pool.allocate(1500)?;
/// assert_eq!(buf.capacity(), 2048); // rounded up to whole chunks
/// buf.put_slice(b"response payload")?;
/// assert_eq!(&buf[..], b"response payload");
///
/// pool.recycle(buf);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct BufferPool {
    inner: Arc<PoolInner>,
}

pub(crate) struct PoolInner {
    config: PoolConfig,
    pages: Box<[Page]>,
    /// Sticky page cursor. Every allocation bumps it and a success
    /// overwrites it with the winning page index. Racy on purpose: it is a
    /// load-balancing heuristic with no correctness obligation — page locks
    /// alone guarantee consistency.
    next_page: AtomicUsize,
    /// Outstanding bytes per requester. Entries are created lazily on a
    /// requester's first allocation; updates go through the map's entry
    /// guard so a read-modify-write on one key cannot lose increments.
    usage: DashMap<Arc<str>, u64>,
    stats: PoolStats,
}

impl BufferPool {
    /// Build a pool, reserving all pages eagerly (zero-initialized).
    ///
    /// Fails with [`PoolError::InvalidConfig`] on a configuration that
    /// could never satisfy a request.
    pub fn new(config: PoolConfig) -> Result<Self> {
        config.validate()?;
        let pages: Box<[Page]> = (0..config.page_count)
            .map(|_| Page::new(config.page_size, config.chunk_size))
            .collect();
        debug!(
            page_count = config.page_count,
            page_size = config.page_size,
            chunk_size = config.chunk_size,
            "reserved buffer pool pages"
        );
        Ok(Self {
            inner: Arc::new(PoolInner {
                config,
                pages,
                next_page: AtomicUsize::new(0),
                usage: DashMap::new(),
                stats: PoolStats::default(),
            }),
        })
    }

    /// Build a pool from [`PoolConfig::default`].
    pub fn with_defaults() -> Result<Self> {
        Self::new(PoolConfig::default())
    }

    /// Allocate a view of at least `size` bytes (rounded up to whole
    /// chunks).
    ///
    /// Picks a starting page from the sticky cursor, scans forward to the
    /// end of the page array, then wraps around and scans the remainder, so
    /// capacity anywhere in the pool is found before the request is
    /// declared unsatisfiable. Never blocks or retries: exhaustion returns
    /// [`PoolError::Exhausted`] immediately and the caller decides whether
    /// to fall back to an unpooled buffer.
    pub fn allocate(&self, size: usize) -> Result<PooledBuf> {
        let inner = &self.inner;
        inner.stats.record_allocate();
        if size == 0 {
            return Err(PoolError::InvalidSize);
        }

        let chunk_size = inner.config.chunk_size;
        let chunk_count = chunks_for(size, chunk_size);

        // A run longer than a page can never fit; skip the scan.
        if chunk_count <= inner.config.chunks_per_page() {
            let page_count = inner.pages.len();
            let start = inner.next_page.fetch_add(1, Ordering::Relaxed) % page_count;
            let won = (start..page_count).chain(0..start).find_map(|page| {
                inner.pages[page]
                    .allocate_run(chunk_count)
                    .map(|start_chunk| (page, start_chunk))
            });

            if let Some((page, start_chunk)) = won {
                // Best-effort stickiness; a concurrent winner may overwrite.
                inner.next_page.store(page, Ordering::Relaxed);
                inner.stats.record_allocate_success();

                let capacity = chunk_count * chunk_size;
                let owner = requester_label();
                *inner.usage.entry(Arc::clone(&owner)).or_insert(0) += capacity as u64;

                return Ok(PooledBuf::new(
                    inner.pages[page].chunk_ptr(start_chunk),
                    capacity,
                    BufHandle {
                        page,
                        start_chunk,
                        chunk_count,
                    },
                    owner,
                    Arc::clone(inner),
                ));
            }
        }

        warn!(
            requested = size,
            chunks = chunk_count,
            "buffer pool exhausted"
        );
        Err(PoolError::Exhausted {
            requested: size,
            chunks: chunk_count,
        })
    }

    /// Return a view to the pool.
    ///
    /// Consumes the view, so it can be neither used nor recycled again.
    /// Dropping a view has the same effect; the explicit form exists for
    /// call sites where the return is a meaningful event (a flushed write
    /// buffer, a fully parsed request).
    pub fn recycle(&self, buf: PooledBuf) {
        if !Arc::ptr_eq(&self.inner, buf.pool()) {
            // The view still returns to the pool that owns it when dropped;
            // this pool's state is untouched.
            warn!("recycled buffer belongs to a different pool");
        }
        drop(buf);
    }

    /// Grow a view to twice its current capacity.
    ///
    /// On success the view's written prefix is preserved at the same
    /// offsets, its capacity doubles, and the old chunk run is released.
    /// On failure the view is untouched and still valid, and the caller
    /// handles the condition as a size limit. The `&mut` receiver makes
    /// the caller's exclusive access a compile-time guarantee.
    pub fn expand(&self, buf: &mut PooledBuf) -> Result<()> {
        if !Arc::ptr_eq(&self.inner, buf.pool()) {
            return Err(PoolError::ForeignBuffer);
        }

        let mut grown = self.allocate(buf.capacity() * 2)?;
        grown.put_slice(buf.as_slice())?;
        debug!(
            old_capacity = buf.capacity(),
            new_capacity = grown.capacity(),
            "expanded pooled buffer"
        );
        core::mem::swap(buf, &mut grown);
        // `grown` now holds the old run; dropping it releases the chunks.
        Ok(())
    }

    /// Total reserved capacity in bytes (`page_count × page_size`).
    pub fn capacity_bytes(&self) -> usize {
        self.inner.config.capacity_bytes()
    }

    /// Bytes per chunk.
    pub fn chunk_size_bytes(&self) -> usize {
        self.inner.config.chunk_size
    }

    /// Bytes per page.
    pub fn page_size_bytes(&self) -> usize {
        self.inner.config.page_size
    }

    /// Number of pages.
    pub fn page_count(&self) -> usize {
        self.inner.pages.len()
    }

    /// Chunk count reserved for a cooperating component's shared read
    /// buffers; not interpreted by the pool.
    pub fn shared_read_chunk_count(&self) -> usize {
        self.inner.config.shared_read_chunk_count
    }

    /// Free chunks summed over all pages. Diagnostic: the value can be
    /// stale by the time it is read under concurrency.
    pub fn free_chunks(&self) -> usize {
        self.inner.pages.iter().map(Page::free_chunks).sum()
    }

    /// Outstanding bytes per requester.
    pub fn usage_snapshot(&self) -> HashMap<String, u64> {
        self.inner
            .usage
            .iter()
            .map(|entry| (entry.key().to_string(), *entry.value()))
            .collect()
    }

    /// Snapshot of the operation counters.
    pub fn stats(&self) -> PoolStatsSnapshot {
        self.inner.stats.snapshot()
    }

    /// Counters plus per-page occupancy, for operators.
    pub fn status(&self) -> PoolStatus {
        PoolStatus {
            capacity_bytes: self.capacity_bytes(),
            stats: self.stats(),
            pages: self
                .inner
                .pages
                .iter()
                .map(|page| PageOccupancy {
                    used_chunks: page.used_chunks(),
                    chunk_count: page.chunk_count(),
                })
                .collect(),
        }
    }

    /// Rendered [`status`](BufferPool::status), for admin consoles.
    pub fn status_text(&self) -> String {
        self.status().to_string()
    }
}

impl PoolInner {
    /// Return a view's chunk run to its page and settle accounting.
    ///
    /// Called exactly once per view, from the view's drop. A handle that
    /// fails bounds checks is ignored with a warning: it signals a logic
    /// error upstream, never corrupts pool state, and shows up in the
    /// counters as an unmatched recycle.
    pub(crate) fn release(&self, handle: BufHandle, owner: &Arc<str>, capacity: usize) {
        self.stats.record_recycle();
        let freed = self
            .pages
            .get(handle.page)
            .is_some_and(|page| page.free_run(handle.start_chunk, handle.chunk_count));
        if freed {
            self.stats.record_recycle_success();
            if let Some(mut used) = self.usage.get_mut(owner) {
                *used = used.saturating_sub(capacity as u64);
            }
        } else {
            warn!(
                page = handle.page,
                start_chunk = handle.start_chunk,
                chunk_count = handle.chunk_count,
                "unmatched buffer release ignored"
            );
        }
    }
}

thread_local! {
    static REQUESTER_LABEL: Arc<str> = {
        let current = std::thread::current();
        match current.name() {
            Some(name) => Arc::from(name),
            None => Arc::from(format!("{:?}", current.id()).as_str()),
        }
    };
}

/// Identity the current thread's allocations are accounted against: the
/// thread name, or the thread id for unnamed threads.
fn requester_label() -> Arc<str> {
    REQUESTER_LABEL.with(Arc::clone)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_pool() -> BufferPool {
        // 4 pages of 4 KB, 1 KB chunks: 16 chunks total.
        BufferPool::new(PoolConfig::new(4096, 1024, 4)).unwrap()
    }

    #[test]
    fn allocation_rounds_up_to_chunks() {
        let pool = small_pool();
        let buf = pool.allocate(1).unwrap();
        assert_eq!(buf.capacity(), 1024);
        let buf2 = pool.allocate(1025).unwrap();
        assert_eq!(buf2.capacity(), 2048);
    }

    #[test]
    fn zero_size_is_rejected() {
        let pool = small_pool();
        assert_eq!(pool.allocate(0).unwrap_err(), PoolError::InvalidSize);
    }

    #[test]
    fn oversized_request_fails_without_scanning() {
        let pool = small_pool();
        // 5 chunks cannot fit in a 4-chunk page even though 16 are free.
        let err = pool.allocate(5 * 1024).unwrap_err();
        assert_eq!(
            err,
            PoolError::Exhausted {
                requested: 5 * 1024,
                chunks: 5
            }
        );
        assert_eq!(pool.free_chunks(), 16);
    }

    #[test]
    fn wrap_around_scan_finds_capacity_anywhere() {
        let pool = small_pool();
        // Which page serves which request depends on the racy cursor and is
        // deliberately unspecified; totals are what matters.
        let bufs: Vec<_> = (0..8).map(|_| pool.allocate(2048).unwrap()).collect();
        assert_eq!(pool.free_chunks(), 0);
        let status = pool.status();
        assert!(status.pages.iter().all(|p| p.used_chunks == p.chunk_count));
        drop(bufs);
        assert_eq!(pool.free_chunks(), 16);
    }

    #[test]
    fn configuration_queries() {
        let pool = BufferPool::new(
            PoolConfig::new(4096, 1024, 4).with_shared_read_chunk_count(2),
        )
        .unwrap();
        assert_eq!(pool.capacity_bytes(), 16 * 1024);
        assert_eq!(pool.chunk_size_bytes(), 1024);
        assert_eq!(pool.page_size_bytes(), 4096);
        assert_eq!(pool.page_count(), 4);
        assert_eq!(pool.shared_read_chunk_count(), 2);
    }

    #[test]
    fn invalid_config_is_rejected_at_construction() {
        assert!(BufferPool::new(PoolConfig::new(4096, 0, 4)).is_err());
        assert!(BufferPool::new(PoolConfig::new(4000, 1024, 4)).is_err());
    }

    #[test]
    fn unmatched_release_is_counted_not_fatal() {
        let pool = small_pool();
        let handle = BufHandle {
            page: 99,
            start_chunk: 0,
            chunk_count: 1,
        };
        pool.inner.release(handle, &Arc::from("nobody"), 1024);

        let stats = pool.stats();
        assert_eq!(stats.recycle_total, 1);
        assert_eq!(stats.recycle_success, 0);
        assert_eq!(stats.unmatched_recycles(), 1);
        assert_eq!(pool.free_chunks(), 16);
    }

    #[test]
    fn stale_run_release_is_bounds_checked() {
        let pool = small_pool();
        // Valid page, run extends past the end of the chunk table.
        let handle = BufHandle {
            page: 0,
            start_chunk: 3,
            chunk_count: 4,
        };
        pool.inner.release(handle, &Arc::from("nobody"), 4096);
        assert_eq!(pool.stats().unmatched_recycles(), 1);
        assert_eq!(pool.free_chunks(), 16);
    }

    #[test]
    fn clones_share_pages() {
        let pool = small_pool();
        let clone = pool.clone();
        let buf = pool.allocate(1024).unwrap();
        assert_eq!(clone.free_chunks(), 15);
        clone.recycle(buf);
        assert_eq!(pool.free_chunks(), 16);
    }
}
