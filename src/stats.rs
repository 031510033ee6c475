//! Pool-wide counters and the diagnostic status report.

use core::fmt;
use core::sync::atomic::{AtomicU64, Ordering};

use crate::utils::format_bytes;

/// Monotonic operation counters.
///
/// Diagnostic only: nothing in the allocator depends on these for
/// correctness, so all updates are relaxed.
#[derive(Debug, Default)]
pub(crate) struct PoolStats {
    allocate_total: AtomicU64,
    allocate_success: AtomicU64,
    recycle_total: AtomicU64,
    recycle_success: AtomicU64,
}

impl PoolStats {
    pub(crate) fn record_allocate(&self) {
        self.allocate_total.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_allocate_success(&self) {
        self.allocate_success.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_recycle(&self) {
        self.recycle_total.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_recycle_success(&self) {
        self.recycle_success.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> PoolStatsSnapshot {
        PoolStatsSnapshot {
            allocate_total: self.allocate_total.load(Ordering::Relaxed),
            allocate_success: self.allocate_success.load(Ordering::Relaxed),
            recycle_total: self.recycle_total.load(Ordering::Relaxed),
            recycle_success: self.recycle_success.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of the pool counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStatsSnapshot {
    /// Allocation attempts, successful or not.
    pub allocate_total: u64,
    /// Allocations that returned a view.
    pub allocate_success: u64,
    /// Release attempts (explicit recycle or view drop).
    pub recycle_total: u64,
    /// Releases matched to a page run and freed.
    pub recycle_success: u64,
}

impl PoolStatsSnapshot {
    /// Allocations that failed for lack of a free run.
    pub fn allocate_failures(&self) -> u64 {
        self.allocate_total - self.allocate_success
    }

    /// Releases that could not be matched to a page run.
    ///
    /// A nonzero value indicates a caller bug upstream (stale or corrupted
    /// handle); pool state stays consistent regardless.
    pub fn unmatched_recycles(&self) -> u64 {
        self.recycle_total - self.recycle_success
    }
}

/// Occupancy of a single page, in chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageOccupancy {
    /// Chunks currently allocated to live views.
    pub used_chunks: usize,
    /// Total chunks in the page.
    pub chunk_count: usize,
}

/// Human-readable pool status: counters plus per-page occupancy.
///
/// The rendered format is display-only for operators and admin consoles;
/// it is not a contract other components should parse.
#[derive(Debug, Clone)]
pub struct PoolStatus {
    /// Total reserved capacity in bytes.
    pub capacity_bytes: usize,
    /// Counter snapshot.
    pub stats: PoolStatsSnapshot,
    /// Per-page occupancy, indexed by page.
    pub pages: Vec<PageOccupancy>,
}

impl fmt::Display for PoolStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "buffer pool status {{")?;
        writeln!(
            f,
            "  capacity = {} ({} pages)",
            format_bytes(self.capacity_bytes as u64),
            self.pages.len()
        )?;
        writeln!(
            f,
            "  allocate = {} ({} ok), recycle = {} ({} ok)",
            self.stats.allocate_total,
            self.stats.allocate_success,
            self.stats.recycle_total,
            self.stats.recycle_success
        )?;
        for (idx, page) in self.pages.iter().enumerate() {
            writeln!(
                f,
                "  page {idx}: {}/{} chunks used",
                page.used_chunks, page.chunk_count
            )?;
        }
        write!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let stats = PoolStats::default();
        stats.record_allocate();
        stats.record_allocate();
        stats.record_allocate_success();
        stats.record_recycle();

        let snap = stats.snapshot();
        assert_eq!(snap.allocate_total, 2);
        assert_eq!(snap.allocate_success, 1);
        assert_eq!(snap.allocate_failures(), 1);
        assert_eq!(snap.recycle_total, 1);
        assert_eq!(snap.unmatched_recycles(), 1);
    }

    #[test]
    fn status_renders_pages() {
        let status = PoolStatus {
            capacity_bytes: 16 * 1024,
            stats: PoolStatsSnapshot {
                allocate_total: 4,
                allocate_success: 4,
                recycle_total: 2,
                recycle_success: 2,
            },
            pages: vec![
                PageOccupancy {
                    used_chunks: 2,
                    chunk_count: 4,
                },
                PageOccupancy {
                    used_chunks: 0,
                    chunk_count: 4,
                },
            ],
        };

        let text = status.to_string();
        assert!(text.contains("capacity = 16.00 KB (2 pages)"));
        assert!(text.contains("page 0: 2/4 chunks used"));
        assert!(text.contains("page 1: 0/4 chunks used"));
        assert!(text.contains("allocate = 4 (4 ok)"));
    }
}
