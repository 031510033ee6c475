//! Zero-copy buffer views handed out by the pool.

use core::fmt;
use core::ops::{Deref, DerefMut};
use core::ptr::NonNull;
use std::sync::Arc;

use crate::error::{PoolError, Result};
use crate::pool::PoolInner;

/// Location of a view's chunk run, recorded at allocation time.
///
/// Carrying the run explicitly (instead of recomputing page and offset from
/// the view's raw address at release time) keeps recycling free of pointer
/// arithmetic while preserving zero-copy semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct BufHandle {
    pub(crate) page: usize,
    pub(crate) start_chunk: usize,
    pub(crate) chunk_count: usize,
}

/// A zero-copy view over a run of chunks in one of the pool's pages.
///
/// The view borrows page memory for its lifetime; the page never hands the
/// same chunks to anyone else while the view is live. Returning the buffer
/// consumes it — [`BufferPool::recycle`](crate::BufferPool::recycle) takes
/// the view by value, so a recycled view can be neither used nor recycled
/// again. Dropping a view without an explicit recycle releases its chunks
/// the same way, so forgetting to return a buffer cannot leak pool capacity.
///
/// Reads and writes go through the `filled` watermark: [`put_slice`]
/// appends, [`as_slice`] (and `Deref`) expose what has been written, and
/// [`as_mut_slice`] exposes the full capacity for direct I/O followed by
/// [`set_filled`]. Chunk memory is recycled without clearing, so bytes
/// beyond the watermark may contain data from earlier users of the chunks.
///
/// [`put_slice`]: PooledBuf::put_slice
/// [`as_slice`]: PooledBuf::as_slice
/// [`as_mut_slice`]: PooledBuf::as_mut_slice
/// [`set_filled`]: PooledBuf::set_filled
pub struct PooledBuf {
    ptr: NonNull<u8>,
    capacity: usize,
    filled: usize,
    handle: BufHandle,
    owner: Arc<str>,
    pool: Arc<PoolInner>,
}

// SAFETY: a view is the sole referent of its chunk run (the owning page's
// chunk map keeps live runs disjoint), and the `pool` back-reference keeps
// the backing page memory alive for as long as the view exists.
unsafe impl Send for PooledBuf {}
unsafe impl Sync for PooledBuf {}

impl PooledBuf {
    pub(crate) fn new(
        ptr: NonNull<u8>,
        capacity: usize,
        handle: BufHandle,
        owner: Arc<str>,
        pool: Arc<PoolInner>,
    ) -> Self {
        Self {
            ptr,
            capacity,
            filled: 0,
            handle,
            owner,
            pool,
        }
    }

    /// Total capacity in bytes (request size rounded up to whole chunks).
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Bytes written so far.
    pub fn len(&self) -> usize {
        self.filled
    }

    /// Whether nothing has been written yet.
    pub fn is_empty(&self) -> bool {
        self.filled == 0
    }

    /// Capacity still unwritten.
    pub fn remaining(&self) -> usize {
        self.capacity - self.filled
    }

    /// Append `data`, advancing the write watermark.
    ///
    /// Fails with [`PoolError::CapacityExceeded`] when the write does not
    /// fit; the view is unchanged and the caller may
    /// [`expand`](crate::BufferPool::expand) it and retry.
    pub fn put_slice(&mut self, data: &[u8]) -> Result<()> {
        let needed = self.filled + data.len();
        if needed > self.capacity {
            return Err(PoolError::CapacityExceeded {
                capacity: self.capacity,
                needed,
            });
        }
        // SAFETY: destination range lies within this view's exclusive run.
        unsafe {
            core::ptr::copy_nonoverlapping(
                data.as_ptr(),
                self.ptr.as_ptr().add(self.filled),
                data.len(),
            );
        }
        self.filled = needed;
        Ok(())
    }

    /// The written prefix of the view.
    pub fn as_slice(&self) -> &[u8] {
        // SAFETY: `filled <= capacity` and the run is exclusively ours.
        unsafe { core::slice::from_raw_parts(self.ptr.as_ptr(), self.filled) }
    }

    /// The full capacity of the view, for direct writes (for example a
    /// socket read straight into pool memory). Pair with [`set_filled`]
    /// to record how much was actually written.
    ///
    /// [`set_filled`]: PooledBuf::set_filled
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        // SAFETY: the run is exclusively ours for the view's lifetime.
        unsafe { core::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.capacity) }
    }

    /// The unwritten tail of the view.
    pub fn spare_mut(&mut self) -> &mut [u8] {
        let filled = self.filled;
        &mut self.as_mut_slice()[filled..]
    }

    /// Set the write watermark after writing through [`as_mut_slice`],
    /// clamped to the view's capacity.
    ///
    /// [`as_mut_slice`]: PooledBuf::as_mut_slice
    pub fn set_filled(&mut self, filled: usize) {
        self.filled = filled.min(self.capacity);
    }

    /// Reset the write watermark to zero. The backing chunks keep their
    /// contents; only the watermark moves.
    pub fn clear(&mut self) {
        self.filled = 0;
    }

    pub(crate) fn pool(&self) -> &Arc<PoolInner> {
        &self.pool
    }
}

impl Deref for PooledBuf {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.as_slice()
    }
}

impl DerefMut for PooledBuf {
    fn deref_mut(&mut self) -> &mut [u8] {
        let filled = self.filled;
        // SAFETY: `filled <= capacity` and the run is exclusively ours.
        unsafe { core::slice::from_raw_parts_mut(self.ptr.as_ptr(), filled) }
    }
}

impl AsRef<[u8]> for PooledBuf {
    fn as_ref(&self) -> &[u8] {
        self.as_slice()
    }
}

impl fmt::Debug for PooledBuf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledBuf")
            .field("capacity", &self.capacity)
            .field("filled", &self.filled)
            .field("page", &self.handle.page)
            .field("start_chunk", &self.handle.start_chunk)
            .field("chunk_count", &self.handle.chunk_count)
            .field("owner", &self.owner)
            .finish()
    }
}

impl Drop for PooledBuf {
    fn drop(&mut self) {
        self.pool.release(self.handle, &self.owner, self.capacity);
    }
}
