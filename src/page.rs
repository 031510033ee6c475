//! A page: one contiguous memory region subdivided into fixed-size chunks.
//!
//! Pages are the unit of internal locking. Each page tracks its own chunk
//! occupancy under its own mutex, so two threads working on different pages
//! never contend. Lock hold time is bounded by a linear scan of the chunk
//! map; no I/O or blocking calls happen under the lock.

use core::ptr::NonNull;

use parking_lot::Mutex;

/// One reserved memory region plus its chunk occupancy map.
///
/// The region is reserved once at construction and never resized or moved,
/// so chunk pointers handed out by [`chunk_ptr`](Page::chunk_ptr) stay valid
/// for the page's whole lifetime.
pub(crate) struct Page {
    base: NonNull<u8>,
    page_size: usize,
    chunk_size: usize,
    chunks: Mutex<ChunkMap>,
}

// SAFETY: the chunk map guarantees that live views cover pairwise disjoint
// chunk ranges, so concurrent access to page memory through views never
// aliases. The map itself is guarded by the page mutex.
unsafe impl Send for Page {}
unsafe impl Sync for Page {}

impl Page {
    /// Reserve a zero-initialized page. `page_size` must be a positive
    /// multiple of `chunk_size`; the pool validates this at construction.
    pub(crate) fn new(page_size: usize, chunk_size: usize) -> Self {
        debug_assert!(chunk_size > 0 && page_size % chunk_size == 0);
        let chunk_count = page_size / chunk_size;
        let region = Box::into_raw(vec![0u8; page_size].into_boxed_slice());
        // SAFETY: Box::into_raw never returns null.
        let base = unsafe { NonNull::new_unchecked(region as *mut u8) };
        Self {
            base,
            page_size,
            chunk_size,
            chunks: Mutex::new(ChunkMap::new(chunk_count)),
        }
    }

    /// First-fit allocation of `chunk_count` contiguous chunks.
    ///
    /// Returns the starting chunk index, or `None` without side effects if
    /// no sufficiently long free run exists.
    pub(crate) fn allocate_run(&self, chunk_count: usize) -> Option<usize> {
        self.chunks.lock().allocate_run(chunk_count)
    }

    /// Mark `[start_chunk, start_chunk + chunk_count)` free.
    ///
    /// Bounds-checked: returns `false` and changes nothing when the range
    /// does not lie within this page. Chunks already free are left as-is,
    /// so a redundant free cannot corrupt the map.
    pub(crate) fn free_run(&self, start_chunk: usize, chunk_count: usize) -> bool {
        self.chunks.lock().free_run(start_chunk, chunk_count)
    }

    /// Pointer to the first byte of `start_chunk`.
    pub(crate) fn chunk_ptr(&self, start_chunk: usize) -> NonNull<u8> {
        debug_assert!(start_chunk < self.chunk_count());
        // SAFETY: the offset stays inside the page's reserved region.
        unsafe { NonNull::new_unchecked(self.base.as_ptr().add(start_chunk * self.chunk_size)) }
    }

    pub(crate) fn chunk_count(&self) -> usize {
        self.page_size / self.chunk_size
    }

    pub(crate) fn free_chunks(&self) -> usize {
        self.chunks.lock().free
    }

    pub(crate) fn used_chunks(&self) -> usize {
        self.chunk_count() - self.free_chunks()
    }
}

impl Drop for Page {
    fn drop(&mut self) {
        // SAFETY: `base` came from Box::into_raw with exactly this length
        // and is dropped once; views keep the pool (and thus every page)
        // alive, so no view can outlive this memory.
        unsafe {
            drop(Box::from_raw(core::ptr::slice_from_raw_parts_mut(
                self.base.as_ptr(),
                self.page_size,
            )));
        }
    }
}

/// Bit-per-chunk occupancy map. A set bit means the chunk is in use.
struct ChunkMap {
    words: Box<[u64]>,
    chunk_count: usize,
    free: usize,
}

impl ChunkMap {
    fn new(chunk_count: usize) -> Self {
        let word_count = chunk_count / 64 + usize::from(chunk_count % 64 != 0);
        Self {
            words: vec![0u64; word_count].into_boxed_slice(),
            chunk_count,
            free: chunk_count,
        }
    }

    #[inline]
    fn is_used(&self, idx: usize) -> bool {
        self.words[idx / 64] & (1 << (idx % 64)) != 0
    }

    #[inline]
    fn set_used(&mut self, idx: usize) {
        self.words[idx / 64] |= 1 << (idx % 64);
    }

    #[inline]
    fn set_free(&mut self, idx: usize) {
        self.words[idx / 64] &= !(1 << (idx % 64));
    }

    /// First-fit scan from chunk 0 for `count` consecutive free chunks.
    fn allocate_run(&mut self, count: usize) -> Option<usize> {
        if count == 0 || count > self.free {
            return None;
        }
        let mut run = 0;
        for idx in 0..self.chunk_count {
            if self.is_used(idx) {
                run = 0;
                continue;
            }
            run += 1;
            if run == count {
                let start = idx + 1 - count;
                for i in start..=idx {
                    self.set_used(i);
                }
                self.free -= count;
                return Some(start);
            }
        }
        None
    }

    fn free_run(&mut self, start: usize, count: usize) -> bool {
        let Some(end) = start.checked_add(count) else {
            return false;
        };
        if end > self.chunk_count {
            return false;
        }
        for idx in start..end {
            if self.is_used(idx) {
                self.set_free(idx);
                self.free += 1;
            }
        }
        true
    }
}
