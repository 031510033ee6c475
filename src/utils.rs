//! Chunk math and formatting helpers.

/// Number of chunks needed to cover `size` bytes.
#[inline(always)]
pub(crate) const fn chunks_for(size: usize, chunk_size: usize) -> usize {
    debug_assert!(chunk_size > 0);
    size / chunk_size + if size % chunk_size == 0 { 0 } else { 1 }
}

/// Format a byte count into a human-readable string.
pub(crate) fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    if bytes < 1024 {
        return format!("{bytes} B");
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.2} {}", value, UNITS[unit])
}
