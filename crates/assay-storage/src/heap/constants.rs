//! Block layout constants.

/// Size of the block header in bytes (the `valid_count` field).
pub const BLOCK_HEADER_SIZE: usize = 4;

/// Size of the per-slot presence flag in bytes.
pub const SLOT_FLAG_SIZE: usize = 1;

/// Number of record slots that fit a cluster of the given size.
pub fn capacity_for(cluster_size: usize, record_size: usize) -> usize {
    (cluster_size.saturating_sub(BLOCK_HEADER_SIZE)) / (SLOT_FLAG_SIZE + record_size)
}

/// On-disk size of a block with the given capacity.
pub fn block_size_for(capacity: usize, record_size: usize) -> usize {
    BLOCK_HEADER_SIZE + capacity * (SLOT_FLAG_SIZE + record_size)
}
