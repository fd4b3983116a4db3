//! Shared address-space vocabulary: the block size constant and the handle
//! types that name blocks, workers and files across the coordinator/worker
//! boundary.

/// Size, in bytes, of the unit of allocation and I/O.
///
/// Fixed at build time: a small power of two, e.g. 4096. All wire payloads
/// that carry block contents are exactly this many bytes; there is no
/// negotiation of block size between coordinator and worker.
pub const BLOCK_SIZE: usize = 4096;

/// Global block address, in `[0, B)` where `B` is the coordinator's total
/// block count. Assigned by the coordinator's bitmap allocator; opaque to
/// workers beyond being a key into their local blob storage.
pub type BlockId = u64;

/// Index of a worker (data node) in `[0, N)`.
pub type WorkerId = usize;

/// Handle to a file, returned by `create_file`. Currently just the file's
/// index in the coordinator's file table.
pub type FileId = usize;

/// A file-relative block index in `[0, L)`, where `L` is the file's current
/// logical block count.
pub type FileBlockIndex = u64;
