//! Layered error types for the worker and coordinator: each layer gets its
//! own `thiserror` enum, and wraps the layer beneath it with `#[from]`.

use dfs_api::error::WireError;
use thiserror::Error;

/// Allocation-policy internal failure: every worker full, or a policy was
/// asked to allocate before `init`.
#[derive(Error, Debug)]
pub enum PolicyError {
    /// Every worker reported by the policy's view has zero free blocks.
    #[error("no worker has a free block")]
    Exhausted,
}

/// Errors raised inside a single worker's request handling.
#[derive(Error, Debug)]
pub enum WorkerError {
    /// The framed channel broke or carried an unrecognized header.
    #[error("IPC channel error")]
    Wire(#[from] WireError),

    /// Blob storage I/O failed (create, read, write, or delete of a
    /// worker-local block file).
    #[error("block storage I/O error")]
    Storage(#[from] std::io::Error),

    /// `READ_BLOCK`, `WRITE_BLOCK`, or `FREE_BLOCK` named a block ID this
    /// worker has no blob for.
    #[error("unknown block id {0}")]
    UnknownBlock(u64),

    /// `ALLOC_BLOCK` was requested but `used + BLOCK_SIZE > capacity`.
    #[error("worker has no free capacity")]
    NoSpace,
}

/// The coordinator's public error taxonomy: `NoSpace`, `InvalidBlock`,
/// `FileDne`, `Fail`.
#[derive(Error, Debug)]
pub enum CoordinatorError {
    /// The global bitmap is full, or every worker reports zero free blocks.
    #[error("no space available")]
    NoSpace,

    /// A file-relative index fell outside `[0, L)`, or a worker reported an
    /// unknown block ID.
    #[error("invalid block index")]
    InvalidBlock,

    /// `find_file` found no entry with the given name.
    #[error("no file with that name")]
    FileDne,

    /// Catch-all: channel I/O, a worker's `FAIL` response, or an internal
    /// policy error not otherwise classified as `NoSpace`/`InvalidBlock`.
    #[error("operation failed")]
    Fail(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl From<WireError> for CoordinatorError {
    fn from(e: WireError) -> Self {
        CoordinatorError::Fail(Box::new(e))
    }
}

impl From<WorkerError> for CoordinatorError {
    fn from(e: WorkerError) -> Self {
        match e {
            WorkerError::NoSpace => CoordinatorError::NoSpace,
            WorkerError::UnknownBlock(_) => CoordinatorError::InvalidBlock,
            other => CoordinatorError::Fail(Box::new(other)),
        }
    }
}

impl From<PolicyError> for CoordinatorError {
    fn from(e: PolicyError) -> Self {
        match e {
            PolicyError::Exhausted => CoordinatorError::NoSpace,
        }
    }
}

impl From<std::io::Error> for CoordinatorError {
    fn from(e: std::io::Error) -> Self {
        CoordinatorError::Fail(Box::new(e))
    }
}
