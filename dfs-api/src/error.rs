//! Errors raised by the framed IPC channel.
//!
//! Short reads/writes are handled by `std::io::Read::read_exact` /
//! `Write::write_all` themselves (they retry internally on partial progress
//! and `Interrupted`); what reaches this type is only the terminal case: the
//! connection broke, or the peer sent a header we cannot make sense of.

use std::io;
use thiserror::Error;

/// Error type for the framed channel layer.
#[derive(Error, Debug)]
pub enum WireError {
    /// The underlying stream returned an I/O error (including a clean EOF
    /// while a header or payload was still expected, which `read_exact`
    /// surfaces as `UnexpectedEof`). A broken connection is always fatal.
    #[error("IPC channel I/O failure")]
    Io(#[from] io::Error),

    /// A response carried a status code this build does not recognize, or a
    /// request carried an unrecognized command code.
    #[error("unrecognized wire code: {0}")]
    UnknownCode(u32),

    /// A payload's declared size did not match what the command shape
    /// requires (e.g. a `WRITE_BLOCK` payload shorter than `BLOCK_SIZE` plus
    /// the block index field).
    #[error("malformed payload: {0}")]
    MalformedPayload(&'static str),
}

/// Result alias used throughout the wire layer.
pub type Result<T> = std::result::Result<T, WireError>;
