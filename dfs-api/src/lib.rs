//! Shared vocabulary between the coordinator and its workers: block
//! addressing types, the framed IPC wire format, the allocation policy
//! trait, and the error type for that wire format.
//!
//! `dfs-core` implements the coordinator, the workers, the bitmap allocator
//! and the concrete allocation policies against the types defined here.

#![deny(missing_docs)]

pub mod error;
pub mod policy;
pub mod types;
pub mod wire;
