//! Implementation of the coordinator, the workers, the block bitmap and
//! the mandatory allocation policies against the vocabulary defined in
//! `dfs-api`.

#![deny(missing_docs)]

pub mod bitmap;
pub mod coordinator;
pub mod error;
pub mod policy;
pub mod worker;
