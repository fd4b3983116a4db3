//! Shared scratch-directory setup for the scenario tests: a fresh
//! `tempfile::TempDir` per coordinator instance.

use dfs_core::coordinator::Coordinator;
use tempfile::TempDir;

/// A coordinator plus the scratch directory backing its workers' block
/// storage. Keeping the `TempDir` alive for the test's duration is what
/// keeps the directory from being deleted out from under running workers.
pub struct Harness {
    pub coordinator: Coordinator,
    _root: TempDir,
}

impl Harness {
    /// Spin up a coordinator with `n` workers, `capacity_bytes` total
    /// storage, and the named allocation policy.
    pub fn new(n: usize, capacity_bytes: u64, policy_name: &str) -> Harness {
        let root = TempDir::new().expect("failed to create scratch directory");
        let coordinator = Coordinator::init(n, capacity_bytes, policy_name, root.path())
            .expect("coordinator init failed");
        Harness {
            coordinator,
            _root: root,
        }
    }
}
