//! `leastloaded` allocation policy: pick the worker with the most free
//! blocks.

use dfs_api::policy::{AllocContext, AllocationPolicy, PolicyView};
use dfs_api::types::WorkerId;

/// Stateless: every call re-scans the free-block view.
pub struct LeastLoadedPolicy;

impl LeastLoadedPolicy {
    /// Build the policy. There is no per-instance state to initialize.
    pub fn new() -> Self {
        LeastLoadedPolicy
    }
}

impl Default for LeastLoadedPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl AllocationPolicy for LeastLoadedPolicy {
    fn name(&self) -> &'static str {
        "leastloaded"
    }

    fn init(&mut self, _capacities: &[u64]) {}

    fn choose_worker(&mut self, view: PolicyView<'_>, _ctx: AllocContext) -> Option<WorkerId> {
        view.iter()
            .filter(|&(_, free)| free > 0)
            .max_by_key(|&(_, free)| free)
            .map(|(id, _)| id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picks_the_worker_with_most_free_blocks() {
        let mut policy = LeastLoadedPolicy::new();
        policy.init(&[3u64, 3, 3]);
        let free = [2u64, 9, 4];
        let view = PolicyView::new(&free);
        let ctx = AllocContext {
            file_id: 0,
            expected_blocks: 1,
        };
        assert_eq!(policy.choose_worker(view, ctx), Some(1));
    }

    #[test]
    fn skips_full_workers() {
        let mut policy = LeastLoadedPolicy::new();
        policy.init(&[2u64, 2]);
        let free = [0u64, 1];
        let view = PolicyView::new(&free);
        let ctx = AllocContext {
            file_id: 0,
            expected_blocks: 1,
        };
        assert_eq!(policy.choose_worker(view, ctx), Some(1));
    }

    #[test]
    fn none_when_all_full() {
        let mut policy = LeastLoadedPolicy::new();
        policy.init(&[2u64, 2]);
        let free = [0u64, 0];
        let view = PolicyView::new(&free);
        let ctx = AllocContext {
            file_id: 0,
            expected_blocks: 1,
        };
        assert_eq!(policy.choose_worker(view, ctx), None);
    }
}
