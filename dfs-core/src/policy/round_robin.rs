//! `roundrobin` allocation policy: advance a cursor each call, skipping
//! full workers.

use dfs_api::policy::{AllocContext, AllocationPolicy, PolicyView};
use dfs_api::types::WorkerId;

/// Round-robin worker choice. The cursor starts at `-1` so the first
/// allocation lands on worker 0.
pub struct RoundRobinPolicy {
    last: i64,
    num_workers: usize,
}

impl RoundRobinPolicy {
    /// Build a fresh policy; the cursor is seeded to `-1` so the first
    /// allocation lands on worker 0.
    pub fn new() -> Self {
        RoundRobinPolicy {
            last: -1,
            num_workers: 0,
        }
    }
}

impl Default for RoundRobinPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl AllocationPolicy for RoundRobinPolicy {
    fn name(&self) -> &'static str {
        "roundrobin"
    }

    fn init(&mut self, capacities: &[u64]) {
        self.num_workers = capacities.len();
        self.last = -1;
    }

    fn choose_worker(&mut self, view: PolicyView<'_>, _ctx: AllocContext) -> Option<WorkerId> {
        let n = view.num_workers();
        if n == 0 || view.all_full() {
            return None;
        }
        for _ in 0..n {
            self.last = (self.last + 1) % n as i64;
            let candidate = self.last as usize;
            if view.free(candidate) > 0 {
                return Some(candidate);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_allocation_goes_to_worker_zero() {
        let mut policy = RoundRobinPolicy::new();
        policy.init(&[3u64, 3, 3]);
        let free = [1u64, 1, 1];
        let view = PolicyView::new(&free);
        let ctx = AllocContext {
            file_id: 0,
            expected_blocks: 1,
        };
        assert_eq!(policy.choose_worker(view, ctx), Some(0));
        assert_eq!(policy.choose_worker(view, ctx), Some(1));
        assert_eq!(policy.choose_worker(view, ctx), Some(2));
        assert_eq!(policy.choose_worker(view, ctx), Some(0));
    }

    #[test]
    fn skips_full_workers() {
        let mut policy = RoundRobinPolicy::new();
        policy.init(&[3u64, 3, 3]);
        let free = [0u64, 1, 0];
        let view = PolicyView::new(&free);
        let ctx = AllocContext {
            file_id: 0,
            expected_blocks: 1,
        };
        assert_eq!(policy.choose_worker(view, ctx), Some(1));
        assert_eq!(policy.choose_worker(view, ctx), Some(1));
    }

    #[test]
    fn none_when_all_full() {
        let mut policy = RoundRobinPolicy::new();
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
