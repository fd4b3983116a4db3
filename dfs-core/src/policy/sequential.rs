//! `sequential` allocation policy: fill worker 0 completely before moving to
//! worker 1, and so on.

use dfs_api::policy::{AllocContext, AllocationPolicy, PolicyView};
use dfs_api::types::WorkerId;

/// Fills workers strictly in order. The cursor only ever advances, so a
/// worker left with a single free block when the cursor passes it stays
/// stranded: this uses a `<= 1` threshold deliberately, not `< 1`.
pub struct SequentialPolicy {
    cursor: usize,
}

impl SequentialPolicy {
    /// Build a fresh policy with the cursor at worker 0.
    pub fn new() -> Self {
        SequentialPolicy { cursor: 0 }
    }
}

impl Default for SequentialPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl AllocationPolicy for SequentialPolicy {
    fn name(&self) -> &'static str {
        "sequential"
    }

    fn init(&mut self, _capacities: &[u64]) {
        self.cursor = 0;
    }

    fn choose_worker(&mut self, view: PolicyView<'_>, _ctx: AllocContext) -> Option<WorkerId> {
        let n = view.num_workers();
        while self.cursor < n {
            if view.free(self.cursor) <= 1 {
                self.cursor += 1;
                continue;
            }
            return Some(self.cursor);
        }
        None
    }
}
