//! `rand` allocation policy: uniformly pick a worker, retrying on a full
//! worker, falling back to a linear scan.

use std::time::{SystemTime, UNIX_EPOCH};

use dfs_api::policy::{AllocContext, AllocationPolicy, PolicyView};
use dfs_api::types::WorkerId;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Uniform-random worker choice, seeded once at `init` from the wall clock.
pub struct RandPolicy {
    rng: Option<StdRng>,
    num_workers: usize,
}

impl RandPolicy {
    /// Build an un-initialized policy; [`AllocationPolicy::init`] seeds the
    /// RNG.
    pub fn new() -> Self {
        RandPolicy {
            rng: None,
            num_workers: 0,
        }
    }
}

impl Default for RandPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl AllocationPolicy for RandPolicy {
    fn name(&self) -> &'static str {
        "rand"
    }

    fn init(&mut self, capacities: &[u64]) {
        self.num_workers = capacities.len();
        let seed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0);
        self.rng = Some(StdRng::seed_from_u64(seed));
    }

    fn choose_worker(&mut self, view: PolicyView<'_>, _ctx: AllocContext) -> Option<WorkerId> {
        if view.all_full() {
            return None;
        }
        let rng = self.rng.get_or_insert_with(|| StdRng::seed_from_u64(0));
        let n = view.num_workers();
        for _ in 0..n {
            let candidate = rng.gen_range(0..n);
            if view.free(candidate) > 0 {
                return Some(candidate);
            }
        }
        view.iter().find(|&(_, free)| free > 0).map(|(id, _)| id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn falls_back_to_linear_scan_when_one_worker_free() {
        let mut policy = RandPolicy::new();
        policy.init(&[4u64, 4, 4, 4]);
        let free = [0u64, 0, 0, 3];
        let view = PolicyView::new(&free);
        let ctx = AllocContext {
            file_id: 0,
            expected_blocks: 1,
        };
        for _ in 0..20 {
            assert_eq!(policy.choose_worker(view, ctx), Some(3));
        }
    }

    #[test]
    fn returns_none_when_all_full() {
        let mut policy = RandPolicy::new();
        policy.init(&[4u64, 4]);
        let free = [0u64, 0];
        let view = PolicyView::new(&free);
        let ctx = AllocContext {
            file_id: 0,
            expected_blocks: 1,
        };
        assert_eq!(policy.choose_worker(view, ctx), None);
    }
}
