//! `weightedroundrobin` allocation policy: weight each worker by
//! `blocks_free / capacity`, picking the highest-weighted worker starting
//! the search one past the last chosen index.

use dfs_api::policy::{AllocContext, AllocationPolicy, PolicyView};
use dfs_api::types::WorkerId;

/// Weighted round-robin: the "weight" is each worker's *fraction* of
/// capacity still free, not its raw free-block count, so a small worker
/// that is mostly empty competes fairly against a large mostly-full one.
pub struct WeightedRoundRobinPolicy {
    capacities: Vec<u64>,
    last_chosen: Option<usize>,
}

impl WeightedRoundRobinPolicy {
    /// Build a fresh policy; [`AllocationPolicy::init`] fills in capacities.
    pub fn new() -> Self {
        WeightedRoundRobinPolicy {
            capacities: Vec::new(),
            last_chosen: None,
        }
    }

    fn weight(&self, view: &PolicyView<'_>, id: WorkerId) -> f64 {
        let cap = self.capacities[id];
        if cap == 0 {
            0.0
        } else {
            view.free(id) as f64 / cap as f64
        }
    }
}

impl Default for WeightedRoundRobinPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl AllocationPolicy for WeightedRoundRobinPolicy {
    fn name(&self) -> &'static str {
        "weightedroundrobin"
    }

    fn init(&mut self, capacities: &[u64]) {
        self.capacities = capacities.to_vec();
        self.last_chosen = None;
    }

    fn choose_worker(&mut self, view: PolicyView<'_>, _ctx: AllocContext) -> Option<WorkerId> {
        let n = view.num_workers();
        if n == 0 {
            return None;
        }
        let start = self.last_chosen.map(|i| (i + 1) % n).unwrap_or(0);
        let mut best: Option<(usize, f64)> = None;
        for offset in 0..n {
            let id = (start + offset) % n;
            let w = self.weight(&view, id);
            if w > 0.0 && best.map(|(_, bw)| w > bw).unwrap_or(true) {
                best = Some((id, w));
            }
        }
        let chosen = best.map(|(id, _)| id);
        if let Some(id) = chosen {
            self.last_chosen = Some(id);
        }
        chosen
    }
}
