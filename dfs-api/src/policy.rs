//! The allocation policy seam: the coordinator asks a policy
//! which worker should host the next block of a file, handing it a read-only
//! view of each worker's remaining free-block count plus context about the
//! file being extended. Implementations live in `dfs-core`; this crate only
//! defines the trait boundary the coordinator programs against.

use crate::types::{FileId, WorkerId};

/// Read-only view of worker state a policy needs to pick an allocation
/// target. Borrowed from the coordinator for the duration of one
/// `choose_worker` call; a policy must not assume this outlives the call.
#[derive(Debug, Clone, Copy)]
pub struct PolicyView<'a> {
    /// `blocks_free[w]` is the number of blocks worker `w` currently has
    /// free, indexed by [`WorkerId`].
    blocks_free: &'a [u64],
}

impl<'a> PolicyView<'a> {
    /// Build a view over a coordinator's per-worker free-block counts.
    pub fn new(blocks_free: &'a [u64]) -> Self {
        PolicyView { blocks_free }
    }

    /// Number of workers known to the coordinator.
    pub fn num_workers(&self) -> usize {
        self.blocks_free.len()
    }

    /// Free-block count for worker `id`.
    ///
    /// # Panics
    /// Panics if `id` is out of range; the coordinator never calls a policy
    /// with a `WorkerId` it did not itself hand out.
    pub fn free(&self, id: WorkerId) -> u64 {
        self.blocks_free[id]
    }

    /// Iterate `(WorkerId, free_count)` pairs in worker-id order.
    pub fn iter(&self) -> impl Iterator<Item = (WorkerId, u64)> + '_ {
        self.blocks_free.iter().copied().enumerate()
    }

    /// `true` if no worker has a free block.
    pub fn all_full(&self) -> bool {
        self.blocks_free.iter().all(|&f| f == 0)
    }
}

/// Context describing the specific allocation a policy is being asked to
/// make, beyond the global free-block view. Passed per call rather than
/// captured once, since the coordinator calls the same policy instance from
/// many different files' contexts.
#[derive(Debug, Clone, Copy)]
pub struct AllocContext {
    /// The file being extended.
    pub file_id: FileId,
    /// The requesting file's expected block count (its logical length `L`
    /// in blocks at the time of the call), what `fileaware` tests against
    /// its small-file threshold.
    pub expected_blocks: u64,
}

/// A pluggable block-placement strategy. The coordinator owns
/// exactly one boxed `AllocationPolicy`, selected at startup, and consults it
/// for every block allocation; the policy never touches the bitmap or
/// worker storage directly; it only names a [`WorkerId`].
pub trait AllocationPolicy: Send {
    /// Short, stable name used in logs and `INIT`-time configuration
    /// (`"rand"`, `"roundrobin"`, `"sequential"`, `"leastloaded"`,
    /// `"weightedroundrobin"`, `"fileaware"`).
    fn name(&self) -> &'static str;

    /// Called once at coordinator startup with each worker's total capacity
    /// in blocks (`capacities.len()` is `N`), so stateful policies
    /// (round-robin's cursor, weighted round-robin's per-worker weights)
    /// can size their internal state against the real, possibly-uneven
    /// per-worker capacities the coordinator computed.
    fn init(&mut self, capacities: &[u64]);

    /// Pick the worker that should receive the next block, given the
    /// current free-block view and allocation context.
    ///
    /// Returns `None` only when `view.all_full()`; a policy must not invent
    /// a worker id when every worker is full. Callers check for global
    /// space exhaustion (the bitmap) before calling, so this is reached only
    /// when the bitmap has a free block yet every worker-local view would
    /// say otherwise; callers still treat `None` as `Status::NoSpace`.
    fn choose_worker(&mut self, view: PolicyView<'_>, ctx: AllocContext) -> Option<WorkerId>;
}
