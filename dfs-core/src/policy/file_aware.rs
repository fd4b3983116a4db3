//! `fileaware` allocation policy: delegate to `rand` for small
//! files and `leastloaded` for everything else.

use dfs_api::policy::{AllocContext, AllocationPolicy, PolicyView};
use dfs_api::types::WorkerId;

use super::{LeastLoadedPolicy, RandPolicy};

/// Below this many expected blocks, a file is "small" and gets `rand`
/// placement; at or above it, `leastloaded`. Defaults to 4, overridable at
/// construction time via [`FileAwarePolicy::with_threshold`] rather than a
/// Cargo feature, since every other tunable in this codebase is a
/// constructor argument or a compile-time constant.
pub const SMALL_FILE_THRESHOLD: u64 = 4;

/// Delegates to [`RandPolicy`] or [`LeastLoadedPolicy`] depending on the
/// requesting file's expected block count.
pub struct FileAwarePolicy {
    threshold: u64,
    small: RandPolicy,
    large: LeastLoadedPolicy,
}

impl FileAwarePolicy {
    /// Build a policy using the default small-file threshold.
    pub fn new() -> Self {
        Self::with_threshold(SMALL_FILE_THRESHOLD)
    }

    /// Build a policy using a custom small-file threshold.
    pub fn with_threshold(threshold: u64) -> Self {
        FileAwarePolicy {
            threshold,
            small: RandPolicy::new(),
            large: LeastLoadedPolicy::new(),
        }
    }
}

impl Default for FileAwarePolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl AllocationPolicy for FileAwarePolicy {
    fn name(&self) -> &'static str {
        "fileaware"
    }

    fn init(&mut self, capacities: &[u64]) {
        self.small.init(capacities);
        self.large.init(capacities);
    }

    fn choose_worker(&mut self, view: PolicyView<'_>, ctx: AllocContext) -> Option<WorkerId> {
        if ctx.expected_blocks < self.threshold {
            self.small.choose_worker(view, ctx)
        } else {
            self.large.choose_worker(view, ctx)
        }
    }
}
