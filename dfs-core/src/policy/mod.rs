//! The six mandatory allocation policies, one file per policy.

mod file_aware;
mod least_loaded;
mod rand;
mod round_robin;
mod sequential;
mod weighted_round_robin;

pub use file_aware::FileAwarePolicy;
pub use least_loaded::LeastLoadedPolicy;
pub use rand::RandPolicy;
pub use round_robin::RoundRobinPolicy;
pub use sequential::SequentialPolicy;
pub use weighted_round_robin::WeightedRoundRobinPolicy;

use dfs_api::policy::AllocationPolicy;

/// Construct the named policy, or `None` if the name is not one of the
/// mandatory set (`rand`, `roundrobin`, `sequential`, `leastloaded`,
/// `weightedroundrobin`, `fileaware`).
pub fn by_name(name: &str) -> Option<Box<dyn AllocationPolicy>> {
    match name {
        "rand" => Some(Box::new(RandPolicy::new())),
        "roundrobin" => Some(Box::new(RoundRobinPolicy::new())),
        "sequential" => Some(Box::new(SequentialPolicy::new())),
        "leastloaded" => Some(Box::new(LeastLoadedPolicy::new())),
        "weightedroundrobin" => Some(Box::new(WeightedRoundRobinPolicy::new())),
        "fileaware" => Some(Box::new(FileAwarePolicy::new())),
        _ => None,
    }
}
