use std::time::Instant;

use common::schemas::NodeDescriptor;

/// Registry entry: the persisted descriptor plus the monotonic clock
/// reading used by the sweep (wall-clock timestamps from nodes are only
/// trusted at upsert time).
#[derive(Clone, Debug)]
pub struct NodeRuntime {
    pub info: NodeDescriptor,
    pub last_seen: Instant,
}
