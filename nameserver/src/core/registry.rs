use anyhow::anyhow;
use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use common::schemas::{NodeDescriptor, NodeReport, NodeStatus};
use common::time_utils::utc_now_ms;

use crate::core::node::NodeRuntime;

/// A node the sweep just demoted to Suspect, to be probed out-of-band.
#[derive(Clone, Debug)]
pub struct ProbeTarget {
    pub node_id: String,
    pub region_id: String,
    pub endpoint: String,
}

/// Result of one sweep pass: descriptors whose status changed (for
/// persistence by the caller) and the newly-Suspect probe candidates.
#[derive(Default)]
pub struct SweepOutcome {
    pub changed: Vec<NodeDescriptor>,
    pub probes: Vec<ProbeTarget>,
}

/// In-memory table of chunk-server descriptors, keyed by
/// (region_id, node_id). Owns the health state machine: all mutations go
/// through `upsert` and `sweep`, and every read hands out copies.
pub struct NodeRegistry {
    nodes: RwLock<HashMap<(String, String), NodeRuntime>>,
    heartbeat_interval: Duration,
    offline_after: Duration,
}

impl NodeRegistry {
    pub fn new(heartbeat_interval: Duration, offline_after: Duration) -> Self {
        Self {
            nodes: RwLock::new(HashMap::new()),
            heartbeat_interval,
            offline_after,
        }
    }

    pub fn heartbeat_interval(&self) -> Duration {
        self.heartbeat_interval
    }

    /// Insert or overwrite the entry for this report. A report whose
    /// timestamp is already older than one heartbeat interval enters as
    /// Suspect, not Healthy; revival from Offline goes through the same
    /// rule. Returns a copy of the stored descriptor.
    pub fn upsert(&self, report: &NodeReport) -> anyhow::Result<NodeDescriptor> {
        let now = Instant::now();
        let age_ms = (utc_now_ms() - report.reported_at_ms).max(0) as u64;

        let status = if age_ms >= self.heartbeat_interval.as_millis() as u64 {
            NodeStatus::Suspect
        } else {
            NodeStatus::Healthy
        };

        // last_seen carries the reported staleness so the sweep ages the
        // entry from the report time, not from arrival time
        let age = Duration::from_millis(age_ms).min(self.offline_after);
        let last_seen = now.checked_sub(age).unwrap_or(now);

        let info = NodeDescriptor {
            node_id: report.node_id.clone(),
            endpoint: report.endpoint.clone(),
            region_id: report.region_id.clone(),
            total_bytes: report.total_bytes,
            used_bytes: report.used_bytes,
            avail_bytes: report.avail_bytes,
            throughput_bps: report.throughput_bps,
            status,
            last_heartbeat_ms: report.reported_at_ms,
        };

        let mut nodes = self
            .nodes
            .write()
            .map_err(|e| anyhow!("failed to acquire nodes write lock: {}", e))?;

        nodes.insert(
            (report.region_id.clone(), report.node_id.clone()),
            NodeRuntime {
                info: info.clone(),
                last_seen,
            },
        );

        Ok(info)
    }

    /// Re-insert a descriptor loaded from the index at boot. Keeps the
    /// persisted status (an Offline node must not revive on restart) and
    /// ages the entry from its persisted heartbeat timestamp.
    pub fn seed(&self, info: NodeDescriptor) -> anyhow::Result<()> {
        let now = Instant::now();
        let age_ms = (utc_now_ms() - info.last_heartbeat_ms).max(0) as u64;
        let age = Duration::from_millis(age_ms).min(self.offline_after);
        let last_seen = now.checked_sub(age).unwrap_or(now);

        let mut nodes = self
            .nodes
            .write()
            .map_err(|e| anyhow!("failed to acquire nodes write lock: {}", e))?;

        nodes.insert(
            (info.region_id.clone(), info.node_id.clone()),
            NodeRuntime { info, last_seen },
        );

        Ok(())
    }

    pub fn lookup(&self, region_id: &str, node_id: &str) -> anyhow::Result<Option<NodeDescriptor>> {
        let nodes = self
            .nodes
            .read()
            .map_err(|e| anyhow!("failed to acquire nodes read lock: {}", e))?;

        Ok(nodes
            .get(&(region_id.to_string(), node_id.to_string()))
            .map(|n| n.info.clone()))
    }

    /// Point-in-time copies of every Healthy entry, sorted by node id so
    /// downstream placement is a pure function of the node set.
    pub fn healthy_snapshot(&self) -> anyhow::Result<Vec<NodeDescriptor>> {
        let nodes = self
            .nodes
            .read()
            .map_err(|e| anyhow!("failed to acquire nodes read lock: {}", e))?;

        let mut healthy = nodes
            .values()
            .filter(|n| n.info.status == NodeStatus::Healthy)
            .map(|n| n.info.clone())
            .collect::<Vec<_>>();
        healthy.sort_by(|a, b| a.node_id.cmp(&b.node_id));

        Ok(healthy)
    }

    pub fn all_nodes(&self) -> anyhow::Result<Vec<NodeDescriptor>> {
        let nodes = self
            .nodes
            .read()
            .map_err(|e| anyhow!("failed to acquire nodes read lock: {}", e))?;

        let mut all = nodes.values().map(|n| n.info.clone()).collect::<Vec<_>>();
        all.sort_by(|a, b| a.node_id.cmp(&b.node_id));

        Ok(all)
    }

    pub fn sweep(&self) -> anyhow::Result<SweepOutcome> {
        self.sweep_at(Instant::now())
    }

    /// One aging pass against a single timestamp. Entries only ever move
    /// down (Healthy -> Suspect -> Offline); revival is the business of
    /// `upsert`. Nodes demoted Healthy -> Suspect this pass come back as
    /// probe targets; the lock is never held across any probe call.
    pub fn sweep_at(&self, now: Instant) -> anyhow::Result<SweepOutcome> {
        let mut outcome = SweepOutcome::default();

        let mut nodes = self
            .nodes
            .write()
            .map_err(|e| anyhow!("failed to acquire nodes write lock: {}", e))?;

        for node in nodes.values_mut() {
            if node.info.status == NodeStatus::Offline {
                continue;
            }

            let elapsed = now.saturating_duration_since(node.last_seen);

            if elapsed >= self.offline_after {
                if node.info.status != NodeStatus::Offline {
                    node.info.status = NodeStatus::Offline;
                    outcome.changed.push(node.info.clone());
                }
            } else if elapsed >= self.heartbeat_interval * 2 {
                if node.info.status == NodeStatus::Healthy {
                    node.info.status = NodeStatus::Suspect;
                    outcome.changed.push(node.info.clone());
                    outcome.probes.push(ProbeTarget {
                        node_id: node.info.node_id.clone(),
                        region_id: node.info.region_id.clone(),
                        endpoint: node.info.endpoint.clone(),
                    });
                }
            }
        }

        Ok(outcome)
    }
}
