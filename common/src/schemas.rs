use serde::{Deserialize, Serialize};

/// Health lifecycle of a chunk server, driven by heartbeat recency and
/// active probing. Suspect and Offline are entered by the sweep; only a
/// fresh heartbeat or a successful probe moves a node back up.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum NodeStatus {
    Healthy,
    Suspect,
    Offline,
}

/// Registry-owned view of a chunk server. Callers always receive copies;
/// the registry is the only writer.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct NodeDescriptor {
    pub node_id: String, // <role>-<region>#<group>-<localId>
    pub endpoint: String,
    pub region_id: String,
    pub total_bytes: u64,
    pub used_bytes: u64,
    pub avail_bytes: u64,
    pub throughput_bps: u64,
    pub status: NodeStatus,
    pub last_heartbeat_ms: i128, // wall-clock (UTC ms) as reported by the node
}

/// What a chunk server reports about itself, both in heartbeats and in
/// probe replies. Status is decided by the registry, never by the node.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodeReport {
    pub node_id: String,
    pub endpoint: String,
    pub region_id: String,
    pub total_bytes: u64,
    pub used_bytes: u64,
    pub avail_bytes: u64,
    pub throughput_bps: u64,
    pub reported_at_ms: i128,
}

/// A content address plus the declared size of the chunk behind it.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChunkRef {
    pub cid: String,
    pub size: u64,
}

#[derive(Serialize, Deserialize)]
pub struct ResolveChildrenResponse {
    pub children: Vec<ChunkRef>,
}

#[derive(Serialize, Deserialize)]
pub struct AssignChunksRequest {
    pub cids: Vec<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChunkOutcome {
    pub cid: String,
    pub ok: bool,
}

#[derive(Serialize, Deserialize)]
pub struct AssignChunksResponse {
    pub results: Vec<ChunkOutcome>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct BucketRecord {
    pub name: String,
    pub created_at_ms: i128,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ObjectRecord {
    pub bucket: String,
    pub name: String,
    pub path: String,
    pub cid: String, // root content address; empty means malformed upstream metadata
    pub size: u64,
}

/// Resolved chunk tree of one object. Immutable once built; an empty
/// child list marks a leaf.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChunkNode {
    pub cid: String,
    pub size: u64,
    pub children: Vec<ChunkNode>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlacementAssignment {
    pub cid: String,
    pub node_id: String,
    pub ok: bool,
}

/// Final record of one reconciliation run over an object: which leaf went
/// where, and whether every dispatch landed.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChunkPlacementReport {
    pub bucket: String,
    pub object: String,
    pub path: String,
    pub root_cid: String,
    pub tree: ChunkNode,
    pub assignments: Vec<PlacementAssignment>,
    pub success: bool,
    pub revision: String,
    pub updated_at_ms: i128,
}

impl ChunkPlacementReport {
    pub fn overall_success(assignments: &[PlacementAssignment]) -> bool {
        assignments.iter().all(|a| a.ok)
    }
}
