use common::schemas::NodeDescriptor;

/// One node's share of an object's leaf chunks.
#[derive(Clone, Debug)]
pub struct ChunkBatch {
    pub node: NodeDescriptor,
    pub cids: Vec<String>,
}

/// Round-robin partition: chunk i goes to node i mod K. Load-balancing
/// and content-blind; a pure function of the chunk order and the node
/// order, so callers must pass the id-sorted healthy snapshot to keep
/// re-runs identical. Nodes that end up with no chunks are dropped
/// (no empty dispatch calls).
pub fn partition_round_robin(cids: &[String], nodes: &[NodeDescriptor]) -> Vec<ChunkBatch> {
    if nodes.is_empty() {
        return Vec::new();
    }

    let mut batches = nodes
        .iter()
        .map(|n| ChunkBatch {
            node: n.clone(),
            cids: Vec::new(),
        })
        .collect::<Vec<_>>();

    for (i, cid) in cids.iter().enumerate() {
        batches[i % nodes.len()].cids.push(cid.clone());
    }

    batches.retain(|b| !b.cids.is_empty());
    batches
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::schemas::NodeStatus;

    fn node(node_id: &str) -> NodeDescriptor {
        NodeDescriptor {
            node_id: node_id.to_string(),
            endpoint: format!("http://{}", node_id),
            region_id: "eu1".to_string(),
            total_bytes: 0,
            used_bytes: 0,
            avail_bytes: 0,
            throughput_bps: 0,
            status: NodeStatus::Healthy,
            last_heartbeat_ms: 0,
        }
    }

    fn cids(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("c{}", i)).collect()
    }

    #[test]
    fn test_round_robin_by_index_modulo() {
        let nodes = vec![node("n0"), node("n1"), node("n2")];
        let batches = partition_round_robin(&cids(7), &nodes);

        assert_eq!(batches.len(), 3);
        assert_eq!(batches[0].cids, vec!["c0", "c3", "c6"]);
        assert_eq!(batches[1].cids, vec!["c1", "c4"]);
        assert_eq!(batches[2].cids, vec!["c2", "c5"]);
    }

    #[test]
    fn test_partition_is_deterministic() {
        let nodes = vec![node("n0"), node("n1")];
        let chunks = cids(9);

        let a = partition_round_robin(&chunks, &nodes);
        let b = partition_round_robin(&chunks, &nodes);

        for (x, y) in a.iter().zip(b.iter()) {
            assert_eq!(x.node.node_id, y.node.node_id);
            assert_eq!(x.cids, y.cids);
        }
    }

    #[test]
    fn test_single_node_takes_everything() {
        let nodes = vec![node("n0")];
        let batches = partition_round_robin(&cids(5), &nodes);

        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].cids.len(), 5);
    }

    #[test]
    fn test_no_nodes_yields_no_batches() {
        assert!(partition_round_robin(&cids(3), &[]).is_empty());
    }

    #[test]
    fn test_surplus_nodes_are_dropped() {
        // 2 chunks over 4 nodes: only the first two nodes get work
        let nodes = vec![node("n0"), node("n1"), node("n2"), node("n3")];
        let batches = partition_round_robin(&cids(2), &nodes);

        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].cids, vec!["c0"]);
        assert_eq!(batches[1].cids, vec!["c1"]);
    }
}
