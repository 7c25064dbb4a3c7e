use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;

use common::schemas::{ChunkNode, ChunkRef};

use crate::clients::ChunkResolver;

/// Chunks below this size are leaves and are never decomposed further.
pub const LEAF_SIZE_THRESHOLD: u64 = 45_623_854;

/// Upper bound on tree depth. Externally-supplied trees are not trusted
/// to terminate; past this the resolve fails closed.
pub const MAX_RESOLVE_DEPTH: usize = 64;

#[derive(thiserror::Error, Debug)]
pub enum ResolveError {
    /// Malformed tree; retrying cannot succeed.
    #[error("cycle in chunk tree at {0}")]
    Cycle(String),
    /// Malformed or pathological tree; retrying cannot succeed.
    #[error("chunk tree exceeds max depth at {0}")]
    TooDeep(String),
    /// Storage-engine lookup failure; worth retrying.
    #[error(transparent)]
    Remote(#[from] anyhow::Error),
}

impl ResolveError {
    pub fn is_permanent(&self) -> bool {
        matches!(self, ResolveError::Cycle(_) | ResolveError::TooDeep(_))
    }
}

/// Resolve the full chunk tree under `root`, recursing through the
/// storage engine until every branch bottoms out at a leaf. A repeated
/// CID (cycle) or a branch deeper than `MAX_RESOLVE_DEPTH` aborts the
/// whole resolve.
pub async fn resolve_tree(
    resolver: &dyn ChunkResolver,
    root: ChunkRef,
) -> Result<ChunkNode, ResolveError> {
    let mut visited = HashSet::new();
    resolve_node(resolver, root, 0, &mut visited).await
}

fn resolve_node<'a>(
    resolver: &'a dyn ChunkResolver,
    chunk: ChunkRef,
    depth: usize,
    visited: &'a mut HashSet<String>,
) -> Pin<Box<dyn Future<Output = Result<ChunkNode, ResolveError>> + Send + 'a>> {
    Box::pin(async move {
        if depth >= MAX_RESOLVE_DEPTH {
            return Err(ResolveError::TooDeep(chunk.cid));
        }
        if !visited.insert(chunk.cid.clone()) {
            return Err(ResolveError::Cycle(chunk.cid));
        }

        if chunk.size < LEAF_SIZE_THRESHOLD {
            return Ok(ChunkNode {
                cid: chunk.cid,
                size: chunk.size,
                children: Vec::new(),
            });
        }

        let children = resolver.resolve_children(&chunk.cid).await?;
        let mut nodes = Vec::with_capacity(children.len());
        for child in children {
            nodes.push(resolve_node(resolver, child, depth + 1, visited).await?);
        }

        Ok(ChunkNode {
            cid: chunk.cid,
            size: chunk.size,
            children: nodes,
        })
    })
}

/// Leaf CIDs of a resolved tree in depth-first order. The order is part
/// of the placement contract: the round-robin partition indexes into it.
pub fn flatten_leaves(node: &ChunkNode) -> Vec<ChunkRef> {
    let mut leaves = Vec::new();
    collect_leaves(node, &mut leaves);
    leaves
}

fn collect_leaves(node: &ChunkNode, leaves: &mut Vec<ChunkRef>) {
    if node.children.is_empty() {
        leaves.push(ChunkRef {
            cid: node.cid.clone(),
            size: node.size,
        });
        return;
    }
    for child in &node.children {
        collect_leaves(child, leaves);
    }
}
