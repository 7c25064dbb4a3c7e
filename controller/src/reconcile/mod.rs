pub mod chunk;
pub mod placement;

use futures_util::future::join_all;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use common::schemas::{ChunkPlacementReport, ChunkRef, ObjectRecord, PlacementAssignment};
use common::time_utils::utc_now_ms;

use crate::clients::{ChunkAssigner, ChunkResolver, NodeDirectory, PlacementStore};
use crate::event::Entity;
use crate::informer::{EntityCache, EntityKind, WorkItem};
use crate::queue::{ItemBackoff, WorkQueue};
use self::chunk::{flatten_leaves, resolve_tree};
use self::placement::partition_round_robin;

/// Transient reconcile failures: the item goes back on the queue with
/// per-item backoff. Permanent conditions (malformed input, cyclic
/// trees) never surface here; they are logged and swallowed so the item
/// is not retried.
#[derive(thiserror::Error, Debug)]
pub enum ReconcileError {
    #[error("no healthy nodes available")]
    NoHealthyNodes,
    #[error(transparent)]
    Transient(anyhow::Error),
}

/// Turns work items into chunk placements. Holds no mutable state of its
/// own: the queue serializes per-item work, the cache is read-only here,
/// and every collaborator sits behind a capability seam.
pub struct Reconciler {
    pub objects: EntityCache,
    pub nodes: Arc<dyn NodeDirectory>,
    pub resolver: Arc<dyn ChunkResolver>,
    pub assigner: Arc<dyn ChunkAssigner>,
    pub reports: Arc<dyn PlacementStore>,
}

impl Reconciler {
    /// One worker's loop: pull, process, account, acknowledge. Multiple
    /// workers run this concurrently against the shared queue; the queue
    /// itself provides the per-item mutual exclusion.
    pub async fn run_worker(
        self: Arc<Self>,
        worker_id: usize,
        queue: WorkQueue<WorkItem>,
        backoff: Arc<ItemBackoff<WorkItem>>,
    ) {
        while let Some(item) = queue.get().await {
            match self.process(&item).await {
                Ok(()) => backoff.forget(&item),
                Err(e) => {
                    let delay = backoff.delay(&item);
                    warn!(
                        kind = %item.kind,
                        namespace = %item.namespace,
                        name = %item.name,
                        "reconcile failed ({}), retrying in {:?}",
                        e,
                        delay
                    );
                    queue.add_after(item.clone(), delay);
                }
            }
            // done() regardless of outcome; retries re-enter through add_after
            queue.done(&item);
        }

        info!(worker_id, "reconcile worker stopped");
    }

    pub async fn process(&self, item: &WorkItem) -> Result<(), ReconcileError> {
        match item.kind {
            EntityKind::Bucket => {
                // cache bookkeeping happened in the informer; nothing to place
                debug!(namespace = %item.namespace, name = %item.name, "bucket acknowledged");
                Ok(())
            }
            EntityKind::Object => match self.objects.get(&item.namespace, &item.name) {
                Some(Entity::Object(record)) => self.place_object(&record).await,
                Some(_) => {
                    error!(name = %item.name, "object item resolved to a non-object entity");
                    Ok(())
                }
                None => self.retire_object(item).await,
            },
        }
    }

    /// The entity is gone from the cache: the object was deleted (or a
    /// delete raced past an add). Retire its stored placement report.
    async fn retire_object(&self, item: &WorkItem) -> Result<(), ReconcileError> {
        if let Err(e) = self
            .reports
            .delete_report(&item.namespace, &item.name)
            .await
        {
            // eventual consistency: the next delete event re-drives this
            warn!(
                bucket = %item.namespace,
                object = %item.name,
                "failed to retire placement report: {}",
                e
            );
        }
        Ok(())
    }

    async fn place_object(&self, record: &ObjectRecord) -> Result<(), ReconcileError> {
        if record.cid.is_empty() {
            warn!(
                bucket = %record.bucket,
                object = %record.name,
                "object carries no root content address; not retrying"
            );
            return Ok(());
        }

        let root = ChunkRef {
            cid: record.cid.clone(),
            size: record.size,
        };

        let tree = match resolve_tree(self.resolver.as_ref(), root).await {
            Ok(tree) => tree,
            Err(e) if e.is_permanent() => {
                error!(
                    bucket = %record.bucket,
                    object = %record.name,
                    "unresolvable chunk tree: {}; not retrying",
                    e
                );
                return Ok(());
            }
            Err(e) => return Err(ReconcileError::Transient(e.into())),
        };

        let leaves = flatten_leaves(&tree);

        let nodes = self
            .nodes
            .list_healthy()
            .await
            .map_err(ReconcileError::Transient)?;
        if nodes.is_empty() {
            return Err(ReconcileError::NoHealthyNodes);
        }

        let cids = leaves.iter().map(|l| l.cid.clone()).collect::<Vec<_>>();
        let batches = partition_round_robin(&cids, &nodes);

        // one batched call per node; a call-level failure fails the whole batch
        let results = join_all(batches.iter().map(|batch| async move {
            match self
                .assigner
                .assign_chunks(&batch.node.endpoint, &batch.cids)
                .await
            {
                Ok(outcomes) => outcomes
                    .into_iter()
                    .map(|o| PlacementAssignment {
                        cid: o.cid,
                        node_id: batch.node.node_id.clone(),
                        ok: o.ok,
                    })
                    .collect::<Vec<_>>(),
                Err(e) => {
                    warn!(node_id = %batch.node.node_id, "assign dispatch failed: {}", e);
                    batch
                        .cids
                        .iter()
                        .map(|cid| PlacementAssignment {
                            cid: cid.clone(),
                            node_id: batch.node.node_id.clone(),
                            ok: false,
                        })
                        .collect()
                }
            }
        }))
        .await;

        let assignments = results.into_iter().flatten().collect::<Vec<_>>();
        let success = ChunkPlacementReport::overall_success(&assignments);

        let report = ChunkPlacementReport {
            bucket: record.bucket.clone(),
            object: record.name.clone(),
            path: record.path.clone(),
            root_cid: record.cid.clone(),
            tree,
            assignments,
            success,
            revision: Uuid::new_v4().to_string(),
            updated_at_ms: utc_now_ms(),
        };

        // fire-and-forget: a lost report is repaired by the next update event
        if let Err(e) = self.reports.put_report(&report).await {
            warn!(
                bucket = %record.bucket,
                object = %record.name,
                "failed to persist placement report: {}",
                e
            );
        }

        if success {
            info!(
                bucket = %record.bucket,
                object = %record.name,
                chunks = report.assignments.len(),
                "object placed"
            );
        } else {
            warn!(
                bucket = %record.bucket,
                object = %record.name,
                "placement recorded with failures"
            );
        }

        Ok(())
    }
}
