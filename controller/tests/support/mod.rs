#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use anyhow::anyhow;
use async_trait::async_trait;

use common::schemas::{
    BucketRecord, ChunkOutcome, ChunkPlacementReport, ChunkRef, NodeDescriptor, ObjectRecord,
    NodeStatus,
};
use common::time_utils::utc_now_ms;
use controller::clients::{
    BulkLister, ChunkAssigner, ChunkResolver, NodeDirectory, PlacementStore,
};

/// Initialize tracing for tests
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("debug")
        .with_test_writer()
        .try_init();
}

pub fn mk_node(node_id: &str) -> NodeDescriptor {
    NodeDescriptor {
        node_id: node_id.to_string(),
        endpoint: format!("http://{}", node_id),
        region_id: "eu1".to_string(),
        total_bytes: 1024 * 1024 * 1024,
        used_bytes: 0,
        avail_bytes: 1024 * 1024 * 1024,
        throughput_bps: 125_000_000,
        status: NodeStatus::Healthy,
        last_heartbeat_ms: utc_now_ms(),
    }
}

pub fn mk_object(bucket: &str, name: &str, cid: &str, size: u64) -> ObjectRecord {
    ObjectRecord {
        bucket: bucket.to_string(),
        name: name.to_string(),
        path: format!("/{}/{}", bucket, name),
        cid: cid.to_string(),
        size,
    }
}

pub fn mk_bucket(name: &str) -> BucketRecord {
    BucketRecord {
        name: name.to_string(),
        created_at_ms: utc_now_ms(),
    }
}

/// Healthy-node directory backed by a mutable list.
#[derive(Default)]
pub struct FakeDirectory {
    pub nodes: Mutex<Vec<NodeDescriptor>>,
    pub calls: Mutex<usize>,
}

impl FakeDirectory {
    pub fn new(nodes: Vec<NodeDescriptor>) -> Arc<Self> {
        Arc::new(Self {
            nodes: Mutex::new(nodes),
            calls: Mutex::new(0),
        })
    }

    pub fn call_count(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl NodeDirectory for FakeDirectory {
    async fn list_healthy(&self) -> anyhow::Result<Vec<NodeDescriptor>> {
        *self.calls.lock().unwrap() += 1;
        let mut nodes = self.nodes.lock().unwrap().clone();
        nodes.sort_by(|a, b| a.node_id.cmp(&b.node_id));
        Ok(nodes)
    }
}

/// Chunk-link resolver backed by a static child map.
#[derive(Default)]
pub struct FakeResolver {
    pub children: Mutex<HashMap<String, Vec<ChunkRef>>>,
    pub fail: Mutex<bool>,
    pub calls: Mutex<usize>,
}

impl FakeResolver {
    pub fn new(children: Vec<(&str, Vec<(&str, u64)>)>) -> Arc<Self> {
        Arc::new(Self {
            children: Mutex::new(
                children
                    .into_iter()
                    .map(|(cid, kids)| {
                        (
                            cid.to_string(),
                            kids.into_iter()
                                .map(|(c, s)| ChunkRef {
                                    cid: c.to_string(),
                                    size: s,
                                })
                                .collect(),
                        )
                    })
                    .collect(),
            ),
            fail: Mutex::new(false),
            calls: Mutex::new(0),
        })
    }

    pub fn call_count(&self) -> usize {
        *self.calls.lock().unwrap()
    }

    pub fn set_fail(&self, fail: bool) {
        *self.fail.lock().unwrap() = fail;
    }
}

#[async_trait]
impl ChunkResolver for FakeResolver {
    async fn resolve_children(&self, cid: &str) -> anyhow::Result<Vec<ChunkRef>> {
        *self.calls.lock().unwrap() += 1;
        if *self.fail.lock().unwrap() {
            return Err(anyhow!("Fault injection: resolve failed"));
        }
        Ok(self
            .children
            .lock()
            .unwrap()
            .get(cid)
            .cloned()
            .unwrap_or_default())
    }
}

/// Records every dispatched batch; endpoints in `fail_endpoints` fail at
/// the call level, cids in `fail_cids` come back with ok=false.
#[derive(Default)]
pub struct FakeAssigner {
    pub fail_endpoints: Mutex<HashSet<String>>,
    pub fail_cids: Mutex<HashSet<String>>,
    pub dispatched: Mutex<Vec<(String, Vec<String>)>>,
}

impl FakeAssigner {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn dispatched(&self) -> Vec<(String, Vec<String>)> {
        self.dispatched.lock().unwrap().clone()
    }

    pub fn fail_endpoint(&self, endpoint: &str) {
        self.fail_endpoints
            .lock()
            .unwrap()
            .insert(endpoint.to_string());
    }

    pub fn fail_cid(&self, cid: &str) {
        self.fail_cids.lock().unwrap().insert(cid.to_string());
    }
}

#[async_trait]
impl ChunkAssigner for FakeAssigner {
    async fn assign_chunks(
        &self,
        endpoint: &str,
        cids: &[String],
    ) -> anyhow::Result<Vec<ChunkOutcome>> {
        self.dispatched
            .lock()
            .unwrap()
            .push((endpoint.to_string(), cids.to_vec()));

        if self.fail_endpoints.lock().unwrap().contains(endpoint) {
            return Err(anyhow!("Fault injection: assign failed"));
        }

        let fail_cids = self.fail_cids.lock().unwrap();
        Ok(cids
            .iter()
            .map(|cid| ChunkOutcome {
                cid: cid.clone(),
                ok: !fail_cids.contains(cid),
            })
            .collect())
    }
}

/// Placement store backed by a plain map.
#[derive(Default)]
pub struct FakePlacementStore {
    pub reports: Mutex<HashMap<(String, String), ChunkPlacementReport>>,
    pub fail_put: Mutex<bool>,
}

impl FakePlacementStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn get(&self, bucket: &str, object: &str) -> Option<ChunkPlacementReport> {
        self.reports
            .lock()
            .unwrap()
            .get(&(bucket.to_string(), object.to_string()))
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.reports.lock().unwrap().len()
    }
}

#[async_trait]
impl PlacementStore for FakePlacementStore {
    async fn put_report(&self, report: &ChunkPlacementReport) -> anyhow::Result<()> {
        if *self.fail_put.lock().unwrap() {
            return Err(anyhow!("Fault injection: put_report failed"));
        }
        self.reports.lock().unwrap().insert(
            (report.bucket.clone(), report.object.clone()),
            report.clone(),
        );
        Ok(())
    }

    async fn get_report(
        &self,
        bucket: &str,
        object: &str,
    ) -> anyhow::Result<Option<ChunkPlacementReport>> {
        Ok(self.get(bucket, object))
    }

    async fn list_reports(&self) -> anyhow::Result<Vec<ChunkPlacementReport>> {
        Ok(self.reports.lock().unwrap().values().cloned().collect())
    }

    async fn delete_report(&self, bucket: &str, object: &str) -> anyhow::Result<()> {
        self.reports
            .lock()
            .unwrap()
            .remove(&(bucket.to_string(), object.to_string()));
        Ok(())
    }
}

/// Static initial-sync source.
#[derive(Default)]
pub struct StaticLister {
    pub buckets: Vec<BucketRecord>,
    pub objects: Vec<ObjectRecord>,
}

impl StaticLister {
    pub fn new(buckets: Vec<BucketRecord>, objects: Vec<ObjectRecord>) -> Arc<Self> {
        Arc::new(Self { buckets, objects })
    }
}

#[async_trait]
impl BulkLister for StaticLister {
    async fn list_buckets(&self) -> anyhow::Result<Vec<BucketRecord>> {
        Ok(self.buckets.clone())
    }

    async fn list_objects(&self) -> anyhow::Result<Vec<ObjectRecord>> {
        Ok(self.objects.clone())
    }
}

/// Poll an async condition until it holds or the deadline passes.
pub async fn wait_until<F, Fut>(timeout_ms: u64, mut check: F) -> anyhow::Result<()>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = anyhow::Result<bool>>,
{
    let deadline = std::time::Instant::now() + std::time::Duration::from_millis(timeout_ms);
    loop {
        if check().await? {
            return Ok(());
        }
        if std::time::Instant::now() >= deadline {
            anyhow::bail!("condition not met within {}ms", timeout_ms);
        }
        tokio::time::sleep(std::time::Duration::from_millis(25)).await;
    }
}
