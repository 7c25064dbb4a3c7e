use anyhow::anyhow;
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

use common::constants::{PLACEMENT_KEY_PREFIX, placement_key_for};
use common::kvdb::KvDb;
use common::schemas::{
    AssignChunksRequest, AssignChunksResponse, BucketRecord, ChunkOutcome, ChunkPlacementReport,
    ChunkRef, NodeDescriptor, ObjectRecord, ResolveChildrenResponse,
};

/// Healthy-node snapshot source (the name server, in production).
#[async_trait]
pub trait NodeDirectory: Send + Sync {
    async fn list_healthy(&self) -> anyhow::Result<Vec<NodeDescriptor>>;
}

/// Storage-engine view of a chunk's child links.
#[async_trait]
pub trait ChunkResolver: Send + Sync {
    async fn resolve_children(&self, cid: &str) -> anyhow::Result<Vec<ChunkRef>>;
}

/// Batched chunk-assignment dispatch to one chunk server.
#[async_trait]
pub trait ChunkAssigner: Send + Sync {
    async fn assign_chunks(
        &self,
        endpoint: &str,
        cids: &[String],
    ) -> anyhow::Result<Vec<ChunkOutcome>>;
}

/// Metadata-store capability for placement reports.
#[async_trait]
pub trait PlacementStore: Send + Sync {
    async fn put_report(&self, report: &ChunkPlacementReport) -> anyhow::Result<()>;
    async fn get_report(
        &self,
        bucket: &str,
        object: &str,
    ) -> anyhow::Result<Option<ChunkPlacementReport>>;
    async fn list_reports(&self) -> anyhow::Result<Vec<ChunkPlacementReport>>;
    async fn delete_report(&self, bucket: &str, object: &str) -> anyhow::Result<()>;
}

/// Initial-sync source for the informers.
#[async_trait]
pub trait BulkLister: Send + Sync {
    async fn list_buckets(&self) -> anyhow::Result<Vec<BucketRecord>>;
    async fn list_objects(&self) -> anyhow::Result<Vec<ObjectRecord>>;
}

#[derive(Clone)]
pub struct HttpNodeDirectory {
    client: Client,
    nameserver_url: String,
    timeout: Duration,
}

impl HttpNodeDirectory {
    pub fn new(client: Client, nameserver_url: String, timeout: Duration) -> Self {
        Self {
            client,
            nameserver_url,
            timeout,
        }
    }
}

#[async_trait]
impl NodeDirectory for HttpNodeDirectory {
    async fn list_healthy(&self) -> anyhow::Result<Vec<NodeDescriptor>> {
        let url = format!("{}/cluster/nodes?status=healthy", self.nameserver_url);

        let resp = self
            .client
            .get(&url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| anyhow!("failed to reach name server: {}", e))?;

        if !resp.status().is_success() {
            return Err(anyhow!("name server replied: {}", resp.status()));
        }

        Ok(resp.json::<Vec<NodeDescriptor>>().await?)
    }
}

#[derive(Clone)]
pub struct HttpChunkResolver {
    client: Client,
    storage_url: String,
    timeout: Duration,
}

impl HttpChunkResolver {
    pub fn new(client: Client, storage_url: String, timeout: Duration) -> Self {
        Self {
            client,
            storage_url,
            timeout,
        }
    }
}

#[async_trait]
impl ChunkResolver for HttpChunkResolver {
    async fn resolve_children(&self, cid: &str) -> anyhow::Result<Vec<ChunkRef>> {
        let url = format!("{}/chunks/{}/children", self.storage_url, cid);

        let resp = self
            .client
            .get(&url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| anyhow!("failed to reach storage engine: {}", e))?;

        if !resp.status().is_success() {
            return Err(anyhow!("storage engine replied: {}", resp.status()));
        }

        Ok(resp.json::<ResolveChildrenResponse>().await?.children)
    }
}

#[derive(Clone)]
pub struct HttpChunkAssigner {
    client: Client,
    timeout: Duration,
}

impl HttpChunkAssigner {
    pub fn new(client: Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }
}

#[async_trait]
impl ChunkAssigner for HttpChunkAssigner {
    async fn assign_chunks(
        &self,
        endpoint: &str,
        cids: &[String],
    ) -> anyhow::Result<Vec<ChunkOutcome>> {
        let url = format!("{}/internal/assign", endpoint);

        let resp = self
            .client
            .post(&url)
            .timeout(self.timeout)
            .json(&AssignChunksRequest {
                cids: cids.to_vec(),
            })
            .send()
            .await
            .map_err(|e| anyhow!("failed to reach chunk server: {}", e))?;

        if !resp.status().is_success() {
            return Err(anyhow!("chunk server replied: {}", resp.status()));
        }

        Ok(resp.json::<AssignChunksResponse>().await?.results)
    }
}

#[derive(Clone)]
pub struct HttpBulkLister {
    client: Client,
    metadata_url: String,
    timeout: Duration,
}

impl HttpBulkLister {
    pub fn new(client: Client, metadata_url: String, timeout: Duration) -> Self {
        Self {
            client,
            metadata_url,
            timeout,
        }
    }

    async fn fetch<T: serde::de::DeserializeOwned>(&self, path: &str) -> anyhow::Result<T> {
        let url = format!("{}{}", self.metadata_url, path);

        let resp = self
            .client
            .get(&url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| anyhow!("failed to reach metadata store: {}", e))?;

        if !resp.status().is_success() {
            return Err(anyhow!("metadata store replied: {}", resp.status()));
        }

        Ok(resp.json::<T>().await?)
    }
}

#[async_trait]
impl BulkLister for HttpBulkLister {
    async fn list_buckets(&self) -> anyhow::Result<Vec<BucketRecord>> {
        self.fetch("/meta/buckets").await
    }

    async fn list_objects(&self) -> anyhow::Result<Vec<ObjectRecord>> {
        self.fetch("/meta/objects").await
    }
}

/// Placement reports persisted in the local index, one record per
/// (bucket, object).
#[derive(Clone)]
pub struct KvPlacementStore {
    db: KvDb,
}

impl KvPlacementStore {
    pub fn new(db: KvDb) -> Self {
        Self { db }
    }
}

#[async_trait]
impl PlacementStore for KvPlacementStore {
    async fn put_report(&self, report: &ChunkPlacementReport) -> anyhow::Result<()> {
        self.db
            .put(&placement_key_for(&report.bucket, &report.object), report)
    }

    async fn get_report(
        &self,
        bucket: &str,
        object: &str,
    ) -> anyhow::Result<Option<ChunkPlacementReport>> {
        self.db.get(&placement_key_for(bucket, object))
    }

    async fn list_reports(&self) -> anyhow::Result<Vec<ChunkPlacementReport>> {
        self.db
            .scan_prefix(&format!("{}:", PLACEMENT_KEY_PREFIX))
    }

    async fn delete_report(&self, bucket: &str, object: &str) -> anyhow::Result<()> {
        self.db.delete(&placement_key_for(bucket, object))
    }
}
