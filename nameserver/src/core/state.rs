use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;

use common::kvdb::KvDb;

use crate::core::registry::NodeRegistry;

#[derive(Clone)]
pub struct NameServerState {
    pub http_client: Client,
    pub db: KvDb,
    pub registry: Arc<NodeRegistry>,
    pub probe_timeout: Duration,
}
