use axum::{
    Router,
    routing::{get, post},
};
use axum_server::Server;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::info;

use common::constants::NODE_KEY_PREFIX;
use common::kvdb::KvDb;
use common::schemas::NodeDescriptor;
use common::url_utils::parse_socket_addr;

use crate::core::health::node_status_sweeper;
use crate::core::registry::NodeRegistry;
use crate::core::routes::{healthz, heartbeat, list_nodes};
use crate::core::state::NameServerState;

#[derive(Parser, Debug, Clone)]
pub struct ServeArgs {
    /// Index directory (node records live here)
    #[arg(long, default_value = "./data/index")]
    index: PathBuf,

    /// Address to listen on
    #[arg(long, default_value = "0.0.0.0:7700")]
    listen: String,

    /// Heartbeat interval (seconds); nodes silent for twice this become Suspect
    #[arg(long, default_value_t = 30)]
    heartbeat_interval_secs: u64,

    /// Silence threshold after which a node goes Offline (seconds)
    #[arg(long, default_value_t = 300)]
    offline_after_secs: u64,

    /// Timeout for active health probes (seconds)
    #[arg(long, default_value_t = 10)]
    probe_timeout_secs: u64,
}

pub async fn serve(serve_args: ServeArgs) -> anyhow::Result<()> {
    // Fail fast on misconfiguration before anything is spawned
    let socket_addr = parse_socket_addr(&serve_args.listen)?;

    let db = KvDb::open(&serve_args.index)?;

    let registry = Arc::new(NodeRegistry::new(
        Duration::from_secs(serve_args.heartbeat_interval_secs),
        Duration::from_secs(serve_args.offline_after_secs),
    ));

    let seeded = seed_registry_from_db(&db, &registry)?;
    if seeded > 0 {
        info!("restored {} node records from index", seeded);
    }

    let state = NameServerState {
        http_client: reqwest::Client::new(),
        db,
        registry,
        probe_timeout: Duration::from_secs(serve_args.probe_timeout_secs),
    };

    let (shutdown_tx, shutdown_rx) = watch::channel::<bool>(false);
    let sweeper_handle = tokio::spawn(node_status_sweeper(
        state.clone(),
        Duration::from_secs(serve_args.heartbeat_interval_secs),
        shutdown_rx,
    ));

    let app = Router::new()
        .route("/cluster/heartbeat", post(heartbeat))
        .route("/cluster/nodes", get(list_nodes))
        .route("/healthz", get(healthz))
        .with_state(state.clone());

    let server = Server::bind(socket_addr).serve(app.into_make_service());

    info!("listening on {}", serve_args.listen);

    tokio::select! {
        res = server => { res?; }
        _ = tokio::signal::ctrl_c() => {}
    }

    let _ = shutdown_tx.send(true);
    let _ = sweeper_handle.await;

    Ok(())
}

fn seed_registry_from_db(db: &KvDb, registry: &NodeRegistry) -> anyhow::Result<usize> {
    let mut seeded = 0usize;
    for kv in db.iter() {
        let (k, v) = kv?;
        if !k.starts_with(NODE_KEY_PREFIX.as_bytes()) {
            continue;
        }
        let info: NodeDescriptor = serde_json::from_slice(&v)?;
        registry.seed(info)?;
        seeded += 1;
    }
    Ok(seeded)
}
