use axum::{
    Router,
    routing::{get, post},
};
use axum_server::Server;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use common::kvdb::KvDb;
use common::url_utils::{parse_socket_addr, sanitize_url};

use crate::clients::{
    HttpBulkLister, HttpChunkAssigner, HttpChunkResolver, HttpNodeDirectory, KvPlacementStore,
};
use crate::event::EventBus;
use crate::informer::{EntityKind, Informer, WorkItem};
use crate::queue::{ItemBackoff, WorkQueue};
use crate::reconcile::Reconciler;
use crate::routes::{ControllerState, healthz, list_placements, publish_event};

#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Index directory (placement reports live here)
    #[arg(long, default_value = "./data/index")]
    index: PathBuf,

    /// Address to listen on
    #[arg(long, default_value = "0.0.0.0:7800")]
    listen: String,

    /// Name server base URL (healthy-node snapshots)
    #[arg(long)]
    nameserver_url: String,

    /// Storage engine base URL (chunk child lookups)
    #[arg(long)]
    storage_url: String,

    /// Metadata service base URL (initial bucket/object listing)
    #[arg(long)]
    metadata_url: String,

    /// Number of reconcile workers
    #[arg(long, default_value_t = 4)]
    workers: usize,

    /// Debounce before a creation event becomes work (milliseconds)
    #[arg(long, default_value_t = 500)]
    debounce_ms: u64,

    /// Per-call timeout against collaborators (seconds)
    #[arg(long, default_value_t = 10)]
    rpc_timeout_secs: u64,
}

pub async fn run(run_args: RunArgs) -> anyhow::Result<()> {
    // Fail fast on misconfiguration before anything is spawned
    let socket_addr = parse_socket_addr(&run_args.listen)?;
    let nameserver_url = sanitize_url(&run_args.nameserver_url)?;
    let storage_url = sanitize_url(&run_args.storage_url)?;
    let metadata_url = sanitize_url(&run_args.metadata_url)?;

    let db = KvDb::open(&run_args.index)?;
    let http_client = reqwest::Client::new();
    let rpc_timeout = Duration::from_secs(run_args.rpc_timeout_secs);

    let bus = Arc::new(EventBus::new());
    let queue: WorkQueue<WorkItem> = WorkQueue::new();

    let lister = Arc::new(HttpBulkLister::new(
        http_client.clone(),
        metadata_url,
        rpc_timeout,
    ));
    let reports = Arc::new(KvPlacementStore::new(db));

    let debounce = Duration::from_millis(run_args.debounce_ms);
    let bucket_informer = Informer::new(
        EntityKind::Bucket,
        bus.clone(),
        queue.clone(),
        lister.clone(),
        debounce,
    );
    let object_informer = Informer::new(
        EntityKind::Object,
        bus.clone(),
        queue.clone(),
        lister,
        debounce,
    );

    bucket_informer.start().await?;
    object_informer.start().await?;

    let reconciler = Arc::new(Reconciler {
        objects: object_informer.cache(),
        nodes: Arc::new(HttpNodeDirectory::new(
            http_client.clone(),
            nameserver_url,
            rpc_timeout,
        )),
        resolver: Arc::new(HttpChunkResolver::new(
            http_client.clone(),
            storage_url,
            rpc_timeout,
        )),
        assigner: Arc::new(HttpChunkAssigner::new(http_client, rpc_timeout)),
        reports: reports.clone(),
    });

    let backoff = Arc::new(ItemBackoff::default());
    let mut workers = Vec::with_capacity(run_args.workers);
    for worker_id in 0..run_args.workers {
        workers.push(tokio::spawn(reconciler.clone().run_worker(
            worker_id,
            queue.clone(),
            backoff.clone(),
        )));
    }

    let state = ControllerState {
        bus: bus.clone(),
        reports,
    };

    let app = Router::new()
        .route("/events/{kind}", post(publish_event))
        .route("/placements", get(list_placements))
        .route("/healthz", get(healthz))
        .with_state(state);

    let server = Server::bind(socket_addr).serve(app.into_make_service());

    info!("listening on {}", run_args.listen);

    tokio::select! {
        res = server => { res?; }
        _ = tokio::signal::ctrl_c() => {}
    }

    // Drain: stop feeding the queue, then unblock and join the workers
    bucket_informer.stop();
    object_informer.stop();
    queue.shut_down();
    for worker in workers {
        let _ = worker.await;
    }

    Ok(())
}
