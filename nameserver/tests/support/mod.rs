#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use axum::{Router, extract::State, response::Json, routing::get};
use axum_server::Server;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use common::api_error::ApiError;
use common::schemas::NodeReport;
use common::time_utils::utc_now_ms;

/// Initialize tracing for tests
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("debug")
        .with_test_writer()
        .try_init();
}

/// Build a report whose timestamp is `age_ms` in the past.
pub fn mk_report(node_id: &str, region_id: &str, endpoint: &str, age_ms: i128) -> NodeReport {
    NodeReport {
        node_id: node_id.to_string(),
        endpoint: endpoint.to_string(),
        region_id: region_id.to_string(),
        total_bytes: 1024 * 1024 * 1024,
        used_bytes: 0,
        avail_bytes: 1024 * 1024 * 1024,
        throughput_bps: 125_000_000,
        reported_at_ms: utc_now_ms() - age_ms,
    }
}

/// Behavior control for the fake chunk server
#[derive(Debug, Clone, Default)]
pub struct ChunkServerOptions {
    pub fail_health: bool,
    pub health_report_age_ms: i128,
}

#[derive(Clone)]
pub struct FakeChunkServerState {
    pub node_id: String,
    pub region_id: String,
    pub endpoint: Arc<Mutex<String>>,
    pub options: Arc<Mutex<ChunkServerOptions>>,
    pub call_counts: Arc<Mutex<HashMap<String, usize>>>,
}

impl FakeChunkServerState {
    fn increment_call_count(&self, endpoint: &str) {
        let mut counts = self.call_counts.lock().unwrap();
        *counts.entry(endpoint.to_string()).or_insert(0) += 1;
    }

    pub fn get_call_count(&self, endpoint: &str) -> usize {
        let counts = self.call_counts.lock().unwrap();
        counts.get(endpoint).copied().unwrap_or(0)
    }
}

async fn health_handler(
    State(state): State<FakeChunkServerState>,
) -> Result<Json<NodeReport>, ApiError> {
    state.increment_call_count("health");

    let (fail, age_ms) = {
        let opts = state.options.lock().unwrap();
        (opts.fail_health, opts.health_report_age_ms)
    };

    if fail {
        return Err(ApiError::Any(anyhow::anyhow!(
            "Fault injection: health failed"
        )));
    }

    let endpoint = state.endpoint.lock().unwrap().clone();
    Ok(Json(mk_report(
        &state.node_id,
        &state.region_id,
        &endpoint,
        age_ms,
    )))
}

pub struct FakeChunkServerHandle {
    pub endpoint: String,
    pub state: FakeChunkServerState,
    pub shutdown_tx: watch::Sender<bool>,
    pub handle: JoinHandle<Result<(), anyhow::Error>>,
}

impl FakeChunkServerHandle {
    pub async fn shutdown(self) -> Result<()> {
        let _ = self.shutdown_tx.send(true);
        self.handle.abort();
        let _ = self.handle.await;
        Ok(())
    }
}

/// Spawn a fake chunk server exposing /health on an ephemeral port.
pub async fn spawn_chunkserver(
    node_id: &str,
    region_id: &str,
    options: ChunkServerOptions,
) -> Result<FakeChunkServerHandle> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let endpoint = format!("http://{}", addr);

    let state = FakeChunkServerState {
        node_id: node_id.to_string(),
        region_id: region_id.to_string(),
        endpoint: Arc::new(Mutex::new(endpoint.clone())),
        options: Arc::new(Mutex::new(options)),
        call_counts: Arc::new(Mutex::new(HashMap::new())),
    };

    let app = Router::new()
        .route("/health", get(health_handler))
        .with_state(state.clone());

    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

    let handle = tokio::spawn(async move {
        let server = Server::from_tcp(listener.into_std()?).serve(app.into_make_service());

        tokio::select! {
            res = server => res.map_err(anyhow::Error::from),
            _ = shutdown_rx.changed() => Ok(()),
        }
    });

    Ok(FakeChunkServerHandle {
        endpoint,
        state,
        shutdown_tx,
        handle,
    })
}

/// Poll an async condition until it holds or the deadline passes.
pub async fn wait_until<F, Fut>(timeout_ms: u64, mut check: F) -> Result<()>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<bool>>,
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
