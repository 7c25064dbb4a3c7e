use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, warn};

use common::constants::node_key_for;
use common::schemas::NodeReport;

use crate::core::registry::ProbeTarget;
use crate::core::state::NameServerState;

/// Periodic aging pass over the registry. Each tick runs one sweep,
/// mirrors status changes to the index, and spawns a probe task per
/// newly-Suspect node. Probes run on their own tasks so a slow node can
/// block neither the next tick nor the other probes.
pub async fn node_status_sweeper(
    state: NameServerState,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> anyhow::Result<()> {
    let mut tick = tokio::time::interval(interval);

    loop {
        tokio::select! {
            _ = tick.tick() => {},
            _ = shutdown.changed() => { if *shutdown.borrow() { break; } }
        }

        let outcome = match state.registry.sweep() {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("node status sweep failed: {}", e);
                continue;
            }
        };

        for info in &outcome.changed {
            if let Err(e) = state
                .db
                .put(&node_key_for(&info.region_id, &info.node_id), info)
            {
                warn!(node_id = %info.node_id, "failed to persist node status: {}", e);
            }
        }

        for target in outcome.probes {
            let state = state.clone();
            tokio::spawn(async move {
                probe_node(state, target).await;
            });
        }
    }

    info!("node status sweeper stopped");

    Ok(())
}

/// Out-of-band health check of one Suspect node. A successful reply goes
/// back through `upsert`, so a node reporting an already-stale timestamp
/// re-enters as Suspect rather than Healthy. A failed or timed-out probe
/// changes nothing; the next sweep's Offline check takes over.
pub async fn probe_node(state: NameServerState, target: ProbeTarget) {
    let url = format!("{}/health", target.endpoint);

    let resp = state
        .http_client
        .get(&url)
        .timeout(state.probe_timeout)
        .send()
        .await;

    let report: NodeReport = match resp {
        Ok(resp) if resp.status().is_success() => match resp.json().await {
            Ok(report) => report,
            Err(e) => {
                warn!(node_id = %target.node_id, "probe reply decode failed: {}", e);
                return;
            }
        },
        Ok(resp) => {
            warn!(node_id = %target.node_id, "probe replied {}", resp.status());
            return;
        }
        Err(e) => {
            warn!(node_id = %target.node_id, "probe failed: {}", e);
            return;
        }
    };

    match state.registry.upsert(&report) {
        Ok(info) => {
            if let Err(e) = state
                .db
                .put(&node_key_for(&info.region_id, &info.node_id), &info)
            {
                warn!(node_id = %info.node_id, "failed to persist probed node: {}", e);
            }
            info!(node_id = %info.node_id, status = ?info.status, "probe revived node");
        }
        Err(e) => {
            error!(node_id = %target.node_id, "failed to upsert probed node: {}", e);
        }
    }
}
