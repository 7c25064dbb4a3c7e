use axum::{
    extract::{Json, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use tracing::warn;

use common::api_error::ApiError;
use common::constants::node_key_for;
use common::node_id::NodeId;
use common::schemas::NodeReport;
use common::url_utils::sanitize_url;

use crate::core::state::NameServerState;

// POST /cluster/heartbeat
/// A chunk server reporting in. First heartbeat creates the entry;
/// later ones refresh it. Status is decided by the registry's staleness
/// rule, never taken from the node.
#[tracing::instrument(name = "nameserver.heartbeat", skip(ctx, report), fields(node_id = %report.node_id))]
pub async fn heartbeat(
    State(ctx): State<NameServerState>,
    Json(report): Json<NodeReport>,
) -> Result<StatusCode, ApiError> {
    if NodeId::parse(&report.node_id).is_err() {
        return Err(ApiError::InvalidNodeId);
    }

    let report = NodeReport {
        endpoint: sanitize_url(&report.endpoint)?,
        ..report
    };

    let info = ctx.registry.upsert(&report)?;

    if let Err(e) = ctx
        .db
        .put(&node_key_for(&info.region_id, &info.node_id), &info)
    {
        // registry is authoritative; the index copy is best-effort
        warn!(node_id = %info.node_id, "failed to persist node record: {}", e);
    }

    Ok(StatusCode::OK)
}

#[derive(Deserialize)]
pub struct ListNodesQuery {
    pub status: Option<String>,
}

// GET /cluster/nodes[?status=healthy]
#[tracing::instrument(name = "nameserver.list_nodes", skip(ctx, query))]
pub async fn list_nodes(
    State(ctx): State<NameServerState>,
    Query(query): Query<ListNodesQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let nodes = match query.status.as_deref() {
        Some("healthy") => ctx.registry.healthy_snapshot()?,
        _ => ctx.registry.all_nodes()?,
    };

    Ok((StatusCode::OK, axum::Json(nodes)))
}

// GET /healthz
pub async fn healthz() -> StatusCode {
    StatusCode::OK
}
