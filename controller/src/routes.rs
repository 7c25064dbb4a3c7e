use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use std::sync::Arc;

use common::api_error::ApiError;

use crate::clients::PlacementStore;
use crate::event::{EventBus, EventKind};

#[derive(Clone)]
pub struct ControllerState {
    pub bus: Arc<EventBus>,
    pub reports: Arc<dyn PlacementStore>,
}

// POST /events/{kind}
/// Inbound change notification from the storage layer. The payload is an
/// opaque serialized entity; the bus decodes it once at this boundary.
#[tracing::instrument(name = "controller.publish_event", skip(ctx, body), fields(kind = raw_kind))]
pub async fn publish_event(
    Path(raw_kind): Path<String>,
    State(ctx): State<ControllerState>,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    let kind = raw_kind
        .parse::<EventKind>()
        .map_err(|_| ApiError::UnknownEventKind)?;

    ctx.bus
        .publish(kind, &body)
        .map_err(|_| ApiError::MalformedEvent)?;

    Ok(StatusCode::ACCEPTED)
}

// GET /placements
#[tracing::instrument(name = "controller.list_placements", skip(ctx))]
pub async fn list_placements(
    State(ctx): State<ControllerState>,
) -> Result<impl IntoResponse, ApiError> {
    let reports = ctx.reports.list_reports().await?;
    Ok((StatusCode::OK, axum::Json(reports)))
}

// GET /healthz
pub async fn healthz() -> StatusCode {
    StatusCode::OK
}
