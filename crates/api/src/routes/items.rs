//! Per-item kitchen control.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use common::LineItemId;
use domain::{AdvanceItem, AdvanceOutcome};
use store::Store;

use super::orders::AdvanceRequest;
use super::{Actor, AppState, parse_status, parse_uuid};
use crate::error::ApiError;

/// POST /items/:id/advance: move one line item to a status.
#[tracing::instrument(skip(state, req))]
pub async fn advance<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Actor(actor): Actor,
    Path(id): Path<String>,
    Json(req): Json<AdvanceRequest>,
) -> Result<Json<AdvanceOutcome>, ApiError> {
    let item_id = LineItemId::from_uuid(parse_uuid(&id, "line item")?);
    let target = parse_status(&req.status)?;

    let outcome = state
        .service
        .advance_item(actor, AdvanceItem::new(item_id, target))
        .await?;
    Ok(Json(outcome))
}
