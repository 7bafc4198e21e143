//! Order intake, order queue and bulk advance endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::{EmployeeId, Order, OrderId, TableNumber};
use domain::{AdvanceOutcome, BulkAdvance, OpenOrder, OrderLine};
use serde::Deserialize;
use store::Store;

use super::{Actor, AppState, parse_status, parse_uuid};
use crate::error::ApiError;

// -- Request types --

#[derive(Deserialize)]
pub struct OpenOrderRequest {
    pub table: u32,
    pub waiter_id: String,
    pub items: Vec<OrderLineRequest>,
}

#[derive(Deserialize)]
pub struct OrderLineRequest {
    pub product_id: String,
    pub quantity: i64,
}

#[derive(Deserialize)]
pub struct AdvanceRequest {
    pub status: String,
}

// -- Handlers --

/// POST /orders: open an order on a free table.
#[tracing::instrument(skip(state, req), fields(table = req.table))]
pub async fn open<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<OpenOrderRequest>,
) -> Result<(StatusCode, Json<Order>), ApiError> {
    let waiter = EmployeeId::from_uuid(parse_uuid(&req.waiter_id, "waiter")?);
    let lines = req
        .items
        .into_iter()
        .map(|line| OrderLine::new(line.product_id, line.quantity))
        .collect();

    let cmd = OpenOrder::new(TableNumber::new(req.table), waiter, lines);
    let order = state.service.open_order(cmd).await?;

    Ok((StatusCode::CREATED, Json(order)))
}

/// GET /orders: the queue of orders not yet invoiced, oldest first.
pub async fn queue<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<Vec<Order>>, ApiError> {
    Ok(Json(state.service.order_queue().await?))
}

/// GET /orders/:id: load an order with its items.
#[tracing::instrument(skip(state))]
pub async fn get<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<Order>, ApiError> {
    let order_id = OrderId::from_uuid(parse_uuid(&id, "order")?);
    let order = state
        .service
        .order(order_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Order {id} not found")))?;

    Ok(Json(order))
}

/// POST /orders/:id/advance: move every item of the order to a status.
#[tracing::instrument(skip(state, req))]
pub async fn advance<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Actor(actor): Actor,
    Path(id): Path<String>,
    Json(req): Json<AdvanceRequest>,
) -> Result<Json<AdvanceOutcome>, ApiError> {
    let order_id = OrderId::from_uuid(parse_uuid(&id, "order")?);
    let target = parse_status(&req.status)?;

    let outcome = state
        .service
        .bulk_advance(actor, BulkAdvance::new(order_id, target))
        .await?;
    Ok(Json(outcome))
}
