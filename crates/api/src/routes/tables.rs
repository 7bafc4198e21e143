//! Table availability, menu listing and table billing.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::{Invoice, Product, Table, TableNumber};
use domain::BillTable;
use store::Store;

use super::{Actor, AppState};
use crate::error::ApiError;

/// GET /tables: every table with its occupancy.
pub async fn list<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<Vec<Table>>, ApiError> {
    Ok(Json(state.service.tables().await?))
}

/// GET /products: the menu.
pub async fn products<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<Vec<Product>>, ApiError> {
    Ok(Json(state.service.products().await?))
}

/// POST /tables/:number/invoice: bill every finalized order of the table.
#[tracing::instrument(skip(state))]
pub async fn bill<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Actor(actor): Actor,
    Path(number): Path<u32>,
) -> Result<(StatusCode, Json<Invoice>), ApiError> {
    let invoice = state
        .service
        .bill_table(actor, BillTable::new(TableNumber::new(number)))
        .await?;
    Ok((StatusCode::CREATED, Json(invoice)))
}
