//! Invoice history and the daily summary.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use common::{Invoice, InvoiceId};
use domain::DailySummary;
use store::Store;

use super::{AppState, parse_uuid};
use crate::error::ApiError;

/// GET /invoices: every invoice, oldest first.
pub async fn list<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<Vec<Invoice>>, ApiError> {
    Ok(Json(state.service.invoices().await?))
}

/// GET /invoices/:id: a single invoice with its lines.
#[tracing::instrument(skip(state))]
pub async fn get<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<Invoice>, ApiError> {
    let invoice_id = InvoiceId::from_uuid(parse_uuid(&id, "invoice")?);
    let invoice = state
        .service
        .invoice(invoice_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Invoice {id} not found")))?;

    Ok(Json(invoice))
}

/// GET /invoices/daily: invoice totals per day.
pub async fn daily<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<Vec<DailySummary>>, ApiError> {
    Ok(Json(state.service.daily_summary().await?))
}
