//! HTTP API server with observability for the restaurant order system.
//!
//! Provides REST endpoints for order intake, kitchen progress and table
//! billing, with structured logging (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;
pub mod seed;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use domain::{RestaurantService, ServiceConfig};
use metrics_exporter_prometheus::PrometheusHandle;
use store::Store;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use routes::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: Store + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/tables", get(routes::tables::list::<S>))
        .route("/tables/{number}/invoice", post(routes::tables::bill::<S>))
        .route("/products", get(routes::tables::products::<S>))
        .route("/orders", post(routes::orders::open::<S>))
        .route("/orders", get(routes::orders::queue::<S>))
        .route("/orders/{id}", get(routes::orders::get::<S>))
        .route("/orders/{id}/advance", post(routes::orders::advance::<S>))
        .route("/items/{id}/advance", post(routes::items::advance::<S>))
        .route("/invoices", get(routes::invoices::list::<S>))
        .route("/invoices/daily", get(routes::invoices::daily::<S>))
        .route("/invoices/{id}", get(routes::invoices::get::<S>))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Creates the application state around a store.
pub fn create_default_state<S: Store + 'static>(store: S, config: ServiceConfig) -> Arc<AppState<S>> {
    Arc::new(AppState {
        service: RestaurantService::with_config(store, config),
    })
}
