//! API server entry point.

use api::config::{Config, LogFormat};
use api::seed::CatalogSeed;
use domain::ServiceConfig;
use metrics_exporter_prometheus::PrometheusHandle;
use store::{InMemoryStore, PostgresStore, Store};
use tokio::signal;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    match config.log_format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

fn describe_metrics() {
    metrics::describe_counter!("orders_opened_total", "Orders opened");
    metrics::describe_counter!("line_items_advanced_total", "Line item status changes");
    metrics::describe_counter!("orders_promoted_total", "Order status promotions by status");
    metrics::describe_counter!("invoices_issued_total", "Invoices issued");
    metrics::describe_histogram!("invoice_total_cents", "Invoice totals in cents");
    metrics::describe_counter!("store_commits_total", "Committed change sets");
    metrics::describe_counter!("store_conflicts_total", "Change sets rejected on a stale status");
}

async fn serve<S: Store + 'static>(
    store: S,
    config: &Config,
    metrics_handle: PrometheusHandle,
) {
    let service_config = ServiceConfig {
        transition_policy: config.transition_policy,
    };
    let state = api::create_default_state(store, service_config);
    let app = api::create_app(state, metrics_handle);

    let addr = config.addr();
    tracing::info!(%addr, policy = ?config.transition_policy, "starting API server");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind address");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");
}

#[tokio::main]
async fn main() {
    // 1. Load configuration and initialize tracing
    let config = Config::from_env();
    init_tracing(&config);

    // 2. Install Prometheus metrics recorder
    let prometheus_builder = metrics_exporter_prometheus::PrometheusBuilder::new();
    let metrics_handle = prometheus_builder
        .install_recorder()
        .expect("failed to install Prometheus recorder");
    describe_metrics();

    // 3. Load the optional catalog file
    let seed = match &config.catalog_path {
        Some(path) => {
            let seed = CatalogSeed::load(path).expect("failed to load catalog");
            tracing::info!(
                path = %path.display(),
                tables = seed.tables.len(),
                products = seed.products.len(),
                "catalog loaded"
            );
            seed
        }
        None => CatalogSeed::default(),
    };

    // 4. Pick the store and run the server
    match &config.database_url {
        Some(url) => {
            let pool = sqlx::postgres::PgPoolOptions::new()
                .max_connections(10)
                .connect(url)
                .await
                .expect("failed to connect to PostgreSQL");
            let store = PostgresStore::new(pool);
            store
                .run_migrations()
                .await
                .expect("failed to run migrations");
            seed.apply_to_postgres(&store)
                .await
                .expect("failed to seed catalog");
            tracing::info!("using PostgreSQL store");
            serve(store, &config, metrics_handle).await;
        }
        None => {
            let store: InMemoryStore = seed.into_memory_store();
            tracing::info!("using in-memory store");
            serve(store, &config, metrics_handle).await;
        }
    }

    tracing::info!("server shut down gracefully");
}
