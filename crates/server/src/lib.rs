//! Chaingate Server: the HTTP layer of the gateway.
//!
//! Serves the declared usage routes under `/v1`, the contract listing at
//! `/v1/contracts`, plus `/health` and Prometheus metrics at `/metrics`.
use anyhow::Context;
use axum::{response::IntoResponse, routing::get, Json, Router};
use chaingate_common::config::AppConfig;
use chaingate_common::networks::NetworkRegistry;
use chaingate_core::executor::StreamingExecutor;
use chaingate_core::orchestrator::UsageQuery;
use chaingate_core::sql::SqlRegistry;
use once_cell::sync::Lazy;
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

// Global metrics registry
pub static REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);

pub static QUERY_COUNT: Lazy<IntCounter> = Lazy::new(|| {
    let opts = Opts::new("chaingate_queries_total", "Total number of usage queries executed");
    let counter = IntCounter::with_opts(opts).unwrap();
    REGISTRY.register(Box::new(counter.clone())).unwrap();
    counter
});

pub static QUERY_ERRORS: Lazy<IntCounterVec> = Lazy::new(|| {
    let opts = Opts::new(
        "chaingate_query_errors_total",
        "Usage requests answered with an error envelope",
    );
    let counter = IntCounterVec::new(opts, &["code"]).unwrap();
    REGISTRY.register(Box::new(counter.clone())).unwrap();
    counter
});

pub static ACTIVE_QUERIES: Lazy<IntGauge> = Lazy::new(|| {
    let opts = Opts::new(
        "chaingate_active_queries",
        "Number of currently active queries",
    );
    let gauge = IntGauge::with_opts(opts).unwrap();
    REGISTRY.register(Box::new(gauge.clone())).unwrap();
    gauge
});

pub mod api;
pub mod routes;

pub use api::{create_api_router, into_response, ApiState, API_PREFIX};
pub use routes::{usage_routes, RouteSpec};

pub struct ChainGateServer {
    config_path: String,
    listen_addr: Option<String>,
}

impl Default for ChainGateServer {
    fn default() -> Self {
        Self {
            config_path: "config/chaingate.yaml".to_string(),
            listen_addr: None,
        }
    }
}

impl ChainGateServer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(mut self, config_path: &str) -> Self {
        self.config_path = config_path.to_string();
        self
    }

    /// Override `server.listen_addr` from the configuration.
    pub fn with_listen_addr(mut self, listen_addr: Option<String>) -> Self {
        self.listen_addr = listen_addr;
        self
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let app_config = AppConfig::from_file(&self.config_path)?;
        chaingate_common::telemetry::init_logging(&app_config.logging, &app_config.telemetry)?;

        let networks = NetworkRegistry::from_configs(&app_config.networks)
            .context("Failed to build network registry")?;
        let sql = SqlRegistry::from_dir(&app_config.sql.directory)
            .context("Failed to load SQL templates")?;
        let executor = StreamingExecutor::new(&app_config.backend)
            .context("Failed to create backend client")?;

        info!(
            "Loaded {} networks and {} SQL templates, backend {}",
            networks.len(),
            sql.len(),
            app_config.backend.url
        );

        let usage = UsageQuery::new(
            Arc::new(executor),
            Arc::new(sql),
            Arc::new(networks),
            app_config.limits,
        )
        .with_max_execution_time(app_config.backend.max_execution_time_secs)
        .with_cache_ttl(app_config.backend.cache_ttl_secs);

        let routes = usage_routes(app_config.limits).context("Failed to build route contracts")?;
        let app = build_router(ApiState::new(usage, routes));

        let listen_addr = self
            .listen_addr
            .unwrap_or_else(|| app_config.server.listen_addr.clone());
        let addr: SocketAddr = listen_addr
            .parse()
            .with_context(|| format!("Invalid listen address: {}", listen_addr))?;
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind to {}", addr))?;

        info!("{} listening on {}", app_config.server.name, addr);
        axum::serve(listener, app).await?;

        chaingate_common::telemetry::shutdown_telemetry();
        Ok(())
    }
}

/// Full application router: health and metrics at the root, the API nested
/// under [`API_PREFIX`].
pub fn build_router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .nest(API_PREFIX, create_api_router(state))
}

async fn health_handler() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn metrics_handler() -> impl IntoResponse {
    // Touch lazies so every metric is exported before its first use
    Lazy::force(&QUERY_COUNT);
    Lazy::force(&QUERY_ERRORS);
    Lazy::force(&ACTIVE_QUERIES);

    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = vec![];
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
        return axum::http::StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    (
        [(axum::http::header::CONTENT_TYPE, encoder.format_type().to_string())],
        buffer,
    )
        .into_response()
}
