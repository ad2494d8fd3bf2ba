//! WMS API service.
//!
//! HTTP server exposing the OGC WMS 1.0.0-1.1.1 protocol endpoint over a
//! YAML-defined map configuration.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use axum::{extract::Extension, routing::get, Router};
use clap::Parser;
use metrics_exporter_prometheus::PrometheusBuilder;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use wms_api::{handlers, load_map_config, AppState};

#[derive(Parser, Debug)]
#[command(name = "wms-api")]
#[command(about = "OGC WMS server")]
struct Args {
    /// Listen address
    #[arg(short, long, default_value = "0.0.0.0:8080")]
    listen: String,

    /// Map definition file
    #[arg(short, long, default_value = "services/wms-api/config/demo.yaml")]
    map: PathBuf,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .json()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting WMS API server");

    let prometheus = PrometheusBuilder::new().install_recorder()?;

    let loaded = load_map_config(&args.map)?;
    let (map, query) = loaded.into_parts();
    let state = Arc::new(AppState::new(map, query));

    let metrics_handle = prometheus.clone();
    let app = Router::new()
        .route("/wms", get(handlers::wms_handler))
        .route("/wms/", get(handlers::wms_handler))
        .route("/health", get(handlers::health_handler))
        .route("/ready", get(handlers::ready_handler))
        .route(
            "/metrics",
            get(move || {
                let handle = metrics_handle.clone();
                async move { handle.render() }
            }),
        )
        .layer(Extension(state))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = args.listen.parse()?;
    info!(address = %addr, "Listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
