//! Footfall service binary: camera supervisors, analytics publisher and
//! the operator API in one process.

use std::net::SocketAddr;

use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use footfall_api::{create_router, metrics, ApiConfig, AppState, LogFormat};
use footfall_worker::{load_cameras_file, AnalyticsPublisher};

#[tokio::main]
async fn main() {
    // Load environment variables
    dotenvy::dotenv().ok();

    let config = ApiConfig::from_env();

    let env_filter = EnvFilter::from_default_env().add_directive(
        config
            .log_directive
            .parse()
            .unwrap_or_else(|_| "footfall=info".parse().expect("valid tracing directive")),
    );

    // Colored output for dev, JSON for production
    match config.log_format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(fmt::layer().json())
                .with(env_filter)
                .init();
        }
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(
                    fmt::layer()
                        .with_ansi(true)
                        .with_target(true)
                        .with_thread_ids(false)
                        .with_file(false)
                        .with_line_number(false),
                )
                .with(env_filter)
                .init();
        }
    }

    info!("Starting footfall");
    info!("API config: host={}, port={}", config.host, config.port);

    let state = match AppState::from_env(config.clone()).await {
        Ok(s) => s,
        Err(e) => {
            error!("Failed to create application state: {}", e);
            std::process::exit(1);
        }
    };

    let metrics_handle = if config.metrics_enabled {
        match metrics::init_metrics() {
            Ok(handle) => {
                info!("Prometheus metrics enabled at /metrics");
                Some(handle)
            }
            Err(e) => {
                warn!("Failed to install Prometheus recorder: {}", e);
                None
            }
        }
    } else {
        None
    };

    // Cameras known at start-up
    let fleet = state.fleet.clone();
    if let Some(path) = fleet.config().cameras_file.clone() {
        match load_cameras_file(&path) {
            Ok(specs) => {
                info!(path = %path.display(), cameras = specs.len(), "Loaded cameras file");
                for spec in specs {
                    let camera_id = spec.camera.id.clone();
                    if let Err(e) = fleet.register_spec(spec).await {
                        warn!(camera_id = %camera_id, "Skipping camera: {}", e);
                    }
                }
            }
            Err(e) => {
                error!(path = %path.display(), "Failed to load cameras file: {}", e);
                std::process::exit(1);
            }
        }
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let publisher = AnalyticsPublisher::new(fleet.clone(), state.analytics_sink.clone());
    let publisher_task = tokio::spawn(publisher.run(shutdown_rx));

    let app = create_router(state, metrics_handle);

    let addr: SocketAddr = match config.bind_address().parse() {
        Ok(addr) => addr,
        Err(e) => {
            error!("Invalid bind address {}: {}", config.bind_address(), e);
            std::process::exit(1);
        }
    };

    info!("Listening on {}", addr);

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind {}: {}", addr, e);
            std::process::exit(1);
        }
    };

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!("Server error: {}", e);
    }

    // Final analytics flush while supervisors are still running
    let _ = shutdown_tx.send(true);
    if let Err(e) = publisher_task.await {
        warn!("Publisher task failed: {}", e);
    }
    fleet.shutdown_all().await;

    info!("Server shutdown complete");
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Received shutdown signal");
}
