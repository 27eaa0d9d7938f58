//! Phishing detection service: binary entrypoint.
//! Loads the model assets, then serves the Axum router until Ctrl-C.

use anyhow::Context;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use phishing_detector::api::{self, AppState};
use phishing_detector::assets::ModelContext;
use phishing_detector::config::ServerConfig;
use phishing_detector::metrics::Metrics;
use phishing_detector::service::AnalysisService;

const DEFAULT_LOG_FILTER: &str = "phishing_detector=info,warn";

/// `RUST_LOG` drives the filter; `LOG_FORMAT=json` switches to JSON lines.
fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact())
            .init();
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = ServerConfig::load_default()?;

    // The service must not serve traffic without a valid model.
    let ctx = match ModelContext::load(&cfg.model) {
        Ok(ctx) => ctx,
        Err(e) => {
            error!(
                error = %e,
                model_dir = %cfg.model.dir.display(),
                "error loading model assets; make sure the model directory contains the required files"
            );
            std::process::exit(1);
        }
    };

    let service = AnalysisService::new(ctx, &cfg.model);
    let mut app = api::router(AppState::new(service), &cfg.server);

    if cfg.server.metrics_enabled {
        let metrics = Metrics::init().context("installing Prometheus recorder")?;
        app = app.merge(metrics.router());
    }

    let addr = cfg.server.bind_addr()?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!(%addr, "phishing detection server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}
