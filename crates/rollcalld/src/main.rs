use anyhow::{Context, Result};
use rollcall_core::{ArcFaceEncoder, FaceEncoder, FaceVerifier, StoreMode, ThumbprintEncoder};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

mod config;
mod http;
mod service;
mod store;

use config::Config;
use service::AttendanceService;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = Config::from_env();
    tracing::info!(
        encoder = %config.encoder,
        store_mode = %config.store_mode,
        tolerance = config.tolerance,
        "rollcalld starting"
    );

    let encoder: Arc<dyn FaceEncoder> = match config.encoder.as_str() {
        "arcface" => Arc::new(
            ArcFaceEncoder::load(
                &config.detector_model_path(),
                &config.arcface_model_path(),
            )
            .context("loading ONNX models")?,
        ),
        "thumbprint" => Arc::new(ThumbprintEncoder::new()),
        other => anyhow::bail!("unknown encoder '{other}' (expected 'arcface' or 'thumbprint')"),
    };

    let store_mode: StoreMode = config.store_mode.parse().map_err(anyhow::Error::msg)?;
    let matcher = FaceVerifier::new(encoder, config.tolerance, store_mode);
    let service = Arc::new(AttendanceService::new(Arc::new(matcher), config.auto_name));

    let app = http::build_router(service);
    let listener = tokio::net::TcpListener::bind(&config.listen)
        .await
        .with_context(|| format!("binding {}", config.listen))?;
    tracing::info!(addr = %listener.local_addr()?, "rollcalld listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("rollcalld shutting down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %err, "failed to install ctrl-c handler");
    }
}
