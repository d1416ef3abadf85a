use anyhow::Result;
use axum::Router;
use std::{io::ErrorKind, sync::Arc};
use tokio::{fs, net::TcpListener};
use tracing_subscriber::EnvFilter;

mod config;
mod errors;
mod handlers;
mod models;
mod routes;
mod services;

use services::{
    batch_service::BatchService, conversion_service::MagickConverter, janitor_service::Janitor,
};

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // --- Parse config ---
    let cfg = config::AppConfig::from_env_and_args()?;

    tracing::info!("Starting image-batch-converter with config: {:?}", cfg);

    // --- Ensure staging and output roots exist ---
    for dir in [&cfg.upload_dir, &cfg.output_dir] {
        if fs::metadata(dir).await.is_err() {
            fs::create_dir_all(dir).await?;
            tracing::info!("Created directory at {}", dir.display());
        }
    }

    // --- Initialize core service ---
    let converter = Arc::new(MagickConverter::new(cfg.magick_bin.clone()));
    let service = BatchService::new(cfg.upload_dir.clone(), cfg.output_dir.clone(), converter);

    // --- Background cleanup of expired batches ---
    Janitor::new(cfg.output_dir.clone(), cfg.retention(), cfg.sweep_interval()).start();

    // --- Build router ---
    let app: Router = routes::routes::routes(cfg.max_upload_bytes()).with_state(service);

    // --- Start server ---
    let addr = cfg.addr();
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err)
            if err.kind() == ErrorKind::PermissionDenied
                && matches!(cfg.host.as_str(), "0.0.0.0" | "::") =>
        {
            let fallback_addr = format!("127.0.0.1:{}", cfg.port);
            tracing::warn!(
                "Permission denied binding to {} ({}). Falling back to {}",
                addr,
                err,
                fallback_addr
            );
            TcpListener::bind(&fallback_addr).await?
        }
        Err(err) => return Err(err.into()),
    };

    tracing::info!("Server listening on http://{}", listener.local_addr()?);
    tracing::info!(
        "HEIC input needs ImageMagick built with libheif (`{}` must be on PATH)",
        cfg.magick_bin
    );
    axum::serve(listener, app).await?;

    Ok(())
}
