//! Defines routes for the batch conversion API.
//!
//! ## Structure
//! - **Conversion endpoints** (multipart, field `images`, 1..200 files)
//!   - `POST /api/webp`    — compress to WebP (`quality`, `lossless`, `resize`, `zip`)
//!   - `POST /api/convert` — convert to jpg/png/heic (`target`, `quality`,
//!     `pngCompression`, `lossless`, `resize`, `strip`, `zip`, `background`)
//!
//! - **Downloads**
//!   - `GET /download/{batch_id}/{file_name}` — converted file or batch archive

use crate::{
    handlers::{
        convert_handlers::{compress_webp, convert_images},
        download_handlers::download_file,
        health_handlers::{healthz, readyz},
    },
    services::batch_service::BatchService,
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};

/// Build and return the router for all API routes.
///
/// The router carries shared state (`BatchService`) to all handlers.
/// `max_upload_bytes` replaces axum's default body limit on the upload routes.
pub fn routes(max_upload_bytes: usize) -> Router<BatchService> {
    let uploads = Router::new()
        .route("/api/webp", post(compress_webp))
        .route("/api/convert", post(convert_images))
        .layer(DefaultBodyLimit::max(max_upload_bytes));

    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/download/{batch_id}/{file_name}", get(download_file))
        .merge(uploads)
}
