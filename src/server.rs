use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{
        DefaultBodyLimit, Multipart, State,
        multipart::{MultipartError, MultipartRejection},
    },
    routing::{get, post},
};
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;

use crate::{
    config::CaptionConfig,
    engine::CaptionEngine,
    error::CaptionError,
    messages::{CaptionResponse, HealthResponse},
};

/// Name of the multipart field carrying the uploaded image.
pub const IMAGE_FIELD: &str = "image";

/// Builds the HTTP routes served in front of `engine`.
pub fn router(engine: Arc<CaptionEngine>, config: &CaptionConfig) -> Router {
    Router::new()
        .route("/", get(|| async { "Welcome to Infernum Caption!" }))
        .route("/generate-caption", post(generate_caption))
        .route("/health", get(health))
        .layer(DefaultBodyLimit::max(config.max_upload_bytes))
        .layer(CorsLayer::permissive())
        .with_state(engine)
}

/// Serves `app` on `listener` until Ctrl+C is received.
pub async fn serve(listener: TcpListener, app: Router) -> std::io::Result<()> {
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("Failed to listen for Ctrl+C: {e}");
        std::future::pending::<()>().await;
    }
    log::info!("Shutting down");
}

async fn generate_caption(
    State(engine): State<Arc<CaptionEngine>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<CaptionResponse>, CaptionError> {
    // a body that is not multipart carries no image either
    let multipart = multipart.map_err(|e| {
        log::debug!("Rejected upload: {e}");
        CaptionError::MissingImage
    })?;

    let image = read_image_field(multipart)
        .await?
        .ok_or(CaptionError::MissingImage)?;

    let caption = engine.caption(image).await?;

    Ok(Json(CaptionResponse::ok(caption)))
}

async fn read_image_field(mut multipart: Multipart) -> Result<Option<Vec<u8>>, CaptionError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(upload_error)?
    {
        // only file parts count as an upload
        if field.name() != Some(IMAGE_FIELD) || field.file_name().is_none() {
            continue;
        }
        let data = field
            .bytes()
            .await
            .map_err(upload_error)?;
        return Ok(Some(data.to_vec()));
    }
    Ok(None)
}

fn upload_error(e: MultipartError) -> CaptionError {
    log::warn!("Failed to read upload: {e}");
    CaptionError::Upload(e.body_text())
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}
