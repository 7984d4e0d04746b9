use axum::extract::{Multipart, State};
use axum::response::Html;
use axum::{Extension, Json};
use bytes::Bytes;
use chrono::Utc;
use serde_json::{Value, json};
use std::sync::Arc;

use crate::assets::INDEX_HTML;
use crate::core::ingest::{UploadedImage, ValidationError, ingest};
use crate::core::rate_limiter::{SessionId, SessionUsage};
use crate::core::report::Report;
use crate::errors::AppError;
use crate::server::types::{AnalyzeResponse, AppState};

const IMAGE_FIELD: &str = "image";

pub async fn index_handler() -> Html<&'static str> {
    Html(INDEX_HTML)
}

// server status handler
pub async fn server_status_handler() -> Json<Value> {
    Json(json!({"status": "running"}))
}

pub async fn session_usage_handler(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionId>,
) -> Json<SessionUsage> {
    Json(state.limiters.usage(session))
}

async fn read_upload(
    multipart: &mut Multipart,
    max_bytes: usize,
) -> Result<UploadedImage, AppError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(IMAGE_FIELD) {
            continue;
        }

        let file_name = field.file_name().unwrap_or_default().to_string();
        let data: Bytes = field.bytes().await?;
        return Ok(ingest(&file_name, data, max_bytes)?);
    }

    Err(ValidationError::Empty.into())
}

/// Runs one analysis: validate the upload, take a unit of session quota,
/// call the provider, then split its reply into report sections.
pub async fn analyze_handler(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionId>,
    mut multipart: Multipart,
) -> Result<Json<AnalyzeResponse>, AppError> {
    let start_time = std::time::Instant::now();

    let image = read_upload(&mut multipart, state.max_image_bytes).await?;

    state
        .limiters
        .admit(session)
        .map_err(|limited| AppError::RateLimited {
            retry_after: limited.retry_after,
        })?;

    tracing::info!(
        session = %session,
        image = %image.fingerprint,
        size_bytes = image.size(),
        width = image.width,
        height = image.height,
        model = state.provider.model(),
        "analysis admitted"
    );

    let reply = state.provider.generate(&image).await?;
    let report = Report::from_reply(reply, &image, Utc::now());

    tracing::info!(
        session = %session,
        image = %image.fingerprint,
        sections = report.sections.len(),
        "analysis completed in {:?}",
        start_time.elapsed()
    );

    Ok(Json(AnalyzeResponse::new(report)))
}
