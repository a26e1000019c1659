/// Media upload endpoints
///
/// The axum body limit is disabled here; the upload store enforces the
/// configured cap while streaming.
use crate::{
    auth::AuthUser,
    context::AppContext,
    error::{AppError, AppResult},
    metrics,
    uploads::{MediaKind, StoredUpload},
};
use axum::{
    extract::{multipart::MultipartError, DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};

/// Build upload routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/image", post(upload_image))
        .route("/voice", post(upload_voice))
        .layer(DefaultBodyLimit::disable())
}

async fn upload_image(
    State(ctx): State<AppContext>,
    auth: AuthUser,
    multipart: Multipart,
) -> AppResult<Json<StoredUpload>> {
    upload(ctx, auth, multipart, MediaKind::Image).await
}

async fn upload_voice(
    State(ctx): State<AppContext>,
    auth: AuthUser,
    multipart: Multipart,
) -> AppResult<Json<StoredUpload>> {
    upload(ctx, auth, multipart, MediaKind::Voice).await
}

/// Stream the `file` field to disk
async fn upload(
    ctx: AppContext,
    auth: AuthUser,
    mut multipart: Multipart,
    kind: MediaKind,
) -> AppResult<Json<StoredUpload>> {
    let limit_mb = ctx.config.uploads.max_file_size / 1024 / 1024;

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, limit_mb))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let mut writer = ctx.uploads.begin(kind, field.content_type()).await?;
        loop {
            match field.chunk().await {
                Ok(Some(chunk)) => writer.write_chunk(&chunk).await?,
                Ok(None) => break,
                Err(e) => {
                    writer.abort().await;
                    return Err(multipart_error(e, limit_mb));
                }
            }
        }

        let stored = writer.finish().await?;
        metrics::record_upload(kind.as_str());
        tracing::info!(
            "{} upload {} ({} bytes) by {}",
            kind.as_str(),
            stored.filename,
            stored.size,
            auth.id()
        );
        return Ok(Json(stored));
    }

    Err(AppError::Validation("missing multipart field: file".to_string()))
}

fn multipart_error(e: MultipartError, limit_mb: usize) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge { limit_mb }
    } else {
        AppError::Validation(format!("invalid multipart body: {}", e.body_text()))
    }
}
