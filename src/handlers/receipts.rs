//! Receipt upload handler.
//!
//! Accepts a multipart file, forwards it to the configured image host and
//! returns the hosted URL for the client to attach to a transaction. A
//! failed or unconfigured upload still returns 200 with a null URL so the
//! client can record the transaction without a receipt.

use axum::{
    extract::{Multipart, State},
    Json,
};
use serde::Serialize;
use tracing::{info, warn};
use utoipa::ToSchema;

use crate::{
    error::{ApiError, ApiResult},
    handlers::auth::ErrorResponse,
    AppState,
};

#[derive(Debug, Serialize, ToSchema)]
pub struct ReceiptResponse {
    /// Hosted receipt URL, or null when the upload was degraded.
    #[schema(example = "https://images.example.com/receipts/abc123.png")]
    pub url: Option<String>,
}

#[utoipa::path(
    post,
    path = "/receipts",
    tag = "Receipts",
    request_body(content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Receipt processed; url is null if hosting degraded", body = ReceiptResponse),
        (status = 400, description = "No file in request", body = ErrorResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 403, description = "No business context", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn upload_receipt(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<Json<ReceiptResponse>> {
    let mut file: Option<(Vec<u8>, String)> = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        warn!(error = %e, "Malformed multipart body");
        ApiError::bad_request("Malformed multipart body", "VALIDATION_ERROR")
    })? {
        if field.name() == Some("file") {
            let file_name = field
                .file_name()
                .unwrap_or("receipt")
                .to_string();
            let bytes = field.bytes().await.map_err(|e| {
                warn!(error = %e, "Failed to read multipart field");
                ApiError::bad_request("Failed to read file", "VALIDATION_ERROR")
            })?;
            file = Some((bytes.to_vec(), file_name));
            break;
        }
    }

    let (bytes, file_name) = file.ok_or_else(|| {
        ApiError::bad_request("A 'file' field is required", "VALIDATION_ERROR")
    })?;

    let url = state.receipts.upload(bytes, file_name).await;

    info!(hosted = url.is_some(), "Receipt upload processed");

    Ok(Json(ReceiptResponse { url }))
}
