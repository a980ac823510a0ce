//! Request handlers for the provider endpoints

use axum::{
    body::Body,
    extract::{Query, State},
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use bytes::Bytes;
use futures::stream::{StreamExt, TryStreamExt};
use prometheus::{Encoder, TextEncoder};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument};

use super::FileQuery;
use crate::errors::{Result, UploadError};
use crate::policy::FileDescriptor;
use crate::provider::UploadProvider;

/// Response for successful uploads
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub key: String,
    pub file: FileDescriptor,
}

#[derive(Debug, Serialize)]
pub struct SignedUrlResponse {
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct ProviderInfo {
    pub bucket: String,
    pub private: bool,
}

/// Health check endpoint
#[instrument]
pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// Readiness probe endpoint
#[instrument]
pub async fn ready() -> impl IntoResponse {
    (StatusCode::OK, "Ready")
}

/// Prometheus metrics endpoint
#[instrument]
pub async fn metrics() -> Result<String> {
    use crate::metrics::REGISTRY;
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| UploadError::Internal(format!("Failed to encode metrics: {}", e)))?;
    String::from_utf8(buffer)
        .map_err(|e| UploadError::Internal(format!("Metrics are not UTF-8: {}", e)))
}

/// Bucket and visibility of the provider
#[instrument(skip(provider))]
pub async fn provider_info(State(provider): State<Arc<UploadProvider>>) -> Json<ProviderInfo> {
    Json(ProviderInfo {
        bucket: provider.config().bucket_name.clone(),
        private: provider.is_private(),
    })
}

/// Buffered upload - PUT /files
#[instrument(skip(provider, body))]
pub async fn upload(
    State(provider): State<Arc<UploadProvider>>,
    Query(query): Query<FileQuery>,
    body: Bytes,
) -> Result<Json<UploadResponse>> {
    let mut file = query.into_upload_descriptor();
    info!(name = %file.name, size = body.len(), "Upload request");

    provider.upload(&mut file, body).await?;
    let key = provider.key_for(&file)?;

    Ok(Json(UploadResponse {
        key: key.to_string(),
        file,
    }))
}

/// Streamed upload - POST /files/stream
#[instrument(skip(provider, headers, body))]
pub async fn upload_stream(
    State(provider): State<Arc<UploadProvider>>,
    Query(query): Query<FileQuery>,
    headers: HeaderMap,
    body: Body,
) -> Result<Json<UploadResponse>> {
    let mut file = query.into_upload_descriptor();
    if let Some(length) = headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())
    {
        file.size_bytes = length;
    }
    info!(name = %file.name, size = file.size_bytes, "Streamed upload request");

    let stream = body
        .into_data_stream()
        .map_err(std::io::Error::other)
        .boxed();
    provider.upload_stream(&mut file, stream).await?;
    let key = provider.key_for(&file)?;

    Ok(Json(UploadResponse {
        key: key.to_string(),
        file,
    }))
}

/// Delete - DELETE /files
#[instrument(skip(provider))]
pub async fn delete_file(
    State(provider): State<Arc<UploadProvider>>,
    Query(query): Query<FileQuery>,
) -> Result<StatusCode> {
    let file = query.into_lookup_descriptor()?;
    provider.delete(&file).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Signed read URL - GET /files/signed-url
#[instrument(skip(provider))]
pub async fn signed_url(
    State(provider): State<Arc<UploadProvider>>,
    Query(query): Query<FileQuery>,
) -> Result<Json<SignedUrlResponse>> {
    let file = query.into_lookup_descriptor()?;
    let url = provider.get_signed_url(&file).await?;
    Ok(Json(SignedUrlResponse {
        url: url.to_string(),
    }))
}
