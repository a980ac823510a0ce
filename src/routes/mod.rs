//! HTTP routes exposing the upload provider
//!
//! Implements:
//! - PUT /files - buffered upload
//! - POST /files/stream - streamed upload
//! - DELETE /files - delete (idempotent)
//! - GET /files/signed-url - signed read URL
//! - GET /provider - bucket and visibility
//! - GET /healthz, /ready, /metrics

mod handlers;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post, put},
    Router,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::errors::{Result, UploadError};
use crate::policy::FileDescriptor;
use crate::provider::UploadProvider;

/// Query parameters describing the file an operation targets
#[derive(Debug, Default, Deserialize)]
pub struct FileQuery {
    pub name: Option<String>,
    pub hash: Option<String>,
    pub ext: Option<String>,
    pub path: Option<String>,
    pub mime: Option<String>,
}

impl FileQuery {
    /// Descriptor for an upload; a fresh hash is generated when none is given
    fn into_upload_descriptor(mut self) -> FileDescriptor {
        let hash = self
            .hash
            .take()
            .filter(|h| !h.is_empty())
            .unwrap_or_else(|| uuid::Uuid::new_v4().simple().to_string());
        let name = self.name.take().unwrap_or_else(|| hash.clone());
        self.into_descriptor(name, hash)
    }

    /// Descriptor for an existing object, which must be addressed by hash
    fn into_lookup_descriptor(self) -> Result<FileDescriptor> {
        let hash = match self.hash.as_deref() {
            Some(h) if !h.is_empty() => h.to_string(),
            _ => {
                return Err(UploadError::InvalidRequest(
                    "query parameter `hash` is required".to_string(),
                ))
            }
        };
        let name = self.name.clone().unwrap_or_default();
        Ok(self.into_descriptor(name, hash))
    }

    fn into_descriptor(self, name: String, hash: String) -> FileDescriptor {
        let extension = match self.ext {
            Some(ext) if !ext.is_empty() && !ext.starts_with('.') => format!(".{}", ext),
            Some(ext) => ext,
            None => String::new(),
        };

        FileDescriptor {
            name,
            hash,
            extension,
            relative_path: self.path.filter(|p| !p.is_empty()),
            mime_type: self.mime.unwrap_or_default(),
            size_bytes: 0,
            url: None,
        }
    }
}

/// Create the provider router
pub fn create_router(provider: Arc<UploadProvider>, max_body_size: usize) -> Router {
    Router::new()
        .route("/healthz", get(handlers::health))
        .route("/ready", get(handlers::ready))
        .route("/metrics", get(handlers::metrics))
        .route("/provider", get(handlers::provider_info))
        .route(
            "/files",
            put(handlers::upload)
                .delete(handlers::delete_file)
                .layer(DefaultBodyLimit::max(max_body_size)),
        )
        .route("/files/stream", post(handlers::upload_stream))
        .route("/files/signed-url", get(handlers::signed_url))
        .with_state(provider)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StorageConfig;
    use crate::storage::MemoryBackend;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::Value;
    use tower::ServiceExt;

    fn router(config: StorageConfig, max_body_size: usize) -> Router {
        let provider = UploadProvider::new(config, Arc::new(MemoryBackend::new()));
        create_router(Arc::new(provider), max_body_size)
    }

    fn default_router() -> Router {
        let mut config = StorageConfig::new("media");
        config.base_url = Some("https://cdn.example".to_string());
        router(config, 1024)
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn request(method: &str, uri: &str, body: Body) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .body(body)
            .unwrap()
    }

    #[test]
    fn test_query_extension_gets_leading_dot() {
        let query = FileQuery {
            hash: Some("abc".to_string()),
            ext: Some("png".to_string()),
            ..Default::default()
        };
        let file = query.into_lookup_descriptor().unwrap();
        assert_eq!(file.extension, ".png");
    }

    #[test]
    fn test_lookup_requires_hash() {
        let err = FileQuery::default().into_lookup_descriptor().unwrap_err();
        assert!(matches!(err, UploadError::InvalidRequest(_)));
    }

    #[test]
    fn test_upload_descriptor_generates_hash() {
        let file = FileQuery::default().into_upload_descriptor();
        assert_eq!(file.hash.len(), 32);
        assert_eq!(file.name, file.hash);
    }

    #[tokio::test]
    async fn test_health() {
        let response = default_router()
            .oneshot(request("GET", "/healthz", Body::empty()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_upload_then_delete() {
        let app = default_router();

        let response = app
            .clone()
            .oneshot(request(
                "PUT",
                "/files?name=cat.png&hash=abc123&ext=.png&path=avatars&mime=image/png",
                Body::from("png bytes"),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        assert_eq!(body["key"], "avatars/abc123.png");
        assert_eq!(body["file"]["url"], "https://cdn.example/avatars/abc123.png");
        assert_eq!(body["file"]["size_bytes"], 9);

        let response = app
            .clone()
            .oneshot(request(
                "DELETE",
                "/files?hash=abc123&ext=.png&path=avatars",
                Body::empty(),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        // Deleting again is still a success
        let response = app
            .oneshot(request(
                "DELETE",
                "/files?hash=abc123&ext=.png&path=avatars",
                Body::empty(),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn test_stream_upload() {
        let response = default_router()
            .oneshot(request(
                "POST",
                "/files/stream?name=notes.txt&hash=h1&ext=txt",
                Body::from("streamed"),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        assert_eq!(body["key"], "h1.txt");
        assert_eq!(body["file"]["url"], "https://cdn.example/h1.txt");
        assert_eq!(body["file"]["size_bytes"], 8);
    }

    #[tokio::test]
    async fn test_stream_upload_checks_content_length() {
        let mut config = StorageConfig::new("media");
        config.size_limit = Some(4);
        let request = Request::builder()
            .method("POST")
            .uri("/files/stream?hash=h1")
            .header("content-length", "8")
            .body(Body::from("too long"))
            .unwrap();

        let response = router(config, 1024).oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        let body = json_body(response).await;
        assert_eq!(body["error"], "SizeLimitExceeded");
    }

    #[tokio::test]
    async fn test_chunked_stream_upload_over_limit_rejected() {
        let mut config = StorageConfig::new("media");
        config.size_limit = Some(4);
        let chunks: Vec<std::io::Result<bytes::Bytes>> = vec![
            Ok(bytes::Bytes::from_static(b"too ")),
            Ok(bytes::Bytes::from_static(b"long")),
        ];
        let body = Body::from_stream(futures::stream::iter(chunks));

        let response = router(config, 1024)
            .oneshot(request("POST", "/files/stream?hash=h1", body))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        let body = json_body(response).await;
        assert_eq!(body["error"], "SizeLimitExceeded");
    }

    #[tokio::test]
    async fn test_leading_slash_path_rejected() {
        let response = default_router()
            .oneshot(request("PUT", "/files?hash=h1&path=/sub", Body::from("x")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert_eq!(body["error"], "InvalidKey");
    }

    #[tokio::test]
    async fn test_upload_over_configured_limit_rejected() {
        let mut config = StorageConfig::new("media");
        config.size_limit = Some(4);

        let response = router(config, 1024)
            .oneshot(request("PUT", "/files?hash=h1", Body::from("too long")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn test_signed_url_requires_hash() {
        let response = default_router()
            .oneshot(request("GET", "/files/signed-url", Body::empty()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_signed_url_unsupported_by_memory_backend() {
        let response = default_router()
            .oneshot(request("GET", "/files/signed-url?hash=h1&ext=.png", Body::empty()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_IMPLEMENTED);
    }

    #[tokio::test]
    async fn test_provider_info() {
        let response = default_router()
            .oneshot(request("GET", "/provider", Body::empty()))
            .await
            .unwrap();
        let body = json_body(response).await;
        assert_eq!(body["bucket"], "media");
        assert_eq!(body["private"], true);
    }
}
