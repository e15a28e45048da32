//! Defines routes for the favorites API.
//!
//! ## Structure
//! - **Favorites**
//!   - `POST   /save_favorite`: store a preset (+ optional data-URL preview)
//!   - `GET    /get_favorites`: list every stored preset
//!   - `DELETE /delete_favorite/{filename}`: remove a preset and its preview
//!
//! - **Previews**
//!   - `GET    /saved_favorites/previews/{name}`: stored preview image
//!
//! - **Health**
//!   - `GET    /healthz`, `GET /readyz`

use crate::{
    handlers::{
        favorite_handlers::{delete_favorite, get_favorites, get_preview, save_favorite},
        health_handlers::{healthz, readyz},
    },
    services::favorites_service::FavoritesService,
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{delete, get, post},
};
use tower_http::trace::TraceLayer;

/// Build and return the router for the favorites service.
///
/// The router carries shared state (`FavoritesService`) to all handlers.
/// `max_body_bytes` bounds request bodies, which carry inline previews.
pub fn routes(max_body_bytes: usize) -> Router<FavoritesService> {
    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        // favorites
        .route("/save_favorite", post(save_favorite))
        .route("/get_favorites", get(get_favorites))
        .route("/delete_favorite/{filename}", delete(delete_favorite))
        .route("/saved_favorites/previews/{name}", get(get_preview))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{Body, to_bytes},
        http::{Method, Request, StatusCode, header},
    };
    use base64::{Engine as _, engine::general_purpose};
    use serde_json::{Value, json};
    use tower::ServiceExt;

    const BODY_LIMIT: usize = 1024 * 1024;

    async fn app() -> (tempfile::TempDir, Router) {
        app_with_limit(BODY_LIMIT).await
    }

    async fn app_with_limit(limit: usize) -> (tempfile::TempDir, Router) {
        let temp_dir = tempfile::tempdir().unwrap();
        let service = FavoritesService::new(temp_dir.path());
        service.init().await.unwrap();
        (temp_dir, routes(limit).with_state(service))
    }

    async fn send(app: &Router, method: Method, uri: &str, body: Option<String>) -> (StatusCode, Vec<u8>) {
        let mut builder = Request::builder().method(method).uri(uri);
        if body.is_some() {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
        }
        let request = builder
            .body(body.map(Body::from).unwrap_or_else(Body::empty))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, bytes.to_vec())
    }

    async fn send_json(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let (status, bytes) = send(app, method, uri, body.map(|b| b.to_string())).await;
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_save_list_delete_roundtrip() {
        let (_dir, app) = app().await;

        let (status, saved) = send_json(
            &app,
            Method::POST,
            "/save_favorite",
            Some(json!({"color": "blue", "height": 30})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(saved["message"], "Favorite saved successfully");
        assert_eq!(saved["warnings"], json!([]));
        let filename = saved["filename"].as_str().unwrap().to_string();

        let (status, listed) = send_json(&app, Method::GET, "/get_favorites", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            listed,
            json!([{"color": "blue", "height": 30, "filename": filename}])
        );

        let (status, deleted) = send_json(
            &app,
            Method::DELETE,
            &format!("/delete_favorite/{}", filename),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(deleted["message"], "Favorite deleted successfully");

        let (_, listed) = send_json(&app, Method::GET, "/get_favorites", None).await;
        assert_eq!(listed, json!([]));
    }

    #[tokio::test]
    async fn test_saved_preview_is_served() {
        let (_dir, app) = app().await;
        let image = b"\x89PNG\r\n\x1a\nimage-bytes".to_vec();
        let preview = format!(
            "data:image/png;base64,{}",
            general_purpose::STANDARD.encode(&image)
        );

        let (status, saved) = send_json(
            &app,
            Method::POST,
            "/save_favorite",
            Some(json!({"shape": "tall", "preview": preview})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let path = saved["preview"].as_str().unwrap().to_string();
        assert!(path.starts_with("/saved_favorites/previews/preview_"));

        let (_, listed) = send_json(&app, Method::GET, "/get_favorites", None).await;
        assert_eq!(listed[0]["preview"], json!(path));

        let (status, bytes) = send(&app, Method::GET, &path, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(bytes, image);
    }

    #[tokio::test]
    async fn test_malformed_preview_reports_warning() {
        let (_dir, app) = app().await;

        let (status, saved) = send_json(
            &app,
            Method::POST,
            "/save_favorite",
            Some(json!({"shape": "tall", "preview": "garbage"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(saved["preview"], Value::Null);
        assert_eq!(saved["warnings"].as_array().unwrap().len(), 1);

        let (_, listed) = send_json(&app, Method::GET, "/get_favorites", None).await;
        assert_eq!(listed[0]["preview"], Value::Null);
    }

    #[tokio::test]
    async fn test_invalid_bodies_are_bad_requests() {
        let (_dir, app) = app().await;

        for body in [None, Some("{not json".to_string()), Some("{}".to_string()), Some("[1]".to_string())] {
            let (status, bytes) = send(&app, Method::POST, "/save_favorite", body).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            let error: Value = serde_json::from_slice(&bytes).unwrap();
            assert_eq!(error["status"], 400);
        }

        let (_, listed) = send_json(&app, Method::GET, "/get_favorites", None).await;
        assert_eq!(listed, json!([]));
    }

    #[tokio::test]
    async fn test_oversized_body_is_rejected() {
        let (_dir, app) = app_with_limit(1024).await;
        let body = json!({"color": "blue", "notes": "x".repeat(4096)});

        let (status, _) = send(&app, Method::POST, "/save_favorite", Some(body.to_string())).await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);

        let (_, listed) = send_json(&app, Method::GET, "/get_favorites", None).await;
        assert_eq!(listed, json!([]));
    }

    #[tokio::test]
    async fn test_delete_directory_is_not_found() {
        let (dir, app) = app().await;
        std::fs::create_dir(dir.path().join("dir.json")).unwrap();

        let (status, body) = send_json(&app, Method::DELETE, "/delete_favorite/dir.json", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["status"], 404);
    }

    #[tokio::test]
    async fn test_delete_unknown_is_not_found() {
        let (_dir, app) = app().await;

        let (status, body) = send_json(
            &app,
            Method::DELETE,
            "/delete_favorite/favorite_20000101_000000.json",
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["status"], 404);
    }

    #[tokio::test]
    async fn test_corrupt_document_fails_listing() {
        let (dir, app) = app().await;
        std::fs::write(dir.path().join("favorite_bad.json"), b"{").unwrap();

        let (status, body) = send_json(&app, Method::GET, "/get_favorites", None).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["error"].as_str().unwrap().contains("favorite_bad.json"));
    }

    #[tokio::test]
    async fn test_missing_preview_is_not_found() {
        let (_dir, app) = app().await;
        let (status, _) = send(&app, Method::GET, "/saved_favorites/previews/preview_none.png", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_health_endpoints() {
        let (_dir, app) = app().await;

        let (status, body) = send_json(&app, Method::GET, "/healthz", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"status": "ok"}));

        let (status, body) = send_json(&app, Method::GET, "/readyz", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["checks"]["disk"]["ok"], true);
        assert_eq!(body["checks"]["previews"]["ok"], true);
    }
}
