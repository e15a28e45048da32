//! HTTP handlers for saving, listing and deleting favorites, plus the preview
//! image route. Storage concerns live in `FavoritesService`.

use crate::{
    errors::AppError,
    models::favorite::{Favorite, SaveOutcome},
    services::favorites_service::{FavoritesService, parse_favorite_payload},
};
use axum::{
    Json,
    body::{Body, Bytes},
    extract::{Path, State},
    http::{HeaderValue, StatusCode, header},
    response::Response,
};
use serde::Serialize;
use tokio_util::io::ReaderStream;

#[derive(Debug, Serialize)]
pub struct SaveFavoriteResponse {
    pub message: &'static str,
    #[serde(flatten)]
    pub outcome: SaveOutcome,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

/// `POST /save_favorite`
///
/// The body is parsed by hand so that any malformed input, including a
/// missing content type, is a plain 400.
pub async fn save_favorite(
    State(service): State<FavoritesService>,
    body: Bytes,
) -> Result<Json<SaveFavoriteResponse>, AppError> {
    let payload = parse_favorite_payload(&body)?;
    let outcome = service.save_favorite(payload).await?;

    Ok(Json(SaveFavoriteResponse {
        message: "Favorite saved successfully",
        outcome,
    }))
}

/// `GET /get_favorites`
pub async fn get_favorites(
    State(service): State<FavoritesService>,
) -> Result<Json<Vec<Favorite>>, AppError> {
    Ok(Json(service.list_favorites().await?))
}

/// `DELETE /delete_favorite/{filename}`
pub async fn delete_favorite(
    State(service): State<FavoritesService>,
    Path(filename): Path<String>,
) -> Result<Json<MessageResponse>, AppError> {
    service.delete_favorite(&filename).await?;
    Ok(Json(MessageResponse {
        message: "Favorite deleted successfully",
    }))
}

/// `GET /saved_favorites/previews/{name}`: stream a stored preview image.
pub async fn get_preview(
    State(service): State<FavoritesService>,
    Path(name): Path<String>,
) -> Result<Response, AppError> {
    let (file, len) = service.open_preview(&name).await?;
    let body = Body::from_stream(ReaderStream::new(file));

    let mut response = Response::new(body);
    *response.status_mut() = StatusCode::OK;
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("image/png"));
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(len));

    Ok(response)
}
