use std::sync::Arc;

use axum::http::StatusCode;
use axum::Json;
use common::SongRecord;
use serde::Serialize;

use crate::resolve::UrlResolver;

/// Shared by every handler. The catalog is loaded once and never mutated.
#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<Vec<SongRecord>>,
    pub resolver: Arc<UrlResolver>,
    pub default_cover: Arc<str>,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub songs: usize,
}

#[derive(Serialize, Debug, PartialEq, Eq)]
pub struct PlaylistView {
    pub name: String,
    pub id: String,
}

pub type JsonResult<T> = Result<Json<T>, (StatusCode, Json<ErrorResponse>)>;
