pub mod songs;

use axum::{http::StatusCode, response::IntoResponse, routing::get, Json, Router};

use crate::state::{AppState, HealthResponse, JsonResult};
use crate::utils::json_error;

pub fn api_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(banner))
        .route("/health", get(health))
        .route("/playlists", get(songs::list_playlists))
        .route("/playlists/*playlist_id", get(songs::list_playlist_songs))
        .route("/all-songs", get(songs::list_all_songs))
        .fallback(not_found)
        .with_state(state)
}

async fn banner() -> &'static str {
    "Sangeet catalog server is running"
}

async fn health(axum::extract::State(state): axum::extract::State<AppState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        songs: state.catalog.len(),
    })
}

async fn not_found() -> JsonResult<()> {
    Err(json_error(StatusCode::NOT_FOUND, "not found"))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use catalog::UrlPolicy;
    use common::SongRecord;
    use serde_json::Value;
    use tower::ServiceExt;

    use super::api_router;
    use crate::resolve::UrlResolver;
    use crate::state::AppState;

    fn record(playlist: &str, filename: &str, cover: Option<&str>) -> SongRecord {
        let mut record = SongRecord::degraded(playlist, filename);
        record.cover = cover.map(|c| c.to_string());
        record
    }

    fn state() -> AppState {
        AppState {
            catalog: Arc::new(vec![
                record("Rock", "a", Some("https://pub.example.dev/covers/a.jpg")),
                record("Pop", "b", None),
                record("Rock", "c d", None),
            ]),
            resolver: Arc::new(UrlResolver::new(
                UrlPolicy::Public,
                "playlists/",
                None,
                Some("https://pub.example.dev".to_string()),
                Duration::from_secs(3600),
            )),
            default_cover: Arc::from("default-cover.jpg"),
        }
    }

    async fn get_json(uri: &str) -> (StatusCode, Value) {
        let response = api_router(state())
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn lists_distinct_playlists() {
        let (status, body) = get_json("/playlists").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            serde_json::json!([
                { "name": "Rock", "id": "playlists/Rock" },
                { "name": "Pop", "id": "playlists/Pop" }
            ])
        );
    }

    #[tokio::test]
    async fn playlist_songs_accept_prefixed_ids() {
        for uri in ["/playlists/Rock", "/playlists/playlists/Rock", "/playlists/playlists%2FRock"] {
            let (status, body) = get_json(uri).await;
            assert_eq!(status, StatusCode::OK, "{}", uri);
            let songs = body.as_array().unwrap();
            assert_eq!(songs.len(), 2, "{}", uri);
            assert_eq!(songs[0]["cover"], "https://pub.example.dev/covers/a.jpg");
            assert_eq!(songs[1]["cover"], "default-cover.jpg");
            assert_eq!(songs[1]["url"], "https://pub.example.dev/playlists/Rock/c%20d.mp3");
        }
    }

    #[tokio::test]
    async fn unknown_playlist_is_empty() {
        let (status, body) = get_json("/playlists/Jazz").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, serde_json::json!([]));
    }

    #[tokio::test]
    async fn all_songs_resolve_urls_and_keep_null_covers() {
        let (status, body) = get_json("/all-songs").await;
        assert_eq!(status, StatusCode::OK);
        let songs = body.as_array().unwrap();
        assert_eq!(songs.len(), 3);
        assert_eq!(songs[1]["url"], "https://pub.example.dev/playlists/Pop/b.mp3");
        assert_eq!(songs[1]["cover"], Value::Null);
    }

    #[tokio::test]
    async fn health_reports_song_count() {
        let (status, body) = get_json("/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["songs"], 3);
    }

    #[tokio::test]
    async fn unknown_route_is_json_404() {
        let (status, body) = get_json("/nope").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "not found");
    }
}
