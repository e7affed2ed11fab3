use axum::extract::{Path as AxumPath, State};
use axum::Json;
use common::{playlist_names, SongRecord};

use crate::state::{AppState, PlaylistView};

const PLAYLIST_ID_PREFIX: &str = "playlists/";

pub async fn list_playlists(State(state): State<AppState>) -> Json<Vec<PlaylistView>> {
    let items = playlist_names(&state.catalog)
        .into_iter()
        .map(|name| PlaylistView {
            id: format!("{}{}", PLAYLIST_ID_PREFIX, name),
            name,
        })
        .collect();
    Json(items)
}

pub async fn list_playlist_songs(
    State(state): State<AppState>,
    AxumPath(playlist_id): AxumPath<String>,
) -> Json<Vec<SongRecord>> {
    let playlist = playlist_name_from_id(&playlist_id);
    let mut items = Vec::new();
    for song in state.catalog.iter().filter(|song| song.playlist == playlist) {
        let mut view = resolved(&state, song).await;
        if view.cover.is_none() {
            view.cover = Some(state.default_cover.to_string());
        }
        items.push(view);
    }
    Json(items)
}

pub async fn list_all_songs(State(state): State<AppState>) -> Json<Vec<SongRecord>> {
    let mut items = Vec::with_capacity(state.catalog.len());
    for song in state.catalog.iter() {
        items.push(resolved(&state, song).await);
    }
    Json(items)
}

async fn resolved(state: &AppState, song: &SongRecord) -> SongRecord {
    let mut view = song.clone();
    view.url = state.resolver.resolve(song).await;
    view
}

/// Accepts both `Rock` and the listed id form `playlists/Rock`.
fn playlist_name_from_id(id: &str) -> &str {
    let id = id.trim_start_matches('/');
    id.strip_prefix(PLAYLIST_ID_PREFIX).unwrap_or(id)
}
