use serde::{Deserialize, Serialize};

pub const DEFAULT_SOURCE_PREFIX: &str = "playlists/";
pub const AUDIO_EXTENSION: &str = ".mp3";
pub const COVERS_PREFIX: &str = "covers/";
pub const COVER_EXTENSION: &str = ".jpg";
pub const CATALOG_KEY: &str = "metadata.json";
pub const UNKNOWN_ARTIST: &str = "Unknown Artist";
pub const UNKNOWN_ALBUM: &str = "Unknown Album";
pub const DEFAULT_COVER: &str = "default-cover.jpg";

/// One catalog entry. Field order is the serialized key order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SongRecord {
    pub playlist: String,
    pub name: String,
    pub artist: String,
    pub album: String,
    pub filename: String,
    pub cover: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl SongRecord {
    /// Record used when a song's tags could not be read.
    pub fn degraded(playlist: &str, filename: &str) -> Self {
        Self {
            playlist: playlist.to_string(),
            name: filename.to_string(),
            artist: UNKNOWN_ARTIST.to_string(),
            album: UNKNOWN_ALBUM.to_string(),
            filename: filename.to_string(),
            cover: None,
            url: None,
        }
    }

    /// Object key the serving side re-derives for this record.
    pub fn song_key(&self, prefix: &str) -> String {
        song_key(prefix, &self.playlist, &self.filename)
    }
}

pub type Catalog = Vec<SongRecord>;

/// An audio object discovered by listing the bucket.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InventoryItem {
    pub key: String,
    pub size: u64,
}

pub fn is_audio_key(key: &str) -> bool {
    key.ends_with(AUDIO_EXTENSION)
}

/// Base name of a key with the audio extension stripped.
pub fn filename_stem(key: &str) -> String {
    let base = key.rsplit('/').next().unwrap_or(key);
    base.strip_suffix(AUDIO_EXTENSION).unwrap_or(base).to_string()
}

/// Path segment directly under the source prefix.
///
/// `playlists/Rock/track1.mp3` yields `Rock`. Keys sitting directly under the
/// prefix have no playlist segment and yield an empty string.
pub fn playlist_from_key(prefix: &str, key: &str) -> String {
    let rest = key.strip_prefix(prefix).unwrap_or(key);
    let rest = rest.trim_start_matches('/');
    let mut parts = rest.split('/');
    match (parts.next(), parts.next()) {
        (Some(first), Some(_)) => first.to_string(),
        _ => String::new(),
    }
}

pub fn song_key(prefix: &str, playlist: &str, filename: &str) -> String {
    let prefix = prefix.trim_end_matches('/');
    format!("{}/{}/{}{}", prefix, playlist, filename, AUDIO_EXTENSION)
}

pub fn sanitize_cover_name(name: &str) -> String {
    name.chars()
        .map(|ch| if ch.is_ascii_alphanumeric() { ch } else { '_' })
        .collect()
}

pub fn cover_key(filename: &str) -> String {
    format!("{}{}{}", COVERS_PREFIX, sanitize_cover_name(filename), COVER_EXTENSION)
}

/// Distinct playlist names in first-seen order.
pub fn playlist_names(catalog: &[SongRecord]) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for record in catalog {
        if !names.iter().any(|name| name == &record.playlist) {
            names.push(record.playlist.clone());
        }
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn playlist_is_second_segment() {
        assert_eq!(playlist_from_key("playlists/", "playlists/Rock/track1.mp3"), "Rock");
        assert_eq!(playlist_from_key("playlists", "playlists/Lo Fi/a/b.mp3"), "Lo Fi");
        assert_eq!(playlist_from_key("playlists/", "playlists/loose.mp3"), "");
    }

    #[test]
    fn filename_strips_directory_and_extension() {
        assert_eq!(filename_stem("playlists/Pop/Song A.mp3"), "Song A");
        assert_eq!(filename_stem("top.mp3"), "top");
        assert_eq!(filename_stem("playlists/Pop/notes.txt"), "notes.txt");
    }

    #[test]
    fn sanitizes_everything_outside_ascii_alphanumerics() {
        assert_eq!(sanitize_cover_name("Song A"), "Song_A");
        assert_eq!(sanitize_cover_name("Déjà-vu (Live)"), "D_j__vu__Live_");
        assert_eq!(cover_key("Song A"), "covers/Song_A.jpg");
    }

    #[test]
    fn song_key_round_trips_through_derivation() {
        let key = "playlists/Rock/track1.mp3";
        let record = SongRecord::degraded(
            &playlist_from_key(DEFAULT_SOURCE_PREFIX, key),
            &filename_stem(key),
        );
        assert_eq!(record.song_key(DEFAULT_SOURCE_PREFIX), key);
    }

    #[test]
    fn degraded_record_uses_sentinels() {
        let record = SongRecord::degraded("Pop", "Song A");
        assert_eq!(record.name, "Song A");
        assert_eq!(record.artist, UNKNOWN_ARTIST);
        assert_eq!(record.album, UNKNOWN_ALBUM);
        assert_eq!(record.cover, None);
    }

    #[test]
    fn url_is_omitted_but_cover_is_null() {
        let record = SongRecord::degraded("Pop", "Song A");
        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(
            json,
            r#"{"playlist":"Pop","name":"Song A","artist":"Unknown Artist","album":"Unknown Album","filename":"Song A","cover":null}"#
        );
    }

    #[test]
    fn catalog_round_trip_preserves_order() {
        let mut first = SongRecord::degraded("Pop", "b");
        first.cover = Some("https://cdn.example/covers/b.jpg".to_string());
        let mut second = SongRecord::degraded("Rock", "a");
        second.url = Some("https://cdn.example/playlists/Rock/a.mp3".to_string());
        let catalog: Catalog = vec![first, second];
        let text = serde_json::to_string_pretty(&catalog).unwrap();
        let parsed: Catalog = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed, catalog);
    }

    #[test]
    fn playlist_names_keep_first_seen_order() {
        let catalog = vec![
            SongRecord::degraded("Rock", "a"),
            SongRecord::degraded("Pop", "b"),
            SongRecord::degraded("Rock", "c"),
        ];
        assert_eq!(playlist_names(&catalog), vec!["Rock", "Pop"]);
    }
}
