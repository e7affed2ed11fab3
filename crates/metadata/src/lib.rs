use std::io::Cursor;

use lofty::error::LoftyError;
use lofty::file::FileType;
use lofty::picture::{Picture, PictureType};
use lofty::prelude::{ItemKey, TaggedFileExt};
use lofty::probe::Probe;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TagMetadata {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub picture: Option<CoverArt>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoverArt {
    pub data: Vec<u8>,
    pub mime: Option<String>,
}

impl CoverArt {
    /// Declared or sniffed image type, `image/jpeg` when neither is known.
    pub fn content_type(&self) -> String {
        self.mime
            .clone()
            .or_else(|| guess_mime(&self.data))
            .unwrap_or_else(|| "image/jpeg".to_string())
    }
}

#[derive(Debug)]
pub enum MetadataError {
    Io(std::io::Error),
    Lofty(LoftyError),
}

impl std::fmt::Display for MetadataError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MetadataError::Io(err) => write!(f, "io error: {}", err),
            MetadataError::Lofty(err) => write!(f, "tag parse error: {}", err),
        }
    }
}

impl std::error::Error for MetadataError {}

impl From<std::io::Error> for MetadataError {
    fn from(err: std::io::Error) -> Self {
        MetadataError::Io(err)
    }
}

impl From<LoftyError> for MetadataError {
    fn from(err: LoftyError) -> Self {
        MetadataError::Lofty(err)
    }
}

/// Tag parsing seam used by the catalog builder.
pub trait TagReader: Send + Sync {
    fn read_tags(&self, bytes: &[u8], media_type: &str) -> Result<TagMetadata, MetadataError>;
}

/// [`TagReader`] backed by lofty.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoftyTagReader;

impl TagReader for LoftyTagReader {
    fn read_tags(&self, bytes: &[u8], media_type: &str) -> Result<TagMetadata, MetadataError> {
        read_tags_from_bytes(bytes, media_type)
    }
}

/// Parses the tags embedded in an in-memory audio file.
///
/// `media_type` picks the container parser; unrecognized types fall back to
/// sniffing the content.
pub fn read_tags_from_bytes(bytes: &[u8], media_type: &str) -> Result<TagMetadata, MetadataError> {
    let probe = Probe::new(Cursor::new(bytes));
    let probe = match file_type_for(media_type) {
        Some(file_type) => probe.set_file_type(file_type),
        None => probe.guess_file_type()?,
    };
    let tagged_file = probe.read()?;

    let mut info = TagMetadata::default();
    if let Some(tag) = tagged_file.primary_tag().or_else(|| tagged_file.first_tag()) {
        info.title = non_empty(tag.get_string(&ItemKey::TrackTitle));
        info.album = non_empty(tag.get_string(&ItemKey::AlbumTitle));
        info.artist = non_empty(tag.get_string(&ItemKey::TrackArtist))
            .or_else(|| non_empty(tag.get_string(&ItemKey::AlbumArtist)));
        info.picture = pick_picture(tag.pictures()).map(|picture| {
            let data = picture.data().to_vec();
            let mime = picture
                .mime_type()
                .map(|mime| mime.as_str().to_string())
                .filter(|mime| mime.starts_with("image/"))
                .or_else(|| guess_mime(&data));
            CoverArt { data, mime }
        });
    }

    Ok(info)
}

pub fn file_type_for(media_type: &str) -> Option<FileType> {
    let essence = media_type
        .split(';')
        .next()
        .unwrap_or(media_type)
        .trim()
        .to_ascii_lowercase();
    match essence.as_str() {
        "audio/mpeg" | "audio/mp3" | "audio/mpeg3" => Some(FileType::Mpeg),
        "audio/flac" | "audio/x-flac" => Some(FileType::Flac),
        "audio/ogg" | "audio/vorbis" => Some(FileType::Vorbis),
        "audio/wav" | "audio/x-wav" | "audio/wave" => Some(FileType::Wav),
        "audio/mp4" | "audio/x-m4a" | "audio/aac" => Some(FileType::Mp4),
        _ => None,
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(|v| v.to_string())
}

fn pick_picture(pictures: &[Picture]) -> Option<&Picture> {
    for picture in pictures {
        if picture.pic_type() == PictureType::CoverFront {
            return Some(picture);
        }
    }
    pictures.first()
}

pub fn guess_mime(bytes: &[u8]) -> Option<String> {
    if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some("image/jpeg".to_string())
    } else if bytes.starts_with(&[0x89, 0x50, 0x4E, 0x47]) {
        Some("image/png".to_string())
    } else if bytes.starts_with(b"GIF8") {
        Some("image/gif".to_string())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text_frame(id: &[u8; 4], value: &str) -> Vec<u8> {
        let mut body = vec![0u8];
        body.extend_from_slice(value.as_bytes());
        frame(id, &body)
    }

    fn frame(id: &[u8; 4], body: &[u8]) -> Vec<u8> {
        let mut out = id.to_vec();
        out.extend_from_slice(&(body.len() as u32).to_be_bytes());
        out.extend_from_slice(&[0, 0]);
        out.extend_from_slice(body);
        out
    }

    fn syncsafe(len: usize) -> [u8; 4] {
        let len = len as u32;
        [
            ((len >> 21) & 0x7F) as u8,
            ((len >> 14) & 0x7F) as u8,
            ((len >> 7) & 0x7F) as u8,
            (len & 0x7F) as u8,
        ]
    }

    /// ID3v2.3 tag followed by a few silent MPEG-1 Layer III frames.
    fn tagged_mp3(title: Option<&str>, artist: &str, cover: Option<&[u8]>) -> Vec<u8> {
        let mut frames = Vec::new();
        if let Some(title) = title {
            frames.extend(text_frame(b"TIT2", title));
        }
        frames.extend(text_frame(b"TPE1", artist));
        frames.extend(text_frame(b"TALB", "Y"));
        if let Some(cover) = cover {
            let mut body = vec![0u8];
            body.extend_from_slice(b"image/jpeg\0");
            body.push(0x03);
            body.push(0);
            body.extend_from_slice(cover);
            frames.extend(frame(b"APIC", &body));
        }

        let mut out = b"ID3".to_vec();
        out.extend_from_slice(&[3, 0, 0]);
        out.extend_from_slice(&syncsafe(frames.len()));
        out.extend(frames);
        for _ in 0..4 {
            let mut audio = vec![0u8; 417];
            audio[..4].copy_from_slice(&[0xFF, 0xFB, 0x90, 0x00]);
            out.extend(audio);
        }
        out
    }

    #[test]
    fn reads_id3_fields_and_front_cover() {
        let jpeg = [0xFF, 0xD8, 0xFF, 0xE0, 1, 2, 3];
        let bytes = tagged_mp3(Some("Hit"), "X", Some(&jpeg));
        let info = read_tags_from_bytes(&bytes, "audio/mpeg").unwrap();
        assert_eq!(info.title.as_deref(), Some("Hit"));
        assert_eq!(info.artist.as_deref(), Some("X"));
        assert_eq!(info.album.as_deref(), Some("Y"));
        let picture = info.picture.unwrap();
        assert_eq!(picture.data, jpeg.to_vec());
        assert_eq!(picture.content_type(), "image/jpeg");
    }

    #[test]
    fn missing_title_and_cover_stay_empty() {
        let bytes = tagged_mp3(None, "X", None);
        let info = LoftyTagReader.read_tags(&bytes, "audio/mpeg").unwrap();
        assert_eq!(info.title, None);
        assert_eq!(info.picture, None);
    }

    #[test]
    fn garbage_is_a_parse_error() {
        let bytes = b"definitely not an mpeg stream".to_vec();
        assert!(read_tags_from_bytes(&bytes, "audio/mpeg").is_err());
    }

    #[test]
    fn empty_input_is_a_parse_error() {
        assert!(read_tags_from_bytes(&[], "audio/mpeg").is_err());
        assert!(read_tags_from_bytes(&[], "application/octet-stream").is_err());
    }

    #[test]
    fn media_type_selects_container() {
        assert_eq!(file_type_for("audio/mpeg"), Some(FileType::Mpeg));
        assert_eq!(file_type_for("Audio/MPEG; charset=binary"), Some(FileType::Mpeg));
        assert_eq!(file_type_for("audio/flac"), Some(FileType::Flac));
        assert_eq!(file_type_for("application/octet-stream"), None);
    }

    #[test]
    fn sniffs_common_image_formats() {
        assert_eq!(guess_mime(&[0xFF, 0xD8, 0xFF, 0xE0]).as_deref(), Some("image/jpeg"));
        assert_eq!(guess_mime(&[0x89, b'P', b'N', b'G']).as_deref(), Some("image/png"));
        assert_eq!(guess_mime(b"hello"), None);
    }

    #[test]
    fn cover_content_type_falls_back_to_jpeg() {
        let declared = CoverArt {
            data: vec![0x89, b'P', b'N', b'G'],
            mime: Some("image/png".to_string()),
        };
        assert_eq!(declared.content_type(), "image/png");
        let sniffed = CoverArt {
            data: vec![0x89, b'P', b'N', b'G'],
            mime: None,
        };
        assert_eq!(sniffed.content_type(), "image/png");
        let unknown = CoverArt {
            data: vec![1, 2, 3],
            mime: None,
        };
        assert_eq!(unknown.content_type(), "image/jpeg");
    }
}
