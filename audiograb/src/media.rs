//! Content-type inference for stored artifacts.

use std::path::Path;

use mime_guess::MimeGuess;

/// Fallback for anything the extension table does not know.
pub const OCTET_STREAM: &str = "application/octet-stream";

/// Caption extensions the transcript fetcher can produce.
pub const CAPTION_SUFFIXES: [&str; 2] = [".srt", ".vtt"];

/// Caption format that is returned as raw text instead of a file stream.
const TEXT_CAPTION_SUFFIX: &str = ".vtt";

/// Overrides applied before the generic table. SubRip is served as plain
/// text so browsers display it instead of offering a download.
const CAPTION_TYPES: [(&str, &str); 2] = [("vtt", "text/vtt"), ("srt", "text/plain")];

/// Guess the transport content type of an artifact from its extension.
pub fn guess_media_type(name: &str) -> String {
    let ext = Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    if let Some(ext) = ext.as_deref() {
        if let Some((_, mime)) = CAPTION_TYPES.iter().find(|(e, _)| *e == ext) {
            return (*mime).to_string();
        }
    }

    MimeGuess::from_path(name)
        .first()
        .map(|m| m.essence_str().to_string())
        .unwrap_or_else(|| OCTET_STREAM.to_string())
}

/// Whether an artifact is served as inline UTF-8 text with a plain-text type.
pub fn is_text_caption(name: &str) -> bool {
    name.ends_with(TEXT_CAPTION_SUFFIX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audio_types() {
        assert!(guess_media_type("1700000000000.25.m4a").starts_with("audio/"));
        assert_eq!(guess_media_type("track.mp3"), "audio/mpeg");
    }

    #[test]
    fn test_caption_overrides() {
        assert_eq!(guess_media_type("1700000000000.25.en.vtt"), "text/vtt");
        assert_eq!(guess_media_type("1700000000000.25.en.srt"), "text/plain");
        assert_eq!(guess_media_type("SHOUTY.SRT"), "text/plain");
    }

    #[test]
    fn test_unknown_extension_falls_back() {
        assert_eq!(guess_media_type("blob.zzzunknown"), OCTET_STREAM);
        assert_eq!(guess_media_type("no_extension"), OCTET_STREAM);
    }

    #[test]
    fn test_text_caption_detection() {
        assert!(is_text_caption("1700000000000.25.en.vtt"));
        assert!(!is_text_caption("1700000000000.25.en.srt"));
        assert!(!is_text_caption("1700000000000.25.m4a"));
    }
}
