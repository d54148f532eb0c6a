//! `canvas` stream frames: base64 image payloads, optionally wrapped in a data URL.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Jpeg,
    Png,
    Unknown,
}

#[derive(Debug, Clone)]
pub struct StreamImage {
    pub kind: ImageKind,
    pub bytes: Vec<u8>,
}

/// Decode one frame. `data:image/...;base64,` prefixes and surrounding whitespace are dropped.
pub fn decode_frame(text: &str) -> Result<StreamImage, base64::DecodeError> {
    let payload = match text.find(";base64,") {
        Some(pos) if text.starts_with("data:") => &text[pos + ";base64,".len()..],
        _ => text,
    };
    let bytes = STANDARD.decode(payload.trim())?;
    Ok(StreamImage {
        kind: sniff(&bytes),
        bytes,
    })
}

fn sniff(bytes: &[u8]) -> ImageKind {
    if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        ImageKind::Jpeg
    } else if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
        ImageKind::Png
    } else {
        ImageKind::Unknown
    }
}
