//! Compression policy for upload bodies.
//!
//! Textual payloads are brotli-compressed and sent with
//! `Content-Encoding: br`. Everything else goes out as-is.

use once_cell::sync::Lazy;
use regex::Regex;
use std::io::Write;

/// Default brotli quality (0-11).
pub const DEFAULT_BROTLI_QUALITY: u32 = 9;

const BROTLI_BUFFER_SIZE: usize = 4096;
const BROTLI_LG_WINDOW: u32 = 22;

/// `text/*`, `application/json`, and any `+json`, `+text` or `+xml` subtype.
/// Parameters after `;` are ignored.
static TEXTUAL_MIME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*(text/[^;\s]+|application/json|[^;\s/]+/[^;\s]+\+(json|text|xml))\s*(;.*)?$")
        .expect("textual MIME pattern is valid")
});

/// Whether a payload of this content type should be compressed.
pub fn is_compressible(content_type: &str) -> bool {
    TEXTUAL_MIME.is_match(content_type)
}

/// Brotli-compress `bytes` at `quality` (clamped to 0-11).
pub fn brotli_compress(bytes: &[u8], quality: u32) -> std::io::Result<Vec<u8>> {
    let mut writer = brotli::CompressorWriter::new(
        Vec::with_capacity(bytes.len() / 4 + 64),
        BROTLI_BUFFER_SIZE,
        quality.min(11),
        BROTLI_LG_WINDOW,
    );
    writer.write_all(bytes)?;
    writer.flush()?;
    Ok(writer.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    #[test]
    fn test_textual_types() {
        for ct in [
            "text/plain",
            "text/html; charset=utf-8",
            "application/json",
            "application/vnd.api+json",
            "image/svg+xml",
            "application/x-trace+text",
            "TEXT/CSV",
        ] {
            assert!(is_compressible(ct), "{ct} should be compressible");
        }
    }

    #[test]
    fn test_binary_types() {
        for ct in [
            "image/png",
            "video/webm",
            "application/octet-stream",
            "application/zip",
            "application/jsonp",
            "",
        ] {
            assert!(!is_compressible(ct), "{ct} should not be compressible");
        }
    }

    #[test]
    fn test_brotli_round_trip() {
        let input = "{\"tests\":[]}".repeat(200);
        let compressed = brotli_compress(input.as_bytes(), DEFAULT_BROTLI_QUALITY).unwrap();
        assert!(compressed.len() < input.len());

        let mut decoded = Vec::new();
        brotli::Decompressor::new(&compressed[..], BROTLI_BUFFER_SIZE)
            .read_to_end(&mut decoded)
            .unwrap();
        assert_eq!(decoded, input.as_bytes());
    }
}
