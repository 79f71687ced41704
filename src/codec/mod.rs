//! Image payload encoding.
//!
//! The host scripting layer only accepts text, so every successful result
//! goes through the same pipeline:
//!
//! ```text
//! file path / content handle
//!   → bytes            (filesystem or ContentResolver)
//!   → pixel buffer     (image::load_from_memory)
//!   → PNG bytes        (lossless, best compression)
//!   → base64 text      (standard alphabet, padded, unwrapped)
//! ```
//!
//! Pixel data survives the trip; the original container format does not.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use base64::Engine;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::DynamicImage;

use crate::dispatch::ContentHandle;

/// Errors from reading, decoding, or re-encoding an image payload.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("failed to read image payload: {0}")]
    Io(#[from] io::Error),

    #[error("failed to decode image: {0}")]
    Decode(#[source] image::ImageError),

    #[error("failed to encode image: {0}")]
    Encode(#[source] image::ImageError),

    #[error("no image payload was delivered")]
    MissingPayload,
}

/// Collaborator that opens picked content.
pub trait ContentResolver: Send + Sync {
    fn open(&self, handle: &ContentHandle) -> io::Result<Vec<u8>>;
}

/// Resolves `file://` URIs and bare paths from the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileContentResolver;

impl FileContentResolver {
    fn path_of(handle: &ContentHandle) -> io::Result<PathBuf> {
        let uri = handle.as_str();
        if let Some(path) = uri.strip_prefix("file://") {
            return Ok(PathBuf::from(path));
        }
        if uri.contains("://") {
            return Err(io::Error::new(
                io::ErrorKind::Unsupported,
                format!("unsupported content scheme: {}", uri),
            ));
        }
        Ok(PathBuf::from(uri))
    }
}

impl ContentResolver for FileContentResolver {
    fn open(&self, handle: &ContentHandle) -> io::Result<Vec<u8>> {
        fs::read(Self::path_of(handle)?)
    }
}

/// Decode an encoded image into a pixel buffer.
pub fn decode_bytes(bytes: &[u8]) -> Result<DynamicImage, CodecError> {
    image::load_from_memory(bytes).map_err(CodecError::Decode)
}

/// Re-encode as PNG with the best compression setting.
pub fn encode_lossless(image: &DynamicImage) -> Result<Vec<u8>, CodecError> {
    let mut buf = Vec::new();
    let encoder = PngEncoder::new_with_quality(&mut buf, CompressionType::Best, FilterType::Adaptive);
    image.write_with_encoder(encoder).map_err(CodecError::Encode)?;
    Ok(buf)
}

/// Standard base64 with padding and no line breaks.
pub fn to_text(bytes: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

/// Runs the full pipeline for file paths and content handles.
#[derive(Clone)]
pub struct PayloadEncoder {
    resolver: Arc<dyn ContentResolver>,
}

impl PayloadEncoder {
    pub fn new(resolver: Arc<dyn ContentResolver>) -> Self {
        Self { resolver }
    }

    pub fn encode_file(&self, path: &Path) -> Result<String, CodecError> {
        let bytes = fs::read(path)?;
        self.encode_bytes(&bytes)
    }

    pub fn encode_content(&self, handle: &ContentHandle) -> Result<String, CodecError> {
        let bytes = self.resolver.open(handle)?;
        self.encode_bytes(&bytes)
    }

    fn encode_bytes(&self, bytes: &[u8]) -> Result<String, CodecError> {
        let image = decode_bytes(bytes)?;
        let png = encode_lossless(&image)?;
        log::debug!(
            "Re-encoded {}x{} image into {} PNG bytes",
            image.width(),
            image.height(),
            png.len()
        );
        Ok(to_text(&png))
    }
}

impl std::fmt::Debug for PayloadEncoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PayloadEncoder").finish_non_exhaustive()
    }
}
