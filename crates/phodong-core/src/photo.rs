//! Uploaded photos: normalized to an RGB JPEG thumbnail and kept base64-encoded,
//! the form both the Gemini `inlineData` part and the card `<img>` data URI want.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use image::codecs::jpeg::JpegEncoder;

/// Longest edge after thumbnailing.
pub const MAX_EDGE: u32 = 800;
pub const JPEG_QUALITY: u8 = 85;

#[derive(Debug, thiserror::Error)]
pub enum PhotoError {
    #[error("empty upload")]
    Empty,
    #[error("could not decode image: {0}")]
    Decode(#[source] image::ImageError),
    #[error("could not encode JPEG: {0}")]
    Encode(#[source] image::ImageError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Photo {
    mime_type: String,
    data_b64: String,
}

impl Photo {
    /// Decode any supported upload, convert to RGB, shrink to fit
    /// `MAX_EDGE`×`MAX_EDGE` and re-encode as JPEG.
    pub fn from_upload(bytes: &[u8]) -> Result<Self, PhotoError> {
        if bytes.is_empty() {
            return Err(PhotoError::Empty);
        }
        let decoded = image::load_from_memory(bytes).map_err(PhotoError::Decode)?;
        let decoded = if decoded.width() > MAX_EDGE || decoded.height() > MAX_EDGE {
            decoded.thumbnail(MAX_EDGE, MAX_EDGE)
        } else {
            decoded
        };
        let rgb = decoded.to_rgb8();

        let mut jpeg = Vec::new();
        JpegEncoder::new_with_quality(&mut jpeg, JPEG_QUALITY)
            .encode_image(&rgb)
            .map_err(PhotoError::Encode)?;

        Ok(Self {
            mime_type: "image/jpeg".to_string(),
            data_b64: BASE64.encode(jpeg),
        })
    }

    /// Wrap already-encoded data without re-processing it.
    pub fn from_base64(mime_type: &str, data_b64: &str) -> Self {
        Self {
            mime_type: mime_type.to_string(),
            data_b64: data_b64.to_string(),
        }
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn data_b64(&self) -> &str {
        &self.data_b64
    }

    pub fn data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.data_b64)
    }
}
