//! `data:<mime>;base64,<payload>` encoding.

use crate::{CodecError, ImageFormat, RawImage, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

const SCHEME: &str = "data:";
const BASE64_MARKER: &str = ";base64,";

/// Encode a buffer as a self-describing data URI.
///
/// # Example
/// ```
/// use backdrop_image::{encode_data_uri, ImageFormat, RawImage};
///
/// let raw = RawImage::new(vec![1u8, 2, 3], ImageFormat::Png);
/// assert_eq!(encode_data_uri(&raw), "data:image/png;base64,AQID");
/// ```
pub fn encode_data_uri(raw: &RawImage) -> String {
    let payload = STANDARD.encode(raw.data());
    let mime = raw.mime_type();

    let mut uri = String::with_capacity(SCHEME.len() + mime.len() + BASE64_MARKER.len() + payload.len());
    uri.push_str(SCHEME);
    uri.push_str(mime);
    uri.push_str(BASE64_MARKER);
    uri.push_str(&payload);
    uri
}

/// Parse a base64 data URI back into a buffer.
///
/// The declared MIME type wins when it is a known image type; otherwise the
/// format is sniffed from the payload.
pub fn decode_data_uri(uri: &str) -> Result<RawImage> {
    let rest = uri
        .strip_prefix(SCHEME)
        .ok_or_else(|| CodecError::InvalidDataUri("missing data: scheme".into()))?;
    let (mime, payload) = rest
        .split_once(BASE64_MARKER)
        .ok_or_else(|| CodecError::InvalidDataUri("only base64 payloads are supported".into()))?;

    let bytes = STANDARD.decode(payload.trim())?;
    if bytes.is_empty() {
        return Err(CodecError::InvalidDataUri("empty payload".into()));
    }

    match ImageFormat::from_mime(mime) {
        Some(format) => Ok(RawImage::new(bytes, format)),
        None => RawImage::from_bytes(bytes),
    }
}
