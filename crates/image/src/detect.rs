//! Format sniffing from leading bytes.

use crate::{CodecError, Result};

/// Formats the pipeline can recognize. Only some of them can be decoded
/// directly; HEIF containers are converted first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    /// JPEG
    Jpeg,
    /// PNG
    Png,
    /// GIF
    Gif,
    /// WebP
    WebP,
    /// AVIF, recognized but not decoded
    Avif,
    /// BMP, recognized but not decoded
    Bmp,
    /// TIFF, recognized but not decoded
    Tiff,
    /// HEIC or HEIF, as produced by phone cameras
    Heic,
}

impl ImageFormat {
    /// Canonical MIME type, as used in data URIs.
    pub fn mime_type(&self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::Png => "image/png",
            ImageFormat::Gif => "image/gif",
            ImageFormat::WebP => "image/webp",
            ImageFormat::Avif => "image/avif",
            ImageFormat::Bmp => "image/bmp",
            ImageFormat::Tiff => "image/tiff",
            ImageFormat::Heic => "image/heic",
        }
    }

    /// File extension for written artifacts.
    pub fn extension(&self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "jpg",
            ImageFormat::Tiff => "tiff",
            other => other.mime_type().trim_start_matches("image/"),
        }
    }

    /// Parse a declared MIME type. Case and parameters are ignored, and the
    /// common aliases browsers send are accepted.
    pub fn from_mime(mime: &str) -> Option<Self> {
        let essence = mime.split(';').next()?.trim().to_ascii_lowercase();
        let format = match essence.as_str() {
            "image/jpg" | "image/pjpeg" => ImageFormat::Jpeg,
            "image/heif" | "image/heic-sequence" | "image/heif-sequence" => ImageFormat::Heic,
            other => *ALL.iter().find(|format| format.mime_type() == other)?,
        };
        Some(format)
    }

    /// Whether the format can carry an alpha channel.
    pub fn supports_alpha(&self) -> bool {
        !matches!(self, ImageFormat::Jpeg | ImageFormat::Bmp)
    }

    /// Matching `image` crate format, for the formats the codec decodes.
    pub(crate) fn to_image_format(self) -> Option<image::ImageFormat> {
        match self {
            ImageFormat::Jpeg => Some(image::ImageFormat::Jpeg),
            ImageFormat::Png => Some(image::ImageFormat::Png),
            ImageFormat::Gif => Some(image::ImageFormat::Gif),
            ImageFormat::WebP => Some(image::ImageFormat::WebP),
            _ => None,
        }
    }
}

const ALL: [ImageFormat; 8] = [
    ImageFormat::Jpeg,
    ImageFormat::Png,
    ImageFormat::Gif,
    ImageFormat::WebP,
    ImageFormat::Avif,
    ImageFormat::Bmp,
    ImageFormat::Tiff,
    ImageFormat::Heic,
];

impl std::fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.mime_type())
    }
}

/// Leading-byte signatures
const PREFIXES: &[(&[u8], ImageFormat)] = &[
    (&[0xFF, 0xD8, 0xFF], ImageFormat::Jpeg),
    (b"\x89PNG\r\n\x1a\n", ImageFormat::Png),
    (b"GIF87a", ImageFormat::Gif),
    (b"GIF89a", ImageFormat::Gif),
    (b"II*\0", ImageFormat::Tiff),
    (b"MM\0*", ImageFormat::Tiff),
    (b"BM", ImageFormat::Bmp),
];

/// ISO-BMFF major brands, found at bytes 8..12 after `ftyp`
const BRANDS: &[(&[u8; 4], ImageFormat)] = &[
    (b"avif", ImageFormat::Avif),
    (b"avis", ImageFormat::Avif),
    (b"heic", ImageFormat::Heic),
    (b"heix", ImageFormat::Heic),
    (b"hevc", ImageFormat::Heic),
    (b"hevx", ImageFormat::Heic),
    (b"heim", ImageFormat::Heic),
    (b"heis", ImageFormat::Heic),
    (b"mif1", ImageFormat::Heic),
    (b"msf1", ImageFormat::Heic),
];

/// Identify an image from its first bytes.
///
/// Twelve bytes are enough for every supported format.
///
/// ```
/// use backdrop_image::{detect_format, ImageFormat};
///
/// assert_eq!(detect_format(&[0xFF, 0xD8, 0xFF, 0xE0]).unwrap(), ImageFormat::Jpeg);
/// assert_eq!(detect_format(b"\0\0\0\x18ftypheic").unwrap(), ImageFormat::Heic);
/// ```
pub fn detect_format(data: &[u8]) -> Result<ImageFormat> {
    if data.len() < 4 {
        return Err(CodecError::InvalidData("too short to identify".into()));
    }

    if let Some((_, format)) = PREFIXES.iter().find(|(magic, _)| data.starts_with(magic)) {
        return Ok(*format);
    }

    match (data.get(0..4), data.get(4..8), data.get(8..12)) {
        (Some(b"RIFF"), _, Some(b"WEBP")) => Ok(ImageFormat::WebP),
        (_, Some(b"ftyp"), Some(brand)) => BRANDS
            .iter()
            .find(|(known, _)| known.as_slice() == brand)
            .map(|(_, format)| *format)
            .ok_or(CodecError::UnknownFormat),
        _ => Err(CodecError::UnknownFormat),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_jpeg() {
        let data = [0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, 0x4A, 0x46, 0x49, 0x46];
        assert_eq!(detect_format(&data).unwrap(), ImageFormat::Jpeg);
    }

    #[test]
    fn test_detect_png() {
        let data = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00];
        assert_eq!(detect_format(&data).unwrap(), ImageFormat::Png);
    }

    #[test]
    fn test_detect_webp() {
        assert_eq!(detect_format(b"RIFF\x00\x00\x00\x00WEBP").unwrap(), ImageFormat::WebP);
        assert!(detect_format(b"RIFF\x00\x00\x00\x00WAVE").is_err());
    }

    #[test]
    fn test_detect_heic_brands() {
        assert_eq!(detect_format(b"\x00\x00\x00\x18ftypheic\x00\x00").unwrap(), ImageFormat::Heic);
        assert_eq!(detect_format(b"\x00\x00\x00\x18ftypmif1\x00\x00").unwrap(), ImageFormat::Heic);
        assert_eq!(detect_format(b"\x00\x00\x00\x18ftypavif\x00\x00").unwrap(), ImageFormat::Avif);
        assert!(matches!(
            detect_format(b"\x00\x00\x00\x18ftypisom\x00\x00"),
            Err(CodecError::UnknownFormat)
        ));
    }

    #[test]
    fn test_short_or_unknown() {
        assert!(matches!(detect_format(&[0xFF, 0xD8]), Err(CodecError::InvalidData(_))));
        assert!(matches!(detect_format(&[0, 0, 0, 0]), Err(CodecError::UnknownFormat)));
    }

    #[test]
    fn test_mime_round_trip() {
        for format in ALL {
            assert_eq!(ImageFormat::from_mime(format.mime_type()), Some(format));
        }
        assert_eq!(ImageFormat::from_mime("IMAGE/PNG; charset=binary"), Some(ImageFormat::Png));
        assert_eq!(ImageFormat::from_mime("image/jpg"), Some(ImageFormat::Jpeg));
        assert_eq!(ImageFormat::from_mime("image/heif"), Some(ImageFormat::Heic));
        assert_eq!(ImageFormat::from_mime("text/plain"), None);
    }

    #[test]
    fn test_extensions() {
        assert_eq!(ImageFormat::Jpeg.extension(), "jpg");
        assert_eq!(ImageFormat::Png.extension(), "png");
        assert_eq!(ImageFormat::WebP.extension(), "webp");
        assert_eq!(ImageFormat::Heic.extension(), "heic");
    }

    #[test]
    fn test_alpha_support() {
        assert!(ImageFormat::Png.supports_alpha());
        assert!(!ImageFormat::Jpeg.supports_alpha());
    }
}
