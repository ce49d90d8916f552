use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImageFormat {
    PNG,
    JPEG,
    GIF,
    WEBP,
    BMP,
    TIFF,
}

impl ImageFormat {
    /// Detects the format from the leading magic bytes of an encoded image.
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        match image::guess_format(bytes).ok()? {
            image::ImageFormat::Png => Some(Self::PNG),
            image::ImageFormat::Jpeg => Some(Self::JPEG),
            image::ImageFormat::Gif => Some(Self::GIF),
            image::ImageFormat::WebP => Some(Self::WEBP),
            image::ImageFormat::Bmp => Some(Self::BMP),
            image::ImageFormat::Tiff => Some(Self::TIFF),
            _ => None,
        }
    }

    pub fn from_mime_type(mime_type: &str) -> Option<Self> {
        let essence = mime_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        match essence.as_str() {
            "image/png" => Some(Self::PNG),
            "image/jpeg" | "image/jpg" | "image/pjpeg" => Some(Self::JPEG),
            "image/gif" => Some(Self::GIF),
            "image/webp" => Some(Self::WEBP),
            "image/bmp" | "image/x-ms-bmp" => Some(Self::BMP),
            "image/tiff" => Some(Self::TIFF),
            _ => None,
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::PNG => "image/png",
            Self::JPEG => "image/jpeg",
            Self::GIF => "image/gif",
            Self::WEBP => "image/webp",
            Self::BMP => "image/bmp",
            Self::TIFF => "image/tiff",
        }
    }

    pub fn file_extension(&self) -> &'static str {
        match self {
            Self::PNG => "png",
            Self::JPEG => "jpg",
            Self::GIF => "gif",
            Self::WEBP => "webp",
            Self::BMP => "bmp",
            Self::TIFF => "tiff",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_MAGIC: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];
    const JPEG_MAGIC: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0, 0x10, b'J', b'F', b'I', b'F'];

    #[test]
    fn test_sniff_detects_png_and_jpeg() {
        assert_eq!(ImageFormat::sniff(PNG_MAGIC), Some(ImageFormat::PNG));
        assert_eq!(ImageFormat::sniff(JPEG_MAGIC), Some(ImageFormat::JPEG));
    }

    #[test]
    fn test_sniff_rejects_plain_text() {
        assert_eq!(ImageFormat::sniff(b"hello, this is not an image"), None);
    }

    #[test]
    fn test_from_mime_type_ignores_parameters_and_case() {
        assert_eq!(
            ImageFormat::from_mime_type("IMAGE/JPEG; charset=binary"),
            Some(ImageFormat::JPEG)
        );
        assert_eq!(ImageFormat::from_mime_type("image/jpg"), Some(ImageFormat::JPEG));
        assert_eq!(ImageFormat::from_mime_type("text/plain"), None);
    }

    #[test]
    fn test_file_extension_matches_mime_type() {
        for format in [
            ImageFormat::PNG,
            ImageFormat::JPEG,
            ImageFormat::GIF,
            ImageFormat::WEBP,
            ImageFormat::BMP,
            ImageFormat::TIFF,
        ] {
            assert_eq!(ImageFormat::from_mime_type(format.mime_type()), Some(format));
            assert!(!format.file_extension().is_empty());
        }
    }
}
