//! ALFA Media Vault - Image Analyzer
//!
//! Default [`MediaAnalyzer`]: magic-byte classification, image dimensions,
//! square JPEG thumbnails and bounded JPEG previews for the vision model.
//! Videos are classified but not decoded.

use std::io::Cursor;

use image::{
    imageops::FilterType, DynamicImage, GenericImageView, ImageError, ImageFormat, ImageResult, Rgb,
    RgbImage,
};

use crate::analyzer::{Detected, MediaAnalyzer, PreparedImage, RawFile};
use crate::error::{VaultError, VaultResult};
use crate::model::{MediaDimensions, MediaType};

/// Placeholder color for thumbnails that cannot be rendered
const PLACEHOLDER_RGB: [u8; 3] = [48, 48, 48];

/// Image Analyzer
pub struct ImageAnalyzer {
    /// Thumbnail size (square)
    thumb_size: u32,
    /// Longest edge of vision previews
    preview_max_dimension: u32,
}

impl ImageAnalyzer {
    pub fn new(thumb_size: u32, preview_max_dimension: u32) -> Self {
        Self {
            thumb_size: thumb_size.max(1),
            preview_max_dimension: preview_max_dimension.max(1),
        }
    }

    /// Resize image to thumbnail (center crop to square)
    fn resize_to_thumbnail(&self, img: &DynamicImage) -> DynamicImage {
        let (width, height) = img.dimensions();

        let (crop_x, crop_y, crop_size) = if width > height {
            ((width - height) / 2, 0, height)
        } else {
            (0, (height - width) / 2, width)
        };

        img.crop_imm(crop_x, crop_y, crop_size, crop_size)
            .resize_exact(self.thumb_size, self.thumb_size, FilterType::Lanczos3)
    }

    /// Scale so the longest edge is at most `preview_max_dimension`
    fn resize_to_preview(&self, img: DynamicImage) -> DynamicImage {
        let (width, height) = img.dimensions();
        let max = self.preview_max_dimension;
        if width <= max && height <= max {
            return img;
        }

        let (new_width, new_height) = if width > height {
            let ratio = max as f32 / width as f32;
            (max, ((height as f32 * ratio) as u32).max(1))
        } else {
            let ratio = max as f32 / height as f32;
            (((width as f32 * ratio) as u32).max(1), max)
        };

        img.resize_exact(new_width, new_height, FilterType::Lanczos3)
    }

    fn placeholder(&self) -> VaultResult<Vec<u8>> {
        let img = RgbImage::from_pixel(self.thumb_size, self.thumb_size, Rgb(PLACEHOLDER_RGB));
        encode_jpeg(&DynamicImage::ImageRgb8(img)).map_err(thumbnail_failed)
    }
}

impl Default for ImageAnalyzer {
    fn default() -> Self {
        Self::new(256, 1024)
    }
}

impl MediaAnalyzer for ImageAnalyzer {
    fn detect_type(&self, file: &RawFile) -> Option<Detected> {
        if let Some(detected) = sniff(&file.data) {
            return Some(detected);
        }

        // Fall back to what the source declared
        let declared = file.mime_type.as_deref()?;
        let media_type = if declared.starts_with("image/") {
            MediaType::Image
        } else if declared.starts_with("video/") {
            MediaType::Video
        } else {
            return None;
        };
        Some(Detected {
            media_type,
            mime_type: declared.to_string(),
        })
    }

    fn metadata(&self, file: &RawFile, media_type: MediaType) -> VaultResult<MediaDimensions> {
        if media_type == MediaType::Video {
            return Ok(MediaDimensions::default());
        }

        match image::load_from_memory(&file.data) {
            Ok(img) => {
                let (width, height) = img.dimensions();
                Ok(MediaDimensions {
                    width,
                    height,
                    duration: 0.0,
                })
            }
            Err(e) => {
                log::debug!("Cannot decode {} for dimensions: {}", file.name, e);
                Ok(MediaDimensions::default())
            }
        }
    }

    fn thumbnail(&self, file: &RawFile, media_type: MediaType) -> VaultResult<Vec<u8>> {
        if media_type == MediaType::Video {
            return self.placeholder();
        }

        match image::load_from_memory(&file.data) {
            Ok(img) => encode_jpeg(&self.resize_to_thumbnail(&img)).map_err(thumbnail_failed),
            Err(e) => {
                log::debug!("Cannot decode {} for thumbnail: {}", file.name, e);
                self.placeholder()
            }
        }
    }

    fn prepare_for_vision(
        &self,
        data: &[u8],
        media_type: MediaType,
        mime_type: &str,
    ) -> VaultResult<PreparedImage> {
        if media_type == MediaType::Video {
            return Err(VaultError::UnsupportedType(format!(
                "{}: video frame extraction needs an external analyzer",
                mime_type
            )));
        }

        match image::load_from_memory(data) {
            Ok(img) => Ok(PreparedImage {
                mime_type: "image/jpeg".into(),
                data: encode_jpeg(&self.resize_to_preview(img))?,
            }),
            // Formats we cannot decode (HEIC, ...) go out as they are
            Err(_) => Ok(PreparedImage {
                mime_type: mime_type.to_string(),
                data: data.to_vec(),
            }),
        }
    }
}

/// JPEG has no alpha channel, so flatten to RGB first
fn encode_jpeg(img: &DynamicImage) -> ImageResult<Vec<u8>> {
    let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
    let mut output = Vec::new();
    rgb.write_to(&mut Cursor::new(&mut output), ImageFormat::Jpeg)?;
    Ok(output)
}

fn thumbnail_failed(e: ImageError) -> VaultError {
    VaultError::ThumbnailFailed(e.to_string())
}

/// Classify by magic bytes
pub fn sniff(data: &[u8]) -> Option<Detected> {
    if data.len() < 12 {
        return None;
    }

    let image = |mime: &str| {
        Some(Detected {
            media_type: MediaType::Image,
            mime_type: mime.into(),
        })
    };
    let video = |mime: &str| {
        Some(Detected {
            media_type: MediaType::Video,
            mime_type: mime.into(),
        })
    };

    match &data[0..8] {
        [0xFF, 0xD8, 0xFF, ..] => return image("image/jpeg"),
        [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A] => return image("image/png"),
        [0x47, 0x49, 0x46, 0x38, ..] => return image("image/gif"),
        [0x42, 0x4D, ..] => return image("image/bmp"),
        [0x1A, 0x45, 0xDF, 0xA3, ..] => {
            let head = &data[..data.len().min(64)];
            return if head.windows(4).any(|w| w == b"webm") {
                video("video/webm")
            } else {
                video("video/x-matroska")
            };
        }
        _ => {}
    }

    if &data[0..4] == b"RIFF" {
        return match &data[8..12] {
            b"WEBP" => image("image/webp"),
            b"AVI " => video("video/x-msvideo"),
            _ => None,
        };
    }

    if &data[4..8] == b"ftyp" {
        return match &data[8..12] {
            b"heic" | b"heix" | b"hevc" | b"heim" | b"heis" => image("image/heic"),
            b"mif1" | b"msf1" => image("image/heif"),
            b"avif" | b"avis" => image("image/avif"),
            b"qt  " => video("video/quicktime"),
            b"3gp4" | b"3gp5" | b"3gp6" | b"3g2a" => video("video/3gpp"),
            _ => video("video/mp4"),
        };
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png(width: u32, height: u32) -> Vec<u8> {
        let img = DynamicImage::new_rgba8(width, height);
        let mut buffer = Vec::new();
        img.write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png).unwrap();
        buffer
    }

    #[test]
    fn test_sniff() {
        let jpeg: [u8; 12] = [0xFF, 0xD8, 0xFF, 0xE0, 0, 0, 0, 0, 0, 0, 0, 0];
        assert_eq!(sniff(&jpeg).unwrap().mime_type, "image/jpeg");
        assert_eq!(sniff(&png(2, 2)).unwrap().media_type, MediaType::Image);

        let mp4 = b"\x00\x00\x00\x18ftypisom\x00\x00\x02\x00";
        assert_eq!(sniff(mp4).unwrap(), Detected { media_type: MediaType::Video, mime_type: "video/mp4".into() });

        let mov = b"\x00\x00\x00\x14ftypqt  \x00\x00\x00\x00";
        assert_eq!(sniff(mov).unwrap().mime_type, "video/quicktime");

        let heic = b"\x00\x00\x00\x18ftypheic\x00\x00\x00\x00";
        assert_eq!(sniff(heic).unwrap().media_type, MediaType::Image);

        assert!(sniff(b"%PDF-1.7 hello world").is_none());
        assert!(sniff(b"short").is_none());
    }

    #[test]
    fn test_detect_falls_back_to_declared_mime() {
        let analyzer = ImageAnalyzer::default();

        let declared = RawFile::new("clip.bin", vec![0u8; 32]).with_mime("video/ogg");
        assert_eq!(analyzer.detect_type(&declared).unwrap().media_type, MediaType::Video);

        let text = RawFile::new("notes.txt", b"just some text, nothing else".to_vec()).with_mime("text/plain");
        assert!(analyzer.detect_type(&text).is_none());
    }

    #[test]
    fn test_thumbnail_generation() {
        let analyzer = ImageAnalyzer::new(256, 1024);
        let file = RawFile::new("photo.png", png(800, 600));

        let dims = analyzer.metadata(&file, MediaType::Image).unwrap();
        assert_eq!((dims.width, dims.height, dims.duration), (800, 600, 0.0));

        let thumb = analyzer.thumbnail(&file, MediaType::Image).unwrap();
        let decoded = image::load_from_memory(&thumb).unwrap();
        assert_eq!(decoded.dimensions(), (256, 256));
    }

    #[test]
    fn test_video_gets_placeholder() {
        let analyzer = ImageAnalyzer::new(64, 1024);
        let file = RawFile::new("clip.mp4", b"\x00\x00\x00\x18ftypisom\x00\x00\x02\x00".to_vec());

        assert_eq!(analyzer.metadata(&file, MediaType::Video).unwrap(), MediaDimensions::default());

        let thumb = analyzer.thumbnail(&file, MediaType::Video).unwrap();
        assert_eq!(image::load_from_memory(&thumb).unwrap().dimensions(), (64, 64));

        let err = analyzer.prepare_for_vision(&file.data, MediaType::Video, "video/mp4").unwrap_err();
        assert!(matches!(err, VaultError::UnsupportedType(_)));
    }

    #[test]
    fn test_vision_preview_is_bounded() {
        let analyzer = ImageAnalyzer::new(256, 100);
        let prepared = analyzer
            .prepare_for_vision(&png(400, 200), MediaType::Image, "image/png")
            .unwrap();

        assert_eq!(prepared.mime_type, "image/jpeg");
        assert_eq!(image::load_from_memory(&prepared.data).unwrap().dimensions(), (100, 50));
    }
}
