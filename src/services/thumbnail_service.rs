use crate::error::AppError;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, ImageReader};
use std::io::Cursor;
use std::path::Path;

const THUMBNAIL_SIZE: u32 = 128;
const THUMBNAIL_QUALITY: u8 = 70;
const EMBEDDED_THUMBNAIL_LEN: std::ops::RangeInclusive<usize> = 100..=200_000;

/// Generate a JPEG preview from in-memory image bytes.
/// Respects EXIF orientation.
pub fn generate_thumbnail_bytes(bytes: &[u8]) -> Result<Vec<u8>, AppError> {
    let exif = ExifInfo::parse(bytes);

    // Embedded JPEG thumbnail is good enough when no rotation is needed
    if exif.orientation.is_upright() && image::guess_format(bytes).ok() == Some(ImageFormat::Jpeg) {
        if let Some(thumb) = exif.embedded_thumbnail {
            return Ok(thumb);
        }
    }

    let mut img = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()?
        .decode()?;

    // Two-step resize: cheap nearest-neighbor for huge inputs, then triangle
    let intermediate_size = THUMBNAIL_SIZE * 4;
    if img.width() > intermediate_size * 2 || img.height() > intermediate_size * 2 {
        img = img.resize(intermediate_size, intermediate_size, FilterType::Nearest);
    }
    img = img.resize(THUMBNAIL_SIZE, THUMBNAIL_SIZE, FilterType::Triangle);

    encode_jpeg_thumbnail(&exif.orientation.apply(img))
}

/// `holiday.png` -> `holiday.thumb.jpg`
pub fn thumbnail_file_name(file_name: &str) -> String {
    let stem = Path::new(file_name)
        .file_stem()
        .unwrap_or_default()
        .to_string_lossy()
        .to_string();
    format!("{}.thumb.jpg", stem)
}

fn encode_jpeg_thumbnail(img: &DynamicImage) -> Result<Vec<u8>, AppError> {
    let mut buffer = Cursor::new(Vec::new());
    let encoder = JpegEncoder::new_with_quality(&mut buffer, THUMBNAIL_QUALITY);
    // JPEG has no alpha channel
    DynamicImage::ImageRgb8(img.to_rgb8()).write_with_encoder(encoder)?;
    Ok(buffer.into_inner())
}

/// EXIF orientation as a horizontal mirror followed by clockwise quarter turns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Orientation {
    mirrored: bool,
    quarter_turns: u8,
}

impl Orientation {
    const UPRIGHT: Self = Self {
        mirrored: false,
        quarter_turns: 0,
    };

    /// Unknown tag values are treated as upright.
    fn from_tag(value: u32) -> Self {
        let (mirrored, quarter_turns) = match value {
            2 => (true, 0),
            3 => (false, 2),
            4 => (true, 2),
            5 => (true, 1),
            6 => (false, 1),
            7 => (true, 3),
            8 => (false, 3),
            _ => (false, 0),
        };
        Self {
            mirrored,
            quarter_turns,
        }
    }

    fn is_upright(self) -> bool {
        self == Self::UPRIGHT
    }

    fn apply(self, img: DynamicImage) -> DynamicImage {
        let img = if self.mirrored { img.fliph() } else { img };
        match self.quarter_turns {
            1 => img.rotate90(),
            2 => img.rotate180(),
            3 => img.rotate270(),
            _ => img,
        }
    }
}

struct ExifInfo {
    orientation: Orientation,
    embedded_thumbnail: Option<Vec<u8>>,
}

impl ExifInfo {
    fn parse(bytes: &[u8]) -> Self {
        let Ok(exif) = exif::Reader::new().read_from_container(&mut Cursor::new(bytes)) else {
            return Self {
                orientation: Orientation::UPRIGHT,
                embedded_thumbnail: None,
            };
        };

        let orientation = first_uint(&exif, exif::Tag::Orientation, exif::In::PRIMARY)
            .map(Orientation::from_tag)
            .unwrap_or(Orientation::UPRIGHT);
        Self {
            orientation,
            embedded_thumbnail: embedded_jpeg(&exif),
        }
    }
}

fn first_uint(exif: &exif::Exif, tag: exif::Tag, ifd: exif::In) -> Option<u32> {
    exif.get_field(tag, ifd)?.value.get_uint(0)
}

/// The IFD1 JPEG thumbnail, if it is a plausible size and starts with SOI.
fn embedded_jpeg(exif: &exif::Exif) -> Option<Vec<u8>> {
    let offset = first_uint(exif, exif::Tag::JPEGInterchangeFormat, exif::In::THUMBNAIL)? as usize;
    let length = first_uint(exif, exif::Tag::JPEGInterchangeFormatLength, exif::In::THUMBNAIL)? as usize;
    if !EMBEDDED_THUMBNAIL_LEN.contains(&length) {
        return None;
    }

    let thumb = exif.buf().get(offset..offset.checked_add(length)?)?;
    thumb.starts_with(&[0xFF, 0xD8]).then(|| thumb.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn png_bytes(w: u32, h: u32) -> Vec<u8> {
        let img = RgbImage::from_pixel(w, h, Rgb([200, 30, 30]));
        let mut out = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img)
            .write_to(&mut out, ImageFormat::Png)
            .unwrap();
        out.into_inner()
    }

    #[test]
    fn thumbnail_fits_bounding_box() {
        let thumb = generate_thumbnail_bytes(&png_bytes(640, 320)).unwrap();
        let decoded = image::load_from_memory(&thumb).unwrap();
        assert_eq!(decoded.width(), THUMBNAIL_SIZE);
        assert_eq!(decoded.height(), THUMBNAIL_SIZE / 2);
    }

    #[test]
    fn png_without_exif_is_upright() {
        let info = ExifInfo::parse(&png_bytes(4, 4));
        assert!(info.orientation.is_upright());
        assert!(info.embedded_thumbnail.is_none());
    }

    #[test]
    fn quarter_turn_orientations_swap_dimensions() {
        let img = DynamicImage::ImageRgb8(RgbImage::new(40, 20));
        for tag in [5, 6, 7, 8] {
            let turned = Orientation::from_tag(tag).apply(img.clone());
            assert_eq!((turned.width(), turned.height()), (20, 40), "tag {}", tag);
        }
        for tag in [1, 2, 3, 4, 0, 42] {
            let kept = Orientation::from_tag(tag).apply(img.clone());
            assert_eq!((kept.width(), kept.height()), (40, 20), "tag {}", tag);
        }
    }

    #[test]
    fn mirror_then_half_turn_is_a_vertical_flip() {
        let mut img = RgbImage::new(3, 2);
        img.put_pixel(0, 0, Rgb([255, 0, 0]));
        let img = DynamicImage::ImageRgb8(img);

        let flipped = Orientation::from_tag(4).apply(img.clone()).to_rgb8();
        assert_eq!(flipped, img.flipv().to_rgb8());
        assert_eq!(*flipped.get_pixel(0, 1), Rgb([255, 0, 0]));
    }

    #[test]
    fn garbage_is_an_error() {
        assert!(generate_thumbnail_bytes(b"definitely not an image").is_err());
    }

    #[test]
    fn thumbnail_name_replaces_extension() {
        assert_eq!(thumbnail_file_name("holiday.png"), "holiday.thumb.jpg");
        assert_eq!(thumbnail_file_name("archive.tar.webp"), "archive.tar.thumb.jpg");
    }
}
