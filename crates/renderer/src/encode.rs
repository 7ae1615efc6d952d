//! JPEG encoding for rendered and derived images.

use image::{DynamicImage, Rgb, RgbImage, Rgba};
use std::io::Cursor;

use route_common::{RouteError, RouteResult};

/// Quality for thumbnails.
pub const THUMBNAIL_JPEG_QUALITY: u8 = 80;

/// Quality for re-encoded uploaded rasters.
pub const RASTER_JPEG_QUALITY: u8 = 60;

/// Flatten an image to opaque RGB.
///
/// Images with an alpha channel are composited onto a white background;
/// opaque images are converted directly.
pub fn flatten_onto_white(img: &DynamicImage) -> RgbImage {
    if !img.color().has_alpha() {
        return img.to_rgb8();
    }

    let rgba = img.to_rgba8();
    let (width, height) = rgba.dimensions();
    let mut rgb = RgbImage::new(width, height);

    for (x, y, pixel) in rgba.enumerate_pixels() {
        let Rgba([r, g, b, a]) = *pixel;
        let alpha = a as f32 / 255.0;
        let blend = |c: u8| (c as f32 * alpha + 255.0 * (1.0 - alpha)).round() as u8;
        rgb.put_pixel(x, y, Rgb([blend(r), blend(g), blend(b)]));
    }

    rgb
}

/// Encode an RGB image as baseline JPEG.
pub fn encode_jpeg(img: &RgbImage, quality: u8) -> RouteResult<Vec<u8>> {
    let (width, height) = img.dimensions();
    let mut jpeg_data = Vec::new();
    let mut cursor = Cursor::new(&mut jpeg_data);

    let mut encoder =
        image::codecs::jpeg::JpegEncoder::new_with_quality(&mut cursor, quality.min(100));
    encoder
        .encode(img.as_raw(), width, height, image::ColorType::Rgb8)
        .map_err(|e| RouteError::Image(format!("Failed to encode JPEG: {}", e)))?;

    Ok(jpeg_data)
}

/// Decode any supported image format from memory.
pub fn decode(data: &[u8]) -> RouteResult<DynamicImage> {
    image::load_from_memory(data)
        .map_err(|e| RouteError::InvalidInput(format!("Failed to decode image: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbaImage;

    #[test]
    fn test_transparent_becomes_white() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(2, 2, Rgba([10, 20, 30, 0])));
        let flat = flatten_onto_white(&img);
        assert_eq!(*flat.get_pixel(0, 0), Rgb([255, 255, 255]));
    }

    #[test]
    fn test_opaque_pixels_are_kept() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(2, 2, Rgba([10, 20, 30, 255])));
        let flat = flatten_onto_white(&img);
        assert_eq!(*flat.get_pixel(1, 1), Rgb([10, 20, 30]));
    }

    #[test]
    fn test_half_alpha_blends() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(1, 1, Rgba([0, 0, 0, 128])));
        let flat = flatten_onto_white(&img);
        let Rgb([r, g, b]) = *flat.get_pixel(0, 0);
        assert_eq!(r, g);
        assert_eq!(g, b);
        assert!((120..=135).contains(&r), "got {}", r);
    }

    #[test]
    fn test_jpeg_roundtrip_dimensions() {
        let img = RgbImage::from_pixel(33, 17, Rgb([200, 100, 50]));
        let jpeg = encode_jpeg(&img, 80).unwrap();
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);

        let decoded = decode(&jpeg).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (33, 17));
    }

    #[test]
    fn test_decode_garbage_is_invalid_input() {
        assert!(matches!(decode(b"not an image"), Err(RouteError::InvalidInput(_))));
    }
}
