//! Synthetic raster generators.
//!
//! Images are small, deterministic and encoded in memory so tests never
//! depend on files outside the repository.

use bytes::Bytes;
use image::{DynamicImage, ImageOutputFormat, Rgb, RgbImage, Rgba, RgbaImage};
use route_common::{Corners, GeoReferencedRaster};
use std::io::Cursor;

fn encode(img: &DynamicImage, format: ImageOutputFormat) -> Vec<u8> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), format)
        .expect("in-memory image encoding");
    buf
}

/// Opaque single-color PNG.
pub fn solid_png(width: u32, height: u32, color: [u8; 3]) -> Vec<u8> {
    let img = RgbImage::from_pixel(width, height, Rgb(color));
    encode(&DynamicImage::ImageRgb8(img), ImageOutputFormat::Png)
}

/// RGBA PNG with alternating opaque and fully transparent squares.
pub fn checkered_rgba_png(width: u32, height: u32, cell: u32) -> Vec<u8> {
    let cell = cell.max(1);
    let img = RgbaImage::from_fn(width, height, |x, y| {
        if (x / cell + y / cell) % 2 == 0 {
            Rgba([20, 90, 200, 255])
        } else {
            Rgba([0, 0, 0, 0])
        }
    });
    encode(&DynamicImage::ImageRgba8(img), ImageOutputFormat::Png)
}

/// JPEG with a horizontal and vertical color gradient.
pub fn gradient_jpeg(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| {
        let r = (x * 255 / width.max(1)) as u8;
        let g = (y * 255 / height.max(1)) as u8;
        Rgb([r, g, 128])
    });
    encode(&DynamicImage::ImageRgb8(img), ImageOutputFormat::Jpeg(90))
}

/// A georeferenced raster with a gradient JPEG of the given size.
pub fn sample_raster(id: &str, width: u32, height: u32, corners: Corners) -> GeoReferencedRaster {
    GeoReferencedRaster {
        id: id.to_string(),
        mime_type: "image/jpeg".to_string(),
        data: Bytes::from(gradient_jpeg(width, height)),
        width,
        height,
        corners,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_solid_png_decodes() {
        let img = image::load_from_memory(&solid_png(8, 4, [1, 2, 3])).unwrap();
        assert_eq!((img.width(), img.height()), (8, 4));
        assert_eq!(img.to_rgb8().get_pixel(7, 3), &Rgb([1, 2, 3]));
    }

    #[test]
    fn test_checkered_has_alpha() {
        let img = image::load_from_memory(&checkered_rgba_png(16, 16, 4)).unwrap();
        assert!(img.color().has_alpha());
        assert_eq!(img.to_rgba8().get_pixel(4, 0)[3], 0);
        assert_eq!(img.to_rgba8().get_pixel(0, 0)[3], 255);
    }

    #[test]
    fn test_sample_raster_dimensions() {
        let raster = sample_raster("m1", 600, 520, crate::fixtures::corners::square());
        let img = image::load_from_memory(&raster.data).unwrap();
        assert_eq!((img.width(), img.height()), (600, 520));
    }
}
