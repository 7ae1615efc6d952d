//! Square preview thumbnails of raster maps.
//!
//! The thumbnail is the central 512x512 pixel region of the raster,
//! resampled onto 256x256 through a four-point perspective mapping. It
//! ignores the georeference entirely.

use image::{DynamicImage, Rgb, RgbImage, Rgba, RgbaImage};
use imageproc::geometric_transformations::{warp_into, Interpolation, Projection};
use tracing::{debug, instrument};

use route_common::{RouteError, RouteResult};

use crate::encode::{decode, encode_jpeg, flatten_onto_white, THUMBNAIL_JPEG_QUALITY};

/// Edge length of the generated thumbnail.
pub const THUMBNAIL_SIZE: u32 = 256;

/// Distance from the image center to each edge of the sampled region.
pub const CROP_HALF_EXTENT: u32 = 256;

/// Smallest raster edge that keeps the sampled region inside the image.
pub const MIN_SOURCE_EDGE: u32 = 2 * CROP_HALF_EXTENT;

/// Projection taking the central crop of a `width` x `height` image onto
/// the thumbnail square.
pub fn center_crop_projection(width: u32, height: u32) -> RouteResult<Projection> {
    let cx = width as f32 / 2.0;
    let cy = height as f32 / 2.0;
    let half = CROP_HALF_EXTENT as f32;
    let size = THUMBNAIL_SIZE as f32;

    let from = [
        (cx - half, cy - half),
        (cx + half, cy - half),
        (cx + half, cy + half),
        (cx - half, cy + half),
    ];
    let to = [(0.0, 0.0), (size, 0.0), (size, size), (0.0, size)];

    Projection::from_control_points(from, to)
        .ok_or_else(|| RouteError::Internal("degenerate thumbnail projection".to_string()))
}

fn check_dimensions(width: u32, height: u32) -> RouteResult<()> {
    if width < MIN_SOURCE_EDGE || height < MIN_SOURCE_EDGE {
        return Err(RouteError::InvalidInput(format!(
            "raster {}x{} is smaller than the {}x{} thumbnail source region",
            width, height, MIN_SOURCE_EDGE, MIN_SOURCE_EDGE
        )));
    }
    Ok(())
}

/// Crop and resample a decoded image into an opaque thumbnail.
pub fn thumbnail_image(img: &DynamicImage) -> RouteResult<RgbImage> {
    let (width, height) = (img.width(), img.height());
    check_dimensions(width, height)?;
    let projection = center_crop_projection(width, height)?;

    if img.color().has_alpha() {
        let source = img.to_rgba8();
        let mut out = RgbaImage::new(THUMBNAIL_SIZE, THUMBNAIL_SIZE);
        warp_into(
            &source,
            &projection,
            Interpolation::Bilinear,
            Rgba([255, 255, 255, 0]),
            &mut out,
        );
        Ok(flatten_onto_white(&DynamicImage::ImageRgba8(out)))
    } else {
        let source = img.to_rgb8();
        let mut out = RgbImage::new(THUMBNAIL_SIZE, THUMBNAIL_SIZE);
        warp_into(
            &source,
            &projection,
            Interpolation::Bilinear,
            Rgb([255, 255, 255]),
            &mut out,
        );
        Ok(out)
    }
}

/// Generate the JPEG thumbnail for encoded raster bytes.
#[instrument(skip(data), fields(size = data.len()))]
pub fn generate_thumbnail(data: &[u8]) -> RouteResult<Vec<u8>> {
    let img = decode(data)?;
    let thumb = thumbnail_image(&img)?;
    let jpeg = encode_jpeg(&thumb, THUMBNAIL_JPEG_QUALITY)?;
    debug!(source_width = img.width(), source_height = img.height(), out_size = jpeg.len(), "Generated thumbnail");
    Ok(jpeg)
}
