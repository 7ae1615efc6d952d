//! Re-encoding of uploaded rasters.

use tracing::instrument;

use route_common::RouteResult;

use crate::encode::{decode, encode_jpeg, flatten_onto_white, RASTER_JPEG_QUALITY};

/// Decode a raster in any supported format and re-encode it as an RGB JPEG.
///
/// The re-encode drops EXIF and every other metadata block the upload
/// carried. Transparent areas become white.
#[instrument(skip(data), fields(size = data.len()))]
pub fn normalize_raster(data: &[u8]) -> RouteResult<Vec<u8>> {
    let img = decode(data)?;
    encode_jpeg(&flatten_onto_white(&img), RASTER_JPEG_QUALITY)
}
