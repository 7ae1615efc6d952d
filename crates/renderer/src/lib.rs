//! Image production for route maps.
//!
//! - Client for the external map renderer
//! - Perspective-crop thumbnails
//! - Raster normalization and JPEG encoding

pub mod client;
pub mod encode;
pub mod normalize;
pub mod thumbnail;

pub use client::{parse_render_output, MapRenderer, RenderRequest, RendererConfig, SubprocessRenderer};
pub use normalize::normalize_raster;
pub use thumbnail::{generate_thumbnail, thumbnail_image, THUMBNAIL_SIZE};
