//! Route manifests: a YAML listing of rasters and routes for batch jobs.
//!
//! ```yaml
//! rasters:
//!   - id: turku
//!     path: rasters/turku.jpg
//!     corners: "60.519,22.078,60.518,22.115,60.491,22.112,60.492,22.073"
//! routes:
//!   - id: morning-run
//!     raster_id: turku
//!     track_file: tracks/morning-run.json
//!     timezone: Europe/Helsinki
//! ```
//!
//! Relative paths resolve against the manifest's directory.

use bytes::Bytes;
use image::ImageFormat;
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tracing::info;

use route_common::{Corners, GeoReferencedRaster, RouteError, RouteResult, Track};

use crate::source::MemoryRouteSource;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RouteManifest {
    #[serde(default)]
    pub rasters: Vec<RasterEntry>,
    #[serde(default)]
    pub routes: Vec<RouteEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RasterEntry {
    pub id: String,
    pub path: PathBuf,
    /// Detected from the file contents when omitted
    #[serde(default)]
    pub mime_type: Option<String>,
    /// Corner coordinate string
    pub corners: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteEntry {
    pub id: String,
    #[serde(default)]
    pub raster_id: Option<String>,
    /// Track in the renderer's JSON record format
    pub track_file: PathBuf,
    #[serde(default)]
    pub timezone: Option<String>,
}

impl RouteManifest {
    pub fn from_yaml(contents: &str) -> RouteResult<Self> {
        serde_yaml::from_str(contents)
            .map_err(|e| RouteError::Config(format!("Invalid route manifest: {}", e)))
    }

    pub fn load<P: AsRef<Path>>(path: P) -> RouteResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            RouteError::Config(format!("Failed to read manifest {}: {}", path.display(), e))
        })?;
        Self::from_yaml(&contents)
    }

    /// Load a manifest and every file it references into a route source.
    pub async fn load_source<P: AsRef<Path>>(path: P) -> RouteResult<MemoryRouteSource> {
        let path = path.as_ref();
        let manifest = Self::load(path)?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        manifest.into_source(base_dir).await
    }

    pub fn route_ids(&self) -> Vec<String> {
        self.routes.iter().map(|r| r.id.clone()).collect()
    }

    pub async fn into_source(self, base_dir: &Path) -> RouteResult<MemoryRouteSource> {
        let source = MemoryRouteSource::new();

        for entry in &self.rasters {
            let data = tokio::fs::read(base_dir.join(&entry.path)).await.map_err(|e| {
                RouteError::NotFound(format!("raster file {}: {}", entry.path.display(), e))
            })?;
            source.insert_raster(load_raster(entry, data)?).await;
        }

        for entry in &self.routes {
            let json = tokio::fs::read_to_string(base_dir.join(&entry.track_file))
                .await
                .map_err(|e| {
                    RouteError::NotFound(format!(
                        "track file {}: {}",
                        entry.track_file.display(),
                        e
                    ))
                })?;
            let track = Track::from_json(&json)?;
            source
                .insert_route(
                    &entry.id,
                    entry.raster_id.as_deref(),
                    track,
                    entry.timezone.as_deref(),
                )
                .await?;
        }

        info!(
            rasters = self.rasters.len(),
            routes = self.routes.len(),
            "Loaded route manifest"
        );
        Ok(source)
    }
}

fn load_raster(entry: &RasterEntry, data: Vec<u8>) -> RouteResult<GeoReferencedRaster> {
    let reader = image::io::Reader::new(Cursor::new(&data)).with_guessed_format()?;
    let format = reader.format();
    let (width, height) = reader.into_dimensions().map_err(|e| {
        RouteError::InvalidInput(format!("raster {} is not a readable image: {}", entry.id, e))
    })?;

    let mime_type = match (&entry.mime_type, format) {
        (Some(mime), _) => mime.clone(),
        (None, Some(format)) => mime_for(format)?.to_string(),
        (None, None) => {
            return Err(RouteError::InvalidInput(format!(
                "raster {} has an unknown image format",
                entry.id
            )))
        }
    };

    Ok(GeoReferencedRaster {
        id: entry.id.clone(),
        mime_type,
        data: Bytes::from(data),
        width,
        height,
        corners: Corners::parse(&entry.corners)?,
    })
}

fn mime_for(format: ImageFormat) -> RouteResult<&'static str> {
    match format {
        ImageFormat::Jpeg => Ok("image/jpeg"),
        ImageFormat::Png => Ok("image/png"),
        ImageFormat::Gif => Ok("image/gif"),
        other => Err(RouteError::InvalidInput(format!(
            "unsupported raster format {:?}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::RouteSource;

    const MANIFEST: &str = r#"
rasters:
  - id: square
    path: square.png
    corners: "1,1,1,3,3,3,3,1"
routes:
  - id: r1
    raster_id: square
    track_file: r1.json
    timezone: Europe/Helsinki
  - id: r2
    track_file: r1.json
"#;

    fn write_png(path: &Path) {
        let img = image::RgbImage::from_pixel(600, 520, image::Rgb([10, 20, 30]));
        img.save_with_format(path, ImageFormat::Png).unwrap();
    }

    #[test]
    fn test_parse_manifest() {
        let manifest = RouteManifest::from_yaml(MANIFEST).unwrap();
        assert_eq!(manifest.rasters.len(), 1);
        assert_eq!(manifest.route_ids(), vec!["r1", "r2"]);
        assert_eq!(manifest.routes[1].raster_id, None);
    }

    #[test]
    fn test_invalid_manifest_is_config_error() {
        assert!(matches!(
            RouteManifest::from_yaml("routes: 12"),
            Err(RouteError::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_load_source_resolves_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        write_png(&dir.path().join("square.png"));
        std::fs::write(
            dir.path().join("r1.json"),
            r#"[{"time": 0, "latlon": [2.0, 2.0]}, {"time": 60, "latlon": [2.1, 2.0]}]"#,
        )
        .unwrap();
        let manifest_path = dir.path().join("routes.yaml");
        std::fs::write(&manifest_path, MANIFEST).unwrap();

        let source = RouteManifest::load_source(&manifest_path).await.unwrap();

        let raster = source.raster("square").await.unwrap();
        assert_eq!(raster.mime_type, "image/png");
        assert_eq!((raster.width, raster.height), (600, 520));

        let route = source.route("r1").await.unwrap();
        assert_eq!(route.timezone, "Europe/Helsinki");
        assert_eq!(route.track.len(), 2);
        assert!(source.route("r2").await.unwrap().raster.is_none());
    }

    #[tokio::test]
    async fn test_missing_track_file() {
        let dir = tempfile::tempdir().unwrap();
        write_png(&dir.path().join("square.png"));
        let manifest = RouteManifest::from_yaml(MANIFEST).unwrap();

        let result = manifest.into_source(dir.path()).await;
        assert!(matches!(result, Err(RouteError::NotFound(_))));
    }
}
