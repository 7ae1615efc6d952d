//! Client for the external map renderer.
//!
//! The renderer is an opaque program that draws a track and an optional
//! header over a raster. It is handed the raster and the track as files,
//! the bounds and options as arguments, and answers with a single data URI
//! on stdout.

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::{debug, info, instrument, warn};

use route_common::{Corners, DataUri, RenderVariant, RouteError, RouteResult, Track};

/// Everything the renderer needs for one image.
#[derive(Debug, Clone)]
pub struct RenderRequest {
    /// Encoded raster image
    pub raster: Bytes,
    pub track: Track,
    pub corners: Corners,
    pub variant: RenderVariant,
    /// IANA timezone used for the header timestamps
    pub timezone: String,
}

/// Something that turns a [`RenderRequest`] into image bytes.
///
/// Implementations must not substitute a default image on failure, and a
/// repeated call with the same request must be safe.
#[async_trait]
pub trait MapRenderer: Send + Sync {
    async fn render(&self, request: &RenderRequest) -> RouteResult<Bytes>;
}

/// Configuration of the external renderer process.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Interpreter or executable to run
    pub program: String,
    /// Script passed as the first argument, if the program needs one
    pub script: Option<PathBuf>,
    /// Hard wall-clock limit for one render
    pub timeout_secs: u64,
    /// Extra environment variables for the child process
    pub env: HashMap<String, String>,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            program: "node".to_string(),
            script: Some(PathBuf::from("tools/generate_map.js")),
            timeout_secs: 60,
            env: HashMap::new(),
        }
    }
}

impl RendererConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Runs the renderer as a child process per request.
///
/// Arguments, in order: `[script] <raster file> <track file> <bounds json>
/// <variant flag> <timezone>`. The child is killed if it outlives the
/// configured timeout.
#[derive(Debug, Clone)]
pub struct SubprocessRenderer {
    config: RendererConfig,
    scratch_dir: Option<PathBuf>,
}

impl SubprocessRenderer {
    pub fn new(config: RendererConfig) -> Self {
        Self {
            config,
            scratch_dir: None,
        }
    }

    /// Write temporary input files under `dir` instead of the system temp dir.
    pub fn with_scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = Some(dir.into());
        self
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    fn temp_file(&self, prefix: &str) -> RouteResult<tempfile::NamedTempFile> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(prefix);
        let file = match &self.scratch_dir {
            Some(dir) => builder.tempfile_in(dir),
            None => builder.tempfile(),
        };
        file.map_err(|e| RouteError::Internal(format!("Failed to create temp file: {}", e)))
    }

    fn build_command(&self, raster_path: &Path, track_path: &Path, request: &RenderRequest) -> Command {
        let mut command = Command::new(&self.config.program);
        if let Some(script) = &self.config.script {
            command.arg(script);
        }
        command
            .arg(raster_path)
            .arg(track_path)
            .arg(request.corners.bounds().to_string())
            .arg(request.variant.renderer_flag())
            .arg(&request.timezone)
            .envs(&self.config.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        command
    }
}

#[async_trait]
impl MapRenderer for SubprocessRenderer {
    #[instrument(skip(self, request), fields(variant = %request.variant, tz = %request.timezone))]
    async fn render(&self, request: &RenderRequest) -> RouteResult<Bytes> {
        let raster_file = self.temp_file("raster-")?;
        let track_file = self.temp_file("track-")?;

        tokio::fs::write(raster_file.path(), &request.raster).await?;
        tokio::fs::write(track_file.path(), request.track.to_json()?).await?;

        let mut command = self.build_command(raster_file.path(), track_file.path(), request);
        let started = Instant::now();

        let child = command.spawn().map_err(|e| {
            RouteError::RenderFailure(format!(
                "Failed to start renderer '{}': {}",
                self.config.program, e
            ))
        })?;

        let timeout = self.config.timeout();
        // Dropping the wait future on timeout drops the child, which kills it.
        let output = tokio::time::timeout(timeout, child.wait_with_output())
            .await
            .map_err(|_| {
                warn!(timeout_secs = timeout.as_secs(), "Renderer timed out");
                RouteError::RenderTimeout(timeout)
            })?
            .map_err(|e| RouteError::RenderFailure(format!("Renderer I/O failed: {}", e)))?;

        if !output.status.success() {
            return Err(RouteError::RenderFailure(format!(
                "Renderer exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let image = parse_render_output(&stdout)?;

        info!(
            size = image.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Rendered map"
        );
        Ok(image)
    }
}

/// Decode the renderer's stdout into image bytes.
///
/// Anything other than a non-empty `data:` URI is a render failure.
pub fn parse_render_output(output: &str) -> RouteResult<Bytes> {
    let line = output.trim();
    if !line.starts_with("data:") {
        let preview: String = line.chars().take(120).collect();
        return Err(RouteError::RenderFailure(format!(
            "Renderer output is not a data URI: '{}'",
            preview
        )));
    }

    let uri = DataUri::parse(line)
        .map_err(|e| RouteError::RenderFailure(format!("Malformed renderer output: {}", e)))?;
    if uri.data.is_empty() {
        return Err(RouteError::RenderFailure(
            "Renderer returned an empty image".to_string(),
        ));
    }

    debug!(mime = %uri.mime_type, size = uri.data.len(), "Decoded renderer output");
    Ok(Bytes::from(uri.data))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_output() {
        let bytes = parse_render_output("data:image/jpeg;base64,/9j/4A==\n").unwrap();
        assert_eq!(&bytes[..], &[0xFF, 0xD8, 0xFF, 0xE0]);
    }

    #[test]
    fn test_parse_rejects_non_data_uri() {
        for output in ["", "   ", "Error: cannot open file", "image/jpeg;base64,AAAA"] {
            let err = parse_render_output(output).unwrap_err();
            assert!(matches!(err, RouteError::RenderFailure(_)), "{:?}", output);
        }
    }

    #[test]
    fn test_parse_rejects_bad_payload() {
        assert!(matches!(
            parse_render_output("data:image/png;base64,@@@"),
            Err(RouteError::RenderFailure(_))
        ));
        assert!(matches!(
            parse_render_output("data:image/png;base64,"),
            Err(RouteError::RenderFailure(_))
        ));
    }

    #[test]
    fn test_default_config() {
        let config = RendererConfig::default();
        assert_eq!(config.program, "node");
        assert_eq!(config.timeout(), Duration::from_secs(60));
    }
}
