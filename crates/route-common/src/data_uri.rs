//! `data:<mime>;base64,<payload>` handling.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::error::{RouteError, RouteResult};

/// Mime types accepted for uploaded map rasters.
pub const IMAGE_MIME_TYPES: [&str; 3] = ["image/jpeg", "image/png", "image/gif"];

/// A decoded base64 data URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUri {
    pub mime_type: String,
    pub data: Vec<u8>,
}

impl DataUri {
    /// Parse a base64 data URI.
    ///
    /// Surrounding whitespace (e.g. the trailing newline of a process's
    /// stdout) is ignored. Anything not starting with `data:` is rejected.
    pub fn parse(input: &str) -> RouteResult<Self> {
        let input = input.trim();
        let rest = input
            .strip_prefix("data:")
            .ok_or_else(|| RouteError::invalid("data URI must start with 'data:'"))?;

        let (header, payload) = rest
            .split_once(',')
            .ok_or_else(|| RouteError::invalid("data URI has no ',' separator"))?;

        let mime_type = header
            .strip_suffix(";base64")
            .ok_or_else(|| RouteError::invalid("data URI is not base64 encoded"))?;

        if mime_type.is_empty() {
            return Err(RouteError::invalid("data URI has an empty mime type"));
        }

        let data = STANDARD
            .decode(payload)
            .map_err(|e| RouteError::InvalidInput(format!("invalid base64 payload: {}", e)))?;

        Ok(Self {
            mime_type: mime_type.to_string(),
            data,
        })
    }

    /// Parse an uploaded map image, accepting only jpeg, png and gif.
    pub fn parse_image(input: &str) -> RouteResult<Self> {
        let uri = Self::parse(input)?;
        if !IMAGE_MIME_TYPES.contains(&uri.mime_type.as_str()) {
            return Err(RouteError::InvalidInput(format!(
                "unsupported image type: {}",
                uri.mime_type
            )));
        }
        Ok(uri)
    }

    pub fn encode(mime_type: &str, data: &[u8]) -> String {
        format!("data:{};base64,{}", mime_type, STANDARD.encode(data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_png_uri() {
        let uri = DataUri::parse("data:image/png;base64,aGVsbG8=\n").unwrap();
        assert_eq!(uri.mime_type, "image/png");
        assert_eq!(uri.data, b"hello");
    }

    #[test]
    fn test_rejects_missing_prefix() {
        assert!(DataUri::parse("Error: cannot load image").is_err());
        assert!(DataUri::parse("").is_err());
    }

    #[test]
    fn test_rejects_non_base64_header() {
        assert!(DataUri::parse("data:text/plain,hello").is_err());
    }

    #[test]
    fn test_rejects_bad_payload() {
        assert!(DataUri::parse("data:image/jpeg;base64,@@@").is_err());
    }

    #[test]
    fn test_parse_image_restricts_mime() {
        let svg = DataUri::encode("image/svg+xml", b"<svg/>");
        assert!(DataUri::parse(&svg).is_ok());
        assert!(DataUri::parse_image(&svg).is_err());

        let gif = DataUri::encode("image/gif", b"GIF89a");
        assert_eq!(DataUri::parse_image(&gif).unwrap().data, b"GIF89a");
    }
}
