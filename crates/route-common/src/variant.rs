//! Render variants, cached artifacts and existence flags.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::RouteError;

/// Which overlays the renderer draws on top of the raster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderVariant {
    Blank,
    Header,
    Route,
    HeaderAndRoute,
}

impl RenderVariant {
    pub const ALL: [RenderVariant; 4] = [
        RenderVariant::Blank,
        RenderVariant::Header,
        RenderVariant::Route,
        RenderVariant::HeaderAndRoute,
    ];

    pub fn from_overlays(header: bool, route: bool) -> Self {
        match (header, route) {
            (false, false) => RenderVariant::Blank,
            (true, false) => RenderVariant::Header,
            (false, true) => RenderVariant::Route,
            (true, true) => RenderVariant::HeaderAndRoute,
        }
    }

    pub fn shows_header(&self) -> bool {
        matches!(self, RenderVariant::Header | RenderVariant::HeaderAndRoute)
    }

    pub fn shows_route(&self) -> bool {
        matches!(self, RenderVariant::Route | RenderVariant::HeaderAndRoute)
    }

    /// Flag argument understood by the renderer: "", "h", "r" or "hr".
    pub fn renderer_flag(&self) -> &'static str {
        match self {
            RenderVariant::Blank => "",
            RenderVariant::Header => "h",
            RenderVariant::Route => "r",
            RenderVariant::HeaderAndRoute => "hr",
        }
    }

    /// Stable name used in cache keys.
    pub fn discriminator(&self) -> &'static str {
        match self {
            RenderVariant::Blank => "blank",
            RenderVariant::Header => "header",
            RenderVariant::Route => "route",
            RenderVariant::HeaderAndRoute => "header_route",
        }
    }

    /// Suffix appended to the route's blob path.
    pub fn blob_suffix(&self) -> &'static str {
        match self {
            RenderVariant::Blank => "_blank",
            RenderVariant::Header => "_header",
            RenderVariant::Route => "_route",
            RenderVariant::HeaderAndRoute => "_header_route",
        }
    }
}

impl fmt::Display for RenderVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.discriminator())
    }
}

impl FromStr for RenderVariant {
    type Err = RouteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "blank" | "" => Ok(RenderVariant::Blank),
            "header" | "h" => Ok(RenderVariant::Header),
            "route" | "r" => Ok(RenderVariant::Route),
            "header_route" | "hr" => Ok(RenderVariant::HeaderAndRoute),
            other => Err(RouteError::InvalidInput(format!(
                "unknown render variant: {}",
                other
            ))),
        }
    }
}

/// Anything the pipeline caches and persists for a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Artifact {
    Variant(RenderVariant),
    Thumbnail,
}

impl Artifact {
    pub const ALL: [Artifact; 5] = [
        Artifact::Variant(RenderVariant::Blank),
        Artifact::Variant(RenderVariant::Header),
        Artifact::Variant(RenderVariant::Route),
        Artifact::Variant(RenderVariant::HeaderAndRoute),
        Artifact::Thumbnail,
    ];

    pub fn discriminator(&self) -> &'static str {
        match self {
            Artifact::Variant(v) => v.discriminator(),
            Artifact::Thumbnail => "thumbnail",
        }
    }
}

impl fmt::Display for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.discriminator())
    }
}

impl From<RenderVariant> for Artifact {
    fn from(variant: RenderVariant) -> Self {
        Artifact::Variant(variant)
    }
}

/// Per-route record of which artifacts have been persisted to blob storage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExistenceFlags {
    pub has_blank: bool,
    pub has_header: bool,
    pub has_route: bool,
    pub has_header_and_route: bool,
    pub has_thumbnail: bool,
}

impl ExistenceFlags {
    pub fn get(&self, artifact: Artifact) -> bool {
        match artifact {
            Artifact::Variant(RenderVariant::Blank) => self.has_blank,
            Artifact::Variant(RenderVariant::Header) => self.has_header,
            Artifact::Variant(RenderVariant::Route) => self.has_route,
            Artifact::Variant(RenderVariant::HeaderAndRoute) => self.has_header_and_route,
            Artifact::Thumbnail => self.has_thumbnail,
        }
    }

    pub fn set(&mut self, artifact: Artifact, present: bool) {
        let slot = match artifact {
            Artifact::Variant(RenderVariant::Blank) => &mut self.has_blank,
            Artifact::Variant(RenderVariant::Header) => &mut self.has_header,
            Artifact::Variant(RenderVariant::Route) => &mut self.has_route,
            Artifact::Variant(RenderVariant::HeaderAndRoute) => &mut self.has_header_and_route,
            Artifact::Thumbnail => &mut self.has_thumbnail,
        };
        *slot = present;
    }

    pub fn any(&self) -> bool {
        Artifact::ALL.iter().any(|a| self.get(*a))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_renderer_flags() {
        let flags: Vec<_> = RenderVariant::ALL.iter().map(|v| v.renderer_flag()).collect();
        assert_eq!(flags, vec!["", "h", "r", "hr"]);
    }

    #[test]
    fn test_from_overlays_matches_flags() {
        for variant in RenderVariant::ALL {
            let rebuilt = RenderVariant::from_overlays(variant.shows_header(), variant.shows_route());
            assert_eq!(rebuilt, variant);
        }
    }

    #[test]
    fn test_parse_variant() {
        assert_eq!("hr".parse::<RenderVariant>().unwrap(), RenderVariant::HeaderAndRoute);
        assert_eq!("header".parse::<RenderVariant>().unwrap(), RenderVariant::Header);
        assert!("x".parse::<RenderVariant>().is_err());
    }

    #[test]
    fn test_flags_set_and_get() {
        let mut flags = ExistenceFlags::default();
        assert!(!flags.any());

        flags.set(Artifact::Variant(RenderVariant::Route), true);
        flags.set(Artifact::Thumbnail, true);
        assert!(flags.has_route);
        assert!(flags.get(Artifact::Thumbnail));
        assert!(!flags.get(Artifact::Variant(RenderVariant::Header)));

        flags.set(Artifact::Thumbnail, false);
        assert!(!flags.has_thumbnail);
    }
}
