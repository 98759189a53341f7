//! Coordinate Reference System handling

use serde::{Deserialize, Serialize};
use std::fmt;

/// Coordinate Reference System representation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CRS {
    /// EPSG code if known
    epsg: Option<u32>,
    /// Opaque identifier for CRSs that have no EPSG code (e.g. a custom URN)
    name: Option<String>,
}

impl CRS {
    /// Create a CRS from an EPSG code
    pub fn from_epsg(code: u32) -> Self {
        Self {
            epsg: Some(code),
            name: None,
        }
    }

    /// Create a CRS known only by name
    pub fn from_name(name: impl Into<String>) -> Self {
        Self {
            epsg: None,
            name: Some(name.into()),
        }
    }

    /// Parse a CRS identifier as found in GeoJSON `crs` members and CLI flags.
    ///
    /// Recognized forms:
    /// - `EPSG:32633`, `epsg:4326`
    /// - `urn:ogc:def:crs:EPSG::32633`, `urn:ogc:def:crs:EPSG:6.6:32633`
    /// - `urn:ogc:def:crs:OGC:1.3:CRS84`, `CRS84` (WGS84 lon/lat)
    ///
    /// Anything else is kept as an opaque named CRS.
    pub fn parse(identifier: &str) -> Self {
        let trimmed = identifier.trim();
        let upper = trimmed.to_ascii_uppercase();

        if upper.ends_with("CRS84") {
            return Self::wgs84();
        }

        if upper.starts_with("EPSG:") || upper.starts_with("URN:OGC:DEF:CRS:EPSG:") {
            // The code is always the last colon-separated component
            if let Some(code) = upper.rsplit(':').next().and_then(|c| c.parse::<u32>().ok()) {
                return Self::from_epsg(code);
            }
        }

        Self::from_name(trimmed)
    }

    /// WGS84 geographic CRS (EPSG:4326)
    pub fn wgs84() -> Self {
        Self::from_epsg(4326)
    }

    /// Web Mercator (EPSG:3857)
    pub fn web_mercator() -> Self {
        Self::from_epsg(3857)
    }

    /// Get EPSG code if known
    pub fn epsg(&self) -> Option<u32> {
        self.epsg
    }

    /// Get the opaque name, if this CRS has no EPSG code
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Whether this is a geographic (degree-based) CRS.
    ///
    /// EPSG codes 4000-4999 are geographic 2D systems.
    pub fn is_geographic(&self) -> bool {
        matches!(self.epsg, Some(code) if (4000..5000).contains(&code))
    }

    /// Check if two CRS are equivalent
    pub fn is_equivalent(&self, other: &CRS) -> bool {
        if let (Some(a), Some(b)) = (self.epsg, other.epsg) {
            return a == b;
        }

        if let (Some(a), Some(b)) = (&self.name, &other.name) {
            return a == b;
        }

        false
    }

    /// Get a string identifier for this CRS
    pub fn identifier(&self) -> String {
        if let Some(code) = self.epsg {
            return format!("EPSG:{}", code);
        }
        if let Some(name) = &self.name {
            return name.clone();
        }
        "Unknown".to_string()
    }

    /// OGC URN form used by legacy GeoJSON `crs` members
    pub fn urn(&self) -> String {
        match self.epsg {
            Some(code) => format!("urn:ogc:def:crs:EPSG::{}", code),
            None => self.identifier(),
        }
    }
}

impl fmt::Display for CRS {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.identifier())
    }
}

impl Default for CRS {
    fn default() -> Self {
        Self::wgs84()
    }
}
