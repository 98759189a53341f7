//! Pure-Rust vector reprojection (Snyder 1987, USGS formulas).
//!
//! Supports geographic WGS84 (EPSG:4326 / OGC CRS84), Web Mercator
//! (EPSG:3857) and WGS84 UTM zones (EPSG 326xx North, 327xx South), which
//! covers Sentinel-2 and Landsat scenes. Every transformation goes through
//! geographic WGS84. No external C dependencies (no libproj).

use geo::{Coord, Geometry, MapCoords};
use ndvizone_core::{Error, FeatureCollection, Result, CRS};
use tracing::debug;

// ── WGS84 ellipsoid constants ────────────────────────────────────────────

const A: f64 = 6_378_137.0; // semi-major axis (m)
const F: f64 = 1.0 / 298.257_223_563; // flattening
const E2: f64 = 2.0 * F - F * F; // eccentricity squared
const E_PRIME2: f64 = E2 / (1.0 - E2); // second eccentricity squared
const K0: f64 = 0.9996; // UTM scale factor
const FALSE_EASTING: f64 = 500_000.0;
const FALSE_NORTHING_SOUTH: f64 = 10_000_000.0;

/// Latitude limit of the Web Mercator projection
const MERCATOR_MAX_LAT: f64 = 85.051_128_779_806_59;

/// A projection this module can evaluate
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Projection {
    /// Longitude/latitude in degrees
    Geographic,
    /// Spherical Web Mercator in metres
    WebMercator,
    /// Universal Transverse Mercator in metres
    Utm { zone: u32, north: bool },
}

impl Projection {
    /// Resolve a CRS into a supported projection
    pub fn from_crs(crs: &CRS) -> Option<Self> {
        let epsg = crs.epsg()?;
        if is_wgs84(epsg) {
            return Some(Projection::Geographic);
        }
        if epsg == 3857 {
            return Some(Projection::WebMercator);
        }
        parse_utm_epsg(epsg).map(|(zone, north)| Projection::Utm { zone, north })
    }

    fn to_wgs84(self, x: f64, y: f64) -> (f64, f64) {
        match self {
            Projection::Geographic => (x, y),
            Projection::WebMercator => web_mercator_to_wgs84(x, y),
            Projection::Utm { zone, north } => utm_to_wgs84(x, y, zone, north),
        }
    }

    fn from_wgs84(self, lon: f64, lat: f64) -> (f64, f64) {
        match self {
            Projection::Geographic => (lon, lat),
            Projection::WebMercator => wgs84_to_web_mercator(lon, lat),
            Projection::Utm { zone, north } => wgs84_to_utm(lon, lat, zone, north),
        }
    }
}

/// A resolved source → target coordinate transformation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoordTransform {
    source: Projection,
    target: Projection,
}

impl CoordTransform {
    /// Build the transformation between two CRSs.
    ///
    /// Fails with `UnsupportedReprojection` when either side is not one of
    /// the supported projections.
    pub fn new(source: &CRS, target: &CRS) -> Result<Self> {
        let unsupported = || Error::UnsupportedReprojection {
            from: source.identifier(),
            to: target.identifier(),
        };
        Ok(Self {
            source: Projection::from_crs(source).ok_or_else(unsupported)?,
            target: Projection::from_crs(target).ok_or_else(unsupported)?,
        })
    }

    /// Transform one coordinate pair
    pub fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        if self.source == self.target {
            return (x, y);
        }
        let (lon, lat) = self.source.to_wgs84(x, y);
        self.target.from_wgs84(lon, lat)
    }

    /// Transform every vertex of a geometry
    pub fn apply_geometry(&self, geometry: &Geometry<f64>) -> Geometry<f64> {
        geometry.map_coords(|Coord { x, y }| {
            let (x, y) = self.apply(x, y);
            Coord { x, y }
        })
    }
}

/// Reproject every feature of a collection into `target`.
///
/// When the collection is already in an equivalent CRS it is returned
/// unchanged (coordinates are not touched). Attributes and feature order are
/// preserved; the returned collection keeps the input's `crs_origin`.
pub fn reproject_collection(collection: &FeatureCollection, target: &CRS) -> Result<FeatureCollection> {
    if collection.crs.is_equivalent(target) {
        return Ok(collection.clone());
    }

    let transform = CoordTransform::new(&collection.crs, target)?;
    debug!("reprojecting {} features from {} to {}", collection.len(), collection.crs, target);

    let mut output = collection.clone();
    for feature in output.iter_mut() {
        if let Some(geometry) = feature.geometry.as_mut() {
            *geometry = transform.apply_geometry(geometry);
        }
    }
    output.crs = target.clone();
    Ok(output)
}

/// Check if an EPSG code represents WGS84 geographic.
pub fn is_wgs84(epsg: u32) -> bool {
    epsg == 4326
}

/// Parse an EPSG code into UTM zone info: `Some((zone, is_north))`.
///
/// - EPSG 326xx → zone xx, North hemisphere
/// - EPSG 327xx → zone xx, South hemisphere
pub fn parse_utm_epsg(epsg: u32) -> Option<(u32, bool)> {
    if (32601..=32660).contains(&epsg) {
        Some((epsg - 32600, true))
    } else if (32701..=32760).contains(&epsg) {
        Some((epsg - 32700, false))
    } else {
        None
    }
}

// ── Web Mercator ─────────────────────────────────────────────────────────

fn wgs84_to_web_mercator(lon_deg: f64, lat_deg: f64) -> (f64, f64) {
    let lat = lat_deg.clamp(-MERCATOR_MAX_LAT, MERCATOR_MAX_LAT).to_radians();
    let x = A * lon_deg.to_radians();
    let y = A * (std::f64::consts::FRAC_PI_4 + lat / 2.0).tan().ln();
    (x, y)
}

fn web_mercator_to_wgs84(x: f64, y: f64) -> (f64, f64) {
    let lon = (x / A).to_degrees();
    let lat = (2.0 * (y / A).exp().atan() - std::f64::consts::FRAC_PI_2).to_degrees();
    (lon, lat)
}

// ── UTM (Snyder 1987, USGS Prof. Paper 1395, pp. 61-64) ──────────────────

fn central_meridian(zone: u32) -> f64 {
    ((zone as f64 - 1.0) * 6.0 - 180.0 + 3.0).to_radians()
}

/// Convert WGS84 (longitude, latitude) in degrees to UTM (easting, northing)
/// in metres for the given zone and hemisphere.
fn wgs84_to_utm(lon_deg: f64, lat_deg: f64, zone: u32, north: bool) -> (f64, f64) {
    let lat = lat_deg.to_radians();
    let lon = lon_deg.to_radians();
    let lon0 = central_meridian(zone);

    let sin_lat = lat.sin();
    let cos_lat = lat.cos();
    let tan_lat = lat.tan();

    let n = A / (1.0 - E2 * sin_lat * sin_lat).sqrt();
    let t = tan_lat * tan_lat;
    let c = E_PRIME2 * cos_lat * cos_lat;
    let a_coeff = cos_lat * (lon - lon0);

    let m = meridional_arc(lat);

    let a2 = a_coeff * a_coeff;
    let a4 = a2 * a2;
    let a6 = a4 * a2;

    // Snyder eq. 8-9
    let easting = K0 * n
        * (a_coeff
            + (1.0 - t + c) * a2 * a_coeff / 6.0
            + (5.0 - 18.0 * t + t * t + 72.0 * c - 58.0 * E_PRIME2) * a4 * a_coeff / 120.0)
        + FALSE_EASTING;

    // Snyder eq. 8-10
    let northing = K0
        * (m
            + n * tan_lat
                * (a2 / 2.0
                    + (5.0 - t + 9.0 * c + 4.0 * c * c) * a4 / 24.0
                    + (61.0 - 58.0 * t + t * t + 600.0 * c - 330.0 * E_PRIME2) * a6 / 720.0));

    let northing = if north {
        northing
    } else {
        northing + FALSE_NORTHING_SOUTH
    };

    (easting, northing)
}

/// Convert UTM (easting, northing) in metres back to WGS84 (longitude,
/// latitude) in degrees. Snyder eqs. 8-12 to 8-18 with the footpoint
/// latitude series 3-26.
fn utm_to_wgs84(easting: f64, northing: f64, zone: u32, north: bool) -> (f64, f64) {
    let x = easting - FALSE_EASTING;
    let y = if north {
        northing
    } else {
        northing - FALSE_NORTHING_SOUTH
    };

    let e4 = E2 * E2;
    let e6 = e4 * E2;
    let m = y / K0;
    let mu = m / (A * (1.0 - E2 / 4.0 - 3.0 * e4 / 64.0 - 5.0 * e6 / 256.0));

    let sqrt_1_e2 = (1.0 - E2).sqrt();
    let e1 = (1.0 - sqrt_1_e2) / (1.0 + sqrt_1_e2);
    let e1_2 = e1 * e1;
    let e1_3 = e1_2 * e1;
    let e1_4 = e1_3 * e1;

    let phi1 = mu
        + (3.0 * e1 / 2.0 - 27.0 * e1_3 / 32.0) * (2.0 * mu).sin()
        + (21.0 * e1_2 / 16.0 - 55.0 * e1_4 / 32.0) * (4.0 * mu).sin()
        + (151.0 * e1_3 / 96.0) * (6.0 * mu).sin()
        + (1097.0 * e1_4 / 512.0) * (8.0 * mu).sin();

    let sin_phi1 = phi1.sin();
    let cos_phi1 = phi1.cos();
    let tan_phi1 = phi1.tan();

    let c1 = E_PRIME2 * cos_phi1 * cos_phi1;
    let t1 = tan_phi1 * tan_phi1;
    let w = 1.0 - E2 * sin_phi1 * sin_phi1;
    let n1 = A / w.sqrt();
    let r1 = A * (1.0 - E2) / w.powf(1.5);
    let d = x / (n1 * K0);

    let d2 = d * d;
    let d3 = d2 * d;
    let d4 = d3 * d;
    let d5 = d4 * d;
    let d6 = d5 * d;

    let lat = phi1
        - (n1 * tan_phi1 / r1)
            * (d2 / 2.0
                - (5.0 + 3.0 * t1 + 10.0 * c1 - 4.0 * c1 * c1 - 9.0 * E_PRIME2) * d4 / 24.0
                + (61.0 + 90.0 * t1 + 298.0 * c1 + 45.0 * t1 * t1 - 252.0 * E_PRIME2 - 3.0 * c1 * c1)
                    * d6
                    / 720.0);

    let lon = central_meridian(zone)
        + (d - (1.0 + 2.0 * t1 + c1) * d3 / 6.0
            + (5.0 - 2.0 * c1 + 28.0 * t1 - 3.0 * c1 * c1 + 8.0 * E_PRIME2 + 24.0 * t1 * t1) * d5
                / 120.0)
            / cos_phi1;

    (lon.to_degrees(), lat.to_degrees())
}

/// Meridional arc from equator to latitude `lat` (radians).
/// Snyder eq. 3-21.
fn meridional_arc(lat: f64) -> f64 {
    let e2 = E2;
    let e4 = e2 * e2;
    let e6 = e4 * e2;

    A * ((1.0 - e2 / 4.0 - 3.0 * e4 / 64.0 - 5.0 * e6 / 256.0) * lat
        - (3.0 * e2 / 8.0 + 3.0 * e4 / 32.0 + 45.0 * e6 / 1024.0) * (2.0 * lat).sin()
        + (15.0 * e4 / 256.0 + 45.0 * e6 / 1024.0) * (4.0 * lat).sin()
        - (35.0 * e6 / 3072.0) * (6.0 * lat).sin())
}

// ── Tests ────────────────────────────────────────────────────────────────
