//! Zonal statistics over polygon zones
//!
//! Each feature of a collection defines one zone. A pixel belongs to a zone
//! when its center lies strictly inside the polygon (pixels whose center is
//! exactly on the boundary are left out). With `all_touched`, every pixel
//! whose footprint intersects the polygon belongs to it instead. Nodata and
//! NaN pixels never contribute.

use geo::{BoundingRect, Contains, Intersects};
use geo::{Geometry, LineString, MultiPolygon, Point, Polygon};
use ndvizone_core::raster::Raster;
use ndvizone_core::{AttributeValue, Error, FeatureCollection, Result};
use std::fmt;
use std::str::FromStr;

/// Statistics that can be attached to features
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZonalStatistic {
    Mean,
    Count,
    Sum,
    Min,
    Max,
}

impl ZonalStatistic {
    /// Attribute name under which the statistic is stored
    pub fn attribute_name(&self) -> &'static str {
        match self {
            ZonalStatistic::Mean => "mean",
            ZonalStatistic::Count => "count",
            ZonalStatistic::Sum => "sum",
            ZonalStatistic::Min => "min",
            ZonalStatistic::Max => "max",
        }
    }
}

impl fmt::Display for ZonalStatistic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.attribute_name())
    }
}

impl FromStr for ZonalStatistic {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mean" => Ok(ZonalStatistic::Mean),
            "count" => Ok(ZonalStatistic::Count),
            "sum" => Ok(ZonalStatistic::Sum),
            "min" => Ok(ZonalStatistic::Min),
            "max" => Ok(ZonalStatistic::Max),
            other => Err(Error::InvalidParameter {
                name: "stats",
                value: other.to_string(),
                reason: "expected one of mean, count, sum, min, max".to_string(),
            }),
        }
    }
}

/// Parameters for polygon zonal statistics
#[derive(Debug, Clone)]
pub struct ZonalParams {
    /// Include every pixel touched by the polygon instead of only pixels
    /// whose center is inside it. Default: false
    pub all_touched: bool,
    /// Statistics attached to each feature. Default: mean only
    pub stats: Vec<ZonalStatistic>,
}

impl Default for ZonalParams {
    fn default() -> Self {
        Self {
            all_touched: false,
            stats: vec![ZonalStatistic::Mean],
        }
    }
}

/// Accumulated values of one zone
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZonalResult {
    pub count: usize,
    pub sum: f64,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl ZonalResult {
    fn empty() -> Self {
        Self {
            count: 0,
            sum: 0.0,
            min: None,
            max: None,
        }
    }

    fn add(&mut self, value: f64) {
        self.count += 1;
        self.sum += value;
        self.min = Some(self.min.map_or(value, |m| m.min(value)));
        self.max = Some(self.max.map_or(value, |m| m.max(value)));
    }

    /// Arithmetic mean, `None` when no valid pixel fell in the zone
    pub fn mean(&self) -> Option<f64> {
        if self.count > 0 {
            Some(self.sum / self.count as f64)
        } else {
            None
        }
    }

    /// Value of one statistic as a feature attribute
    pub fn attribute(&self, statistic: ZonalStatistic) -> AttributeValue {
        match statistic {
            ZonalStatistic::Mean => AttributeValue::from_optional_f64(self.mean()),
            ZonalStatistic::Count => AttributeValue::Int(self.count as i64),
            ZonalStatistic::Sum if self.count == 0 => AttributeValue::Null,
            ZonalStatistic::Sum => AttributeValue::Float(self.sum),
            ZonalStatistic::Min => AttributeValue::from_optional_f64(self.min),
            ZonalStatistic::Max => AttributeValue::from_optional_f64(self.max),
        }
    }
}

/// Convert a polygonal geometry into a `MultiPolygon`.
///
/// `index` is the feature position, used for error reporting.
pub fn to_multipolygon(geometry: &Geometry<f64>, index: usize) -> Result<MultiPolygon<f64>> {
    let unsupported = |kind: &str| Error::UnsupportedGeometry {
        index,
        kind: kind.to_string(),
    };

    match geometry {
        Geometry::Polygon(p) => Ok(MultiPolygon::new(vec![p.clone()])),
        Geometry::MultiPolygon(mp) => Ok(mp.clone()),
        Geometry::Rect(r) => Ok(MultiPolygon::new(vec![r.to_polygon()])),
        Geometry::Triangle(t) => Ok(MultiPolygon::new(vec![t.to_polygon()])),
        Geometry::GeometryCollection(gc) => {
            let mut polygons = Vec::new();
            for part in gc.iter() {
                polygons.extend(to_multipolygon(part, index)?.0);
            }
            Ok(MultiPolygon::new(polygons))
        }
        Geometry::Point(_) => Err(unsupported("Point")),
        Geometry::MultiPoint(_) => Err(unsupported("MultiPoint")),
        Geometry::Line(_) => Err(unsupported("Line")),
        Geometry::LineString(_) => Err(unsupported("LineString")),
        Geometry::MultiLineString(_) => Err(unsupported("MultiLineString")),
    }
}

/// Accumulate the valid pixels of `values` that belong to `zone`.
///
/// Only the pixel window covering the zone's bounding box is visited.
pub fn zonal_statistics_polygon(
    values: &Raster<f64>,
    zone: &MultiPolygon<f64>,
    all_touched: bool,
) -> ZonalResult {
    let mut result = ZonalResult::empty();

    let Some((row_range, col_range)) = pixel_window(values, zone) else {
        return result;
    };

    let transform = values.transform();
    for row in row_range {
        for col in col_range.clone() {
            let inside = if all_touched {
                let corners = transform.pixel_footprint(col, row);
                let mut ring: Vec<(f64, f64)> = corners.to_vec();
                ring.push(corners[0]);
                zone.intersects(&Polygon::new(LineString::from(ring), vec![]))
            } else {
                let (x, y) = transform.pixel_to_geo(col, row);
                zone.contains(&Point::new(x, y))
            };
            if !inside {
                continue;
            }

            let value = unsafe { values.get_unchecked(row, col) };
            if values.is_nodata(value) {
                continue;
            }
            result.add(value);
        }
    }

    result
}

/// Row and column ranges of the pixels overlapping the zone's bounding box,
/// clipped to the raster. `None` when they do not overlap.
fn pixel_window(
    values: &Raster<f64>,
    zone: &MultiPolygon<f64>,
) -> Option<(std::ops::Range<usize>, std::ops::Range<usize>)> {
    let rect = zone.bounding_rect()?;
    let (min, max) = (rect.min(), rect.max());

    let corners = [
        values.geo_to_pixel(min.x, min.y),
        values.geo_to_pixel(min.x, max.y),
        values.geo_to_pixel(max.x, min.y),
        values.geo_to_pixel(max.x, max.y),
    ];
    if corners.iter().any(|(c, r)| !c.is_finite() || !r.is_finite()) {
        return None;
    }

    let min_col = corners.iter().map(|c| c.0).fold(f64::INFINITY, f64::min);
    let max_col = corners.iter().map(|c| c.0).fold(f64::NEG_INFINITY, f64::max);
    let min_row = corners.iter().map(|c| c.1).fold(f64::INFINITY, f64::min);
    let max_row = corners.iter().map(|c| c.1).fold(f64::NEG_INFINITY, f64::max);

    let (rows, cols) = values.shape();
    let clip = |lo: f64, hi: f64, n: usize| {
        let start = lo.floor().max(0.0).min(n as f64) as usize;
        let end = hi.ceil().max(0.0).min(n as f64) as usize;
        (start < end).then_some(start..end)
    };

    Some((clip(min_row, max_row, rows)?, clip(min_col, max_col, cols)?))
}

/// Compute zonal statistics for every feature of a collection.
///
/// The collection must already be in the raster's CRS. Features without
/// geometry yield `None`; non-polygonal geometries fail with
/// `UnsupportedGeometry`.
pub fn zonal_statistics(
    values: &Raster<f64>,
    features: &FeatureCollection,
    params: &ZonalParams,
) -> Result<Vec<Option<ZonalResult>>> {
    features
        .iter()
        .enumerate()
        .map(|(index, feature)| {
            feature
                .geometry
                .as_ref()
                .map(|geometry| {
                    let zone = to_multipolygon(geometry, index)?;
                    Ok(zonal_statistics_polygon(values, &zone, params.all_touched))
                })
                .transpose()
        })
        .collect()
}

/// Attach the requested statistics to each feature as attributes.
///
/// Features with no result get `Null` for every statistic except `count`,
/// which is 0.
pub fn attach_statistics(
    features: &mut FeatureCollection,
    results: &[Option<ZonalResult>],
    stats: &[ZonalStatistic],
) {
    for (feature, result) in features.iter_mut().zip(results) {
        let result = result.unwrap_or_else(ZonalResult::empty);
        for &statistic in stats {
            feature.set_property(statistic.attribute_name(), result.attribute(statistic));
        }
    }
}
