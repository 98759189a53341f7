//! Statistical analysis algorithms for raster data
//!
//! - **zonal**: Statistics of raster values inside vector polygons

pub mod zonal;

pub use zonal::{
    attach_statistics, to_multipolygon, zonal_statistics, zonal_statistics_polygon, ZonalParams,
    ZonalResult, ZonalStatistic,
};
