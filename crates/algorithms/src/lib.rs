//! # ndvizone Algorithms
//!
//! Processing steps for NDVI zonal statistics.
//!
//! ## Modules
//!
//! - **imagery**: Normalized-difference spectral indices (NDVI)
//! - **statistics**: Zonal statistics over polygon features
//! - **vector**: Feature collection reprojection
//! - **engine**: The end-to-end NDVI/zonal statistics pipeline

pub(crate) mod maybe_rayon;

pub mod engine;
pub mod imagery;
pub mod statistics;
pub mod vector;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::engine::{
        compute, compute_from_rasters, compute_with, EngineInputs, EngineParams, EngineWarning,
        NdviZonalStats, ScratchMode, ZonalOutput,
    };
    pub use crate::imagery::{ndvi, normalized_difference, NormalizedDifferenceParams};
    pub use crate::statistics::{
        zonal_statistics, ZonalParams, ZonalResult, ZonalStatistic,
    };
    pub use crate::vector::reproject_collection;
    pub use ndvizone_core::prelude::*;
}
