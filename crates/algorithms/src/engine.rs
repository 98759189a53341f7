//! NDVI zonal statistics pipeline
//!
//! Loads a red and a near-infrared band plus a polygon collection, computes
//! the NDVI raster and attaches per-polygon statistics of it to every
//! feature. The collection is reprojected into the raster CRS first when the
//! two differ.

use crate::imagery::{ndvi, NormalizedDifferenceParams};
use crate::statistics::{attach_statistics, zonal_statistics, ZonalParams};
use crate::vector::reproject_collection;
use ndvizone_core::io::{read_geojson, read_geotiff, write_geotiff_to_writer};
use ndvizone_core::raster::{Raster, RasterStatistics};
use ndvizone_core::{Algorithm, CrsOrigin, Error, FeatureCollection, Result};
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Where the index raster lives between computation and aggregation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ScratchMode {
    /// Aggregate directly on the computed raster
    #[default]
    InMemory,
    /// Persist to a temporary GeoTIFF, read it back and aggregate on that.
    /// The file is removed when the pipeline returns.
    TempFile,
}

/// Parameters for [`compute_with`]
#[derive(Debug, Clone, Default)]
pub struct EngineParams {
    pub index: NormalizedDifferenceParams,
    pub zonal: ZonalParams,
    pub scratch: ScratchMode,
    /// Directory for the `TempFile` scratch raster. Default: system temp dir
    pub scratch_dir: Option<PathBuf>,
}

/// Non-fatal conditions met while running the pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineWarning {
    /// The vector input declared no CRS; WGS84 was assumed
    VectorCrsAssumed,
    /// The rasters carry no CRS; vector coordinates were used as-is
    RasterCrsMissing,
    /// The feature at this position has no geometry
    MissingGeometry { index: usize },
}

impl fmt::Display for EngineWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineWarning::VectorCrsAssumed => {
                write!(f, "vector input declares no CRS, assumed EPSG:4326")
            }
            EngineWarning::RasterCrsMissing => write!(
                f,
                "raster bands declare no CRS, vector coordinates taken as raster coordinates"
            ),
            EngineWarning::MissingGeometry { index } => {
                write!(f, "feature {} has no geometry, statistics are null", index)
            }
        }
    }
}

/// Result of the pipeline
#[derive(Debug, Clone)]
pub struct ZonalOutput {
    /// Input features in the raster CRS, with statistic attributes attached
    pub features: FeatureCollection,
    /// Whether the vector CRS was declared or assumed
    pub vector_crs_origin: CrsOrigin,
    /// Whether the features were reprojected into the raster CRS
    pub reprojected: bool,
    pub warnings: Vec<EngineWarning>,
    /// Value range and counts of the index raster
    pub index_summary: RasterStatistics<f64>,
    /// Raster extent (min_x, min_y, max_x, max_y) in raster CRS
    pub raster_bounds: (f64, f64, f64, f64),
}

/// Input sources for [`NdviZonalStats`]
#[derive(Debug, Clone)]
pub struct EngineInputs {
    pub vector: PathBuf,
    pub red: PathBuf,
    pub nir: PathBuf,
}

/// NDVI zonal statistics as an [`Algorithm`]
#[derive(Debug, Clone, Default)]
pub struct NdviZonalStats;

impl Algorithm for NdviZonalStats {
    type Input = EngineInputs;
    type Output = ZonalOutput;
    type Params = EngineParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "NdviZonalStats"
    }

    fn description(&self) -> &'static str {
        "Compute NDVI from red and NIR bands and aggregate it over polygon features"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        compute_with(&input.vector, &input.red, &input.nir, &params)
    }
}

/// Run the pipeline with default parameters
pub fn compute(
    vector: impl AsRef<Path>,
    red: impl AsRef<Path>,
    nir: impl AsRef<Path>,
) -> Result<ZonalOutput> {
    compute_with(vector, red, nir, &EngineParams::default())
}

/// Run the pipeline on file inputs.
///
/// `red` and `nir` are single-band GeoTIFFs on the same pixel grid; `vector`
/// is a GeoJSON file of polygonal features.
pub fn compute_with(
    vector: impl AsRef<Path>,
    red: impl AsRef<Path>,
    nir: impl AsRef<Path>,
    params: &EngineParams,
) -> Result<ZonalOutput> {
    let red: Raster<f64> = read_geotiff(red.as_ref(), None)?;
    let nir: Raster<f64> = read_geotiff(nir.as_ref(), None)?;
    let features = read_geojson(vector.as_ref())?;
    compute_from_rasters(features, &red, &nir, params)
}

/// Run the pipeline on already loaded inputs
pub fn compute_from_rasters(
    features: FeatureCollection,
    red: &Raster<f64>,
    nir: &Raster<f64>,
    params: &EngineParams,
) -> Result<ZonalOutput> {
    red.check_same_grid(nir)?;
    if features.is_empty() {
        return Err(Error::EmptyGeometry);
    }

    let (rows, cols) = red.shape();
    debug!("computing NDVI on {}x{} grid", cols, rows);
    let index = ndvi(red, nir, params.index)?;

    match params.scratch {
        ScratchMode::InMemory => summarize(features, &index, params),
        ScratchMode::TempFile => {
            let scratch = persist_scratch(&index, params.scratch_dir.as_deref())?;
            let reloaded: Raster<f64> = read_geotiff(scratch.path(), None)
                .map_err(|e| Error::ScratchWrite(format!("reading back {}: {}", scratch.path().display(), e)))?;
            summarize(features, &reloaded, params)
        }
    }
}

/// Write the index raster to a uniquely named temporary GeoTIFF.
/// The file is deleted when the returned guard is dropped.
fn persist_scratch(index: &Raster<f64>, dir: Option<&Path>) -> Result<tempfile::NamedTempFile> {
    let mut builder = tempfile::Builder::new();
    builder.prefix("ndvizone-").suffix(".tif");
    let mut file = match dir {
        Some(dir) => builder.tempfile_in(dir),
        None => builder.tempfile(),
    }
    .map_err(|e| Error::ScratchWrite(e.to_string()))?;

    write_geotiff_to_writer(index, file.as_file_mut())
        .map_err(|e| Error::ScratchWrite(e.to_string()))?;
    file.as_file_mut()
        .flush()
        .map_err(|e| Error::ScratchWrite(e.to_string()))?;

    debug!("index raster written to {}", file.path().display());
    Ok(file)
}

fn summarize(
    features: FeatureCollection,
    index: &Raster<f64>,
    params: &EngineParams,
) -> Result<ZonalOutput> {
    let mut warnings = Vec::new();
    let vector_crs_origin = features.crs_origin;

    if vector_crs_origin == CrsOrigin::AssumedWgs84 {
        warn!("vector input declares no CRS, assuming EPSG:4326");
        warnings.push(EngineWarning::VectorCrsAssumed);
    }

    let (mut features, reprojected) = match index.crs() {
        None => {
            warn!("raster bands declare no CRS, using vector coordinates as-is");
            warnings.push(EngineWarning::RasterCrsMissing);
            (features, false)
        }
        Some(raster_crs) if features.crs.is_equivalent(raster_crs) => (features, false),
        Some(raster_crs) => (reproject_collection(&features, raster_crs)?, true),
    };

    for (position, feature) in features.iter().enumerate() {
        if feature.geometry.is_none() {
            warn!("feature {} has no geometry", position);
            warnings.push(EngineWarning::MissingGeometry { index: position });
        }
    }

    let results = zonal_statistics(index, &features, &params.zonal)?;
    attach_statistics(&mut features, &results, &params.zonal.stats);

    let index_summary = index.statistics();
    debug!(
        "index range {:?}..{:?}, {} valid pixels",
        index_summary.min, index_summary.max, index_summary.valid_count
    );

    Ok(ZonalOutput {
        features,
        vector_crs_origin,
        reprojected,
        warnings,
        index_summary,
        raster_bounds: index.bounds(),
    })
}
