//! Normalized-difference spectral indices
//!
//! Indices operate on single-band rasters (one band per raster) that share
//! one pixel grid.

use crate::maybe_rayon::*;
use ndvizone_core::raster::Raster;
use ndvizone_core::Result;

/// Parameters for [`normalized_difference`]
#[derive(Debug, Clone, Copy)]
pub struct NormalizedDifferenceParams {
    /// Added to the denominator so that `a = b = 0` yields 0 instead of NaN.
    /// Default: 1e-10
    pub epsilon: f64,
}

impl Default for NormalizedDifferenceParams {
    fn default() -> Self {
        Self { epsilon: 1e-10 }
    }
}

/// Compute the normalized difference between two bands:
///
/// `(band_a - band_b) / (band_a + band_b + epsilon)`
///
/// The result is not clamped. Pixels where either band is nodata (or NaN)
/// are NaN in the output, and the output's nodata value is NaN. The output
/// carries `band_a`'s transform and CRS.
///
/// Fails with `ShapeMismatch`, `TransformMismatch` or `CrsMismatch` when the
/// two bands are not on the same pixel grid.
pub fn normalized_difference(
    band_a: &Raster<f64>,
    band_b: &Raster<f64>,
    params: NormalizedDifferenceParams,
) -> Result<Raster<f64>> {
    band_a.check_same_grid(band_b)?;

    let (rows, cols) = band_a.shape();
    let eps = params.epsilon;

    let data: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![f64::NAN; cols];
            for (col, out) in row_data.iter_mut().enumerate() {
                let a = unsafe { band_a.get_unchecked(row, col) };
                let b = unsafe { band_b.get_unchecked(row, col) };

                if band_a.is_nodata(a) || band_b.is_nodata(b) {
                    continue;
                }

                *out = (a - b) / (a + b + eps);
            }
            row_data
        })
        .collect();

    let mut output = Raster::from_vec(data, rows, cols)?;
    output.set_transform(*band_a.transform());
    output.set_crs(band_a.crs().cloned());
    output.set_nodata(Some(f64::NAN));
    Ok(output)
}

/// Normalized Difference Vegetation Index
///
/// `NDVI = (NIR - Red) / (NIR + Red + epsilon)`
///
/// Typical values:
/// - Dense vegetation: 0.6 to 0.9
/// - Sparse vegetation: 0.2 to 0.5
/// - Bare soil: 0.1 to 0.2
/// - Water/clouds: -1.0 to 0.0
///
/// The output carries the red band's transform and CRS.
///
/// # Arguments
/// * `red` - Red band
/// * `nir` - Near-infrared band
pub fn ndvi(red: &Raster<f64>, nir: &Raster<f64>, params: NormalizedDifferenceParams) -> Result<Raster<f64>> {
    let mut output = normalized_difference(nir, red, params)?;
    output.set_transform(*red.transform());
    output.set_crs(red.crs().cloned());
    Ok(output)
}
