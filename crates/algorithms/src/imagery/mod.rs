//! Imagery analysis algorithms
//!
//! - Normalized difference: generic two-band index with a denominator epsilon
//! - NDVI: vegetation index from red and near-infrared bands

mod indices;

pub use indices::{ndvi, normalized_difference, NormalizedDifferenceParams};
