//! Error types for ndvizone

use thiserror::Error;

/// Main error type for ndvizone operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A raster or vector source could not be opened or parsed
    #[error("cannot read {source_name}: {reason}")]
    InputRead { source_name: String, reason: String },

    #[error("Invalid raster dimensions: {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },

    #[error("Index out of bounds: ({row}, {col}) in raster of size ({rows}, {cols})")]
    IndexOutOfBounds {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },

    /// Two bands that must share a pixel grid have different dimensions
    #[error("Raster shape mismatch: expected ({er}, {ec}), got ({ar}, {ac})")]
    ShapeMismatch { er: usize, ec: usize, ar: usize, ac: usize },

    /// Two bands have equal dimensions but are not georeferenced identically
    #[error("Geotransform mismatch: expected {expected:?}, got {actual:?}")]
    TransformMismatch { expected: [f64; 6], actual: [f64; 6] },

    #[error("CRS mismatch: {0} vs {1}")]
    CrsMismatch(String, String),

    #[error("vector input contains no features")]
    EmptyGeometry,

    #[error("cannot write scratch raster: {0}")]
    ScratchWrite(String),

    #[error("unsupported geometry for feature {index}: {kind}")]
    UnsupportedGeometry { index: usize, kind: String },

    #[error("unsupported reprojection from {from} to {to}")]
    UnsupportedReprojection { from: String, to: String },

    #[error("Invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Shorthand for [`Error::InputRead`]
    pub fn input_read(source_name: impl Into<String>, reason: impl ToString) -> Self {
        Error::InputRead {
            source_name: source_name.into(),
            reason: reason.to_string(),
        }
    }
}

/// Result type alias for ndvizone operations
pub type Result<T> = std::result::Result<T, Error>;
