//! Vector operations
//!
//! - **reproject**: Coordinate reprojection of feature collections

pub mod reproject;

pub use reproject::{reproject_collection, CoordTransform, Projection};
