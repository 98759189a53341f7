//! I/O operations for reading and writing geospatial data
//!
//! - **geotiff**: single-band GeoTIFF rasters (native `tiff` decoder/encoder)
//! - **geojson**: polygon feature collections

mod geojson;
mod geotiff;

pub use self::geojson::{parse_geojson, read_geojson, to_geojson_string, write_geojson};
pub use self::geotiff::{
    read_geotiff, read_geotiff_from_buffer, write_geotiff, write_geotiff_to_buffer,
    write_geotiff_to_writer,
};
