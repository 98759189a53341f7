//! Native GeoTIFF reading/writing
//!
//! Uses the `tiff` crate for pixel I/O and reads/writes the GeoTIFF tags
//! needed to georeference a band: pixel scale, tiepoint, transformation
//! matrix, the EPSG code from the GeoKey directory, and GDAL's nodata tag.

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::raster::{GeoTransform, Raster, RasterElement};
use std::fs::File;
use std::io::{Cursor, Read, Seek, Write};
use std::path::Path;
use tiff::decoder::{Decoder, DecodingResult};
use tiff::encoder::colortype::Gray32Float;
use tiff::encoder::TiffEncoder;
use tiff::tags::Tag;
use tracing::debug;

const MODEL_PIXEL_SCALE: u16 = 33550;
const MODEL_TIEPOINT: u16 = 33922;
const MODEL_TRANSFORMATION: u16 = 34264;
const GEO_KEY_DIRECTORY: u16 = 34735;
const GDAL_NODATA: u16 = 42113;

const GT_MODEL_TYPE_KEY: u16 = 1024;
const GT_RASTER_TYPE_KEY: u16 = 1025;
const GEOGRAPHIC_TYPE_KEY: u16 = 2048;
const PROJECTED_CS_TYPE_KEY: u16 = 3072;
/// GeoKey value meaning "user-defined", i.e. no EPSG code
const USER_DEFINED: u16 = 32767;

/// Read band `band` (1-based, default 1) of a GeoTIFF file into a Raster
pub fn read_geotiff<T, P>(path: P, band: Option<usize>) -> Result<Raster<T>>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let source = path.display().to_string();
    let file = File::open(path).map_err(|e| Error::input_read(&source, e))?;
    let raster = decode_geotiff(file, band, &source)?;
    debug!(
        "read {} ({}x{}, crs={:?})",
        source,
        raster.cols(),
        raster.rows(),
        raster.crs().map(CRS::identifier)
    );
    Ok(raster)
}

/// Read a GeoTIFF from an in-memory buffer into a Raster
///
/// Same as `read_geotiff` but operates on a byte slice instead of a file path.
pub fn read_geotiff_from_buffer<T>(data: &[u8], band: Option<usize>) -> Result<Raster<T>>
where
    T: RasterElement,
{
    decode_geotiff(Cursor::new(data), band, "<buffer>")
}

fn decode_geotiff<T, R>(reader: R, band: Option<usize>, source: &str) -> Result<Raster<T>>
where
    T: RasterElement,
    R: Read + Seek,
{
    let read_err = |e: tiff::TiffError| Error::input_read(source, e);

    let mut decoder = Decoder::new(reader).map_err(read_err)?;
    let (width, height) = decoder.dimensions().map_err(read_err)?;
    let rows = height as usize;
    let cols = width as usize;

    let samples = decoder
        .get_tag_u32(Tag::SamplesPerPixel)
        .map(|s| s.max(1) as usize)
        .unwrap_or(1);
    let band = band.unwrap_or(1);
    if band == 0 || band > samples {
        return Err(Error::InvalidParameter {
            name: "band",
            value: band.to_string(),
            reason: format!("{} has {} band(s)", source, samples),
        });
    }

    let samples_f64 = decoding_result_to_f64(decoder.read_image().map_err(read_err)?)
        .ok_or_else(|| Error::input_read(source, "unsupported TIFF pixel format"))?;
    if samples_f64.len() != rows * cols * samples {
        return Err(Error::input_read(
            source,
            format!(
                "expected {} samples for {}x{}x{}, decoded {}",
                rows * cols * samples,
                cols,
                rows,
                samples,
                samples_f64.len()
            ),
        ));
    }

    // Chunky (pixel-interleaved) layout: band b of pixel i sits at i * samples + b
    let data: Vec<T> = samples_f64
        .iter()
        .skip(band - 1)
        .step_by(samples)
        .map(|&v| T::from_f64_or_nodata(v))
        .collect();

    let mut raster = Raster::from_vec(data, rows, cols)?;

    if let Some(transform) = read_geotransform(&mut decoder) {
        raster.set_transform(transform);
    }
    raster.set_crs(read_crs(&mut decoder));
    raster.set_nodata(read_nodata(&mut decoder).map(T::from_f64_or_nodata));

    Ok(raster)
}

macro_rules! widen {
    ($buf:expr) => {
        $buf.into_iter().map(|v| v as f64).collect()
    };
}

fn decoding_result_to_f64(result: DecodingResult) -> Option<Vec<f64>> {
    #[allow(unreachable_patterns)]
    let values: Vec<f64> = match result {
        DecodingResult::U8(buf) => widen!(buf),
        DecodingResult::U16(buf) => widen!(buf),
        DecodingResult::U32(buf) => widen!(buf),
        DecodingResult::U64(buf) => widen!(buf),
        DecodingResult::I8(buf) => widen!(buf),
        DecodingResult::I16(buf) => widen!(buf),
        DecodingResult::I32(buf) => widen!(buf),
        DecodingResult::I64(buf) => widen!(buf),
        DecodingResult::F32(buf) => widen!(buf),
        DecodingResult::F64(buf) => buf,
        _ => return None,
    };
    Some(values)
}

/// Read the GeoTransform from ModelPixelScale + ModelTiepoint, or from the
/// ModelTransformation matrix.
fn read_geotransform<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<GeoTransform> {
    let scale = decoder.get_tag_f64_vec(Tag::from_u16_exhaustive(MODEL_PIXEL_SCALE)).ok();
    let tiepoint = decoder.get_tag_f64_vec(Tag::from_u16_exhaustive(MODEL_TIEPOINT)).ok();

    if let (Some(scale), Some(tiepoint)) = (&scale, &tiepoint) {
        if scale.len() >= 2 && tiepoint.len() >= 6 {
            // tiepoint: [I, J, K, X, Y, Z], scale: [ScaleX, ScaleY, ScaleZ]
            let origin_x = tiepoint[3] - tiepoint[0] * scale[0];
            let origin_y = tiepoint[4] + tiepoint[1] * scale[1];
            return Some(GeoTransform::new(origin_x, origin_y, scale[0], -scale[1]));
        }
    }

    // Row-major 4x4 matrix
    let t = decoder.get_tag_f64_vec(Tag::from_u16_exhaustive(MODEL_TRANSFORMATION)).ok()?;
    if t.len() >= 16 {
        return Some(GeoTransform {
            origin_x: t[3],
            origin_y: t[7],
            pixel_width: t[0],
            pixel_height: t[5],
            row_rotation: t[1],
            col_rotation: t[4],
        });
    }

    None
}

/// Read the EPSG code from the GeoKey directory.
fn read_crs<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<CRS> {
    let keys = decoder.get_tag_u16_vec(Tag::from_u16_exhaustive(GEO_KEY_DIRECTORY)).ok()?;
    parse_geokeys(&keys)
}

/// Parse a GeoKey directory:
/// `[version, revision, minor, count, (key_id, location, count, value)...]`
fn parse_geokeys(keys: &[u16]) -> Option<CRS> {
    if keys.len() < 4 {
        return None;
    }
    let num_keys = keys[3] as usize;

    let mut geographic = None;
    for entry in keys[4..].chunks_exact(4).take(num_keys) {
        let (key_id, location, value) = (entry[0], entry[1], entry[3]);
        // Values stored in other tags (location != 0) are not EPSG codes
        if location != 0 || value == 0 || value == USER_DEFINED {
            continue;
        }
        match key_id {
            PROJECTED_CS_TYPE_KEY => return Some(CRS::from_epsg(value as u32)),
            GEOGRAPHIC_TYPE_KEY => geographic = Some(CRS::from_epsg(value as u32)),
            _ => {}
        }
    }

    geographic
}

fn read_nodata<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<f64> {
    let text = decoder.get_tag_ascii_string(Tag::from_u16_exhaustive(GDAL_NODATA)).ok()?;
    text.trim_end_matches('\0').trim().parse::<f64>().ok()
}

/// Write a Raster to a single-band 32-bit float GeoTIFF file
pub fn write_geotiff<T, P>(raster: &Raster<T>, path: P) -> Result<()>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let file = File::create(path.as_ref())?;
    write_geotiff_to_writer(raster, file)
}

/// Write a Raster to an in-memory GeoTIFF buffer
pub fn write_geotiff_to_buffer<T>(raster: &Raster<T>) -> Result<Vec<u8>>
where
    T: RasterElement,
{
    let mut buf = Vec::new();
    write_geotiff_to_writer(raster, Cursor::new(&mut buf))?;
    Ok(buf)
}

/// Encode a Raster as a single-band 32-bit float GeoTIFF into any `Write + Seek` sink
pub fn write_geotiff_to_writer<T, W>(raster: &Raster<T>, writer: W) -> Result<()>
where
    T: RasterElement,
    W: Write + Seek,
{
    let encode_err = |e: tiff::TiffError| Error::Other(format!("TIFF encode error: {}", e));

    let mut encoder = TiffEncoder::new(writer).map_err(encode_err)?;
    let (rows, cols) = raster.shape();

    let data: Vec<f32> = raster
        .data()
        .iter()
        .map(|&v| num_traits::cast(v).unwrap_or(f32::NAN))
        .collect();

    let mut image = encoder
        .new_image::<Gray32Float>(cols as u32, rows as u32)
        .map_err(encode_err)?;

    let gt = raster.transform();
    if gt.row_rotation == 0.0 && gt.col_rotation == 0.0 {
        let scale = [gt.pixel_width, -gt.pixel_height, 0.0];
        image
            .encoder()
            .write_tag(Tag::from_u16_exhaustive(MODEL_PIXEL_SCALE), &scale[..])
            .map_err(encode_err)?;

        let tiepoint = [0.0, 0.0, 0.0, gt.origin_x, gt.origin_y, 0.0];
        image
            .encoder()
            .write_tag(Tag::from_u16_exhaustive(MODEL_TIEPOINT), &tiepoint[..])
            .map_err(encode_err)?;
    } else {
        let matrix = [
            gt.pixel_width, gt.row_rotation, 0.0, gt.origin_x,
            gt.col_rotation, gt.pixel_height, 0.0, gt.origin_y,
            0.0, 0.0, 0.0, 0.0,
            0.0, 0.0, 0.0, 1.0,
        ];
        image
            .encoder()
            .write_tag(Tag::from_u16_exhaustive(MODEL_TRANSFORMATION), &matrix[..])
            .map_err(encode_err)?;
    }

    let geokeys = build_geokeys(raster.crs());
    image
        .encoder()
        .write_tag(Tag::from_u16_exhaustive(GEO_KEY_DIRECTORY), geokeys.as_slice())
        .map_err(encode_err)?;

    if let Some(nodata) = raster.nodata().and_then(|v| v.to_f64()) {
        let text = if nodata.is_nan() {
            "nan".to_string()
        } else {
            nodata.to_string()
        };
        image
            .encoder()
            .write_tag(Tag::from_u16_exhaustive(GDAL_NODATA), text.as_str())
            .map_err(encode_err)?;
    }

    image.write_data(&data).map_err(encode_err)?;

    Ok(())
}

/// GeoKey directory with model type, raster type (PixelIsArea) and, when
/// known, the EPSG code of the CRS.
fn build_geokeys(crs: Option<&CRS>) -> Vec<u16> {
    let epsg = crs
        .and_then(CRS::epsg)
        .and_then(|code| u16::try_from(code).ok());

    match epsg {
        Some(code) => {
            let geographic = crs.map_or(false, CRS::is_geographic);
            let (model_type, cs_key) = if geographic {
                (2, GEOGRAPHIC_TYPE_KEY)
            } else {
                (1, PROJECTED_CS_TYPE_KEY)
            };
            vec![
                1, 1, 0, 3,
                GT_MODEL_TYPE_KEY, 0, 1, model_type,
                GT_RASTER_TYPE_KEY, 0, 1, 1,
                cs_key, 0, 1, code,
            ]
        }
        None => vec![
            1, 1, 0, 2,
            GT_MODEL_TYPE_KEY, 0, 1, 1,
            GT_RASTER_TYPE_KEY, 0, 1, 1,
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn sample_raster() -> Raster<f64> {
        let data: Vec<f64> = (0..12).map(|v| v as f64 / 7.0 - 0.5).collect();
        let mut raster = Raster::from_vec(data, 3, 4).unwrap();
        raster.set_transform(GeoTransform::new(500_000.0, 5_600_000.0, 10.0, -10.0));
        raster.set_crs(Some(CRS::from_epsg(32633)));
        raster
    }

    #[test]
    fn buffer_roundtrip_keeps_georeference() {
        let raster = sample_raster();
        let buf = write_geotiff_to_buffer(&raster).unwrap();
        let back: Raster<f64> = read_geotiff_from_buffer(&buf, None).unwrap();

        assert_eq!(back.shape(), (3, 4));
        assert!(back.transform().approx_eq(raster.transform(), 1e-9));
        assert_eq!(back.crs().and_then(CRS::epsg), Some(32633));
        for row in 0..3 {
            for col in 0..4 {
                let expected = raster.get(row, col).unwrap();
                let actual = back.get(row, col).unwrap();
                assert_relative_eq!(actual, expected, max_relative = 1e-6, epsilon = 1e-7);
            }
        }
    }

    #[test]
    fn nan_nodata_roundtrip() {
        let mut raster = sample_raster();
        raster.set_nodata(Some(f64::NAN));
        raster.set(1, 1, f64::NAN).unwrap();

        let buf = write_geotiff_to_buffer(&raster).unwrap();
        let back: Raster<f64> = read_geotiff_from_buffer(&buf, None).unwrap();

        assert!(back.nodata().map_or(false, f64::is_nan));
        assert!(back.get(1, 1).unwrap().is_nan());
    }

    #[test]
    fn geographic_crs_roundtrip() {
        let mut raster = Raster::filled(2, 2, 1.0_f64);
        raster.set_transform(GeoTransform::new(19.0, 50.5, 0.01, -0.01));
        raster.set_crs(Some(CRS::wgs84()));

        let buf = write_geotiff_to_buffer(&raster).unwrap();
        let back: Raster<f64> = read_geotiff_from_buffer(&buf, None).unwrap();
        assert_eq!(back.crs().and_then(CRS::epsg), Some(4326));
    }

    #[test]
    fn file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("band.tif");
        let raster = sample_raster();

        write_geotiff(&raster, &path).unwrap();
        let back: Raster<f32> = read_geotiff(&path, Some(1)).unwrap();
        assert_eq!(back.shape(), raster.shape());
    }

    #[test]
    fn missing_file_is_input_read_error() {
        let result: Result<Raster<f64>> = read_geotiff("/definitely/not/here.tif", None);
        assert!(matches!(result, Err(Error::InputRead { .. })));
    }

    #[test]
    fn garbage_bytes_are_input_read_error() {
        let result: Result<Raster<f64>> = read_geotiff_from_buffer(b"not a tiff at all", None);
        assert!(matches!(result, Err(Error::InputRead { .. })));
    }

    /// Minimal little-endian 1x1 TIFF with 8-bit floating-point samples
    fn eight_bit_float_tiff() -> Vec<u8> {
        const SHORT: u16 = 3;
        const LONG: u16 = 4;
        let entries: [(u16, u16, u32); 10] = [
            (256, SHORT, 1), // ImageWidth
            (257, SHORT, 1), // ImageLength
            (258, SHORT, 8), // BitsPerSample
            (259, SHORT, 1), // Compression: none
            (262, SHORT, 1), // PhotometricInterpretation: BlackIsZero
            (273, LONG, 134), // StripOffsets
            (277, SHORT, 1), // SamplesPerPixel
            (278, SHORT, 1), // RowsPerStrip
            (279, LONG, 1),  // StripByteCounts
            (339, SHORT, 3), // SampleFormat: IEEE float
        ];

        let mut buf = Vec::new();
        buf.extend_from_slice(b"II");
        buf.extend_from_slice(&42u16.to_le_bytes());
        buf.extend_from_slice(&8u32.to_le_bytes());
        buf.extend_from_slice(&(entries.len() as u16).to_le_bytes());
        for (tag, kind, value) in entries {
            buf.extend_from_slice(&tag.to_le_bytes());
            buf.extend_from_slice(&kind.to_le_bytes());
            buf.extend_from_slice(&1u32.to_le_bytes());
            if kind == SHORT {
                buf.extend_from_slice(&(value as u16).to_le_bytes());
                buf.extend_from_slice(&[0, 0]);
            } else {
                buf.extend_from_slice(&value.to_le_bytes());
            }
        }
        buf.extend_from_slice(&0u32.to_le_bytes());
        assert_eq!(buf.len(), 134);
        buf.push(0x3c);
        buf
    }

    #[test]
    fn unsupported_sample_format_is_input_read_error() {
        let result: Result<Raster<f64>> = read_geotiff_from_buffer(&eight_bit_float_tiff(), None);
        assert!(matches!(result, Err(Error::InputRead { .. })));
    }

    #[test]
    fn band_out_of_range() {
        let buf = write_geotiff_to_buffer(&sample_raster()).unwrap();
        let result: Result<Raster<f64>> = read_geotiff_from_buffer(&buf, Some(2));
        assert!(matches!(result, Err(Error::InvalidParameter { name: "band", .. })));
    }

    #[test]
    fn geokeys_prefer_projected() {
        let keys = [1, 1, 0, 2, 2048, 0, 1, 4326, 3072, 0, 1, 32633];
        assert_eq!(parse_geokeys(&keys).and_then(|c| c.epsg()), Some(32633));

        let user_defined = [1, 1, 0, 1, 3072, 0, 1, USER_DEFINED];
        assert!(parse_geokeys(&user_defined).is_none());
    }
}
