//! End-to-end tests of the NDVI zonal statistics pipeline.
//!
//! Every fixture is generated on the fly into a temporary directory: two
//! single-band GeoTIFFs (red and NIR) and a GeoJSON polygon collection.

use approx::assert_relative_eq;
use ndvizone_algorithms::engine::{
    compute, compute_with, EngineInputs, EngineParams, EngineWarning, NdviZonalStats, ScratchMode,
};
use ndvizone_algorithms::statistics::{ZonalParams, ZonalStatistic};
use ndvizone_algorithms::vector::CoordTransform;
use ndvizone_core::io::{read_geojson, write_geojson, write_geotiff};
use ndvizone_core::raster::Raster;
use ndvizone_core::{Algorithm, AttributeValue, CrsOrigin, Error, GeoTransform, CRS};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Square field over the 19.0..20.0 / 49.5..50.5 test scene; its northern
/// half lies beyond the scene edge
const FIELD: &str = r#"{
    "type": "FeatureCollection",
    "features": [{
        "type": "Feature",
        "properties": {"id": 1},
        "geometry": {"type": "Polygon", "coordinates": [[[19.2, 50.2], [19.8, 50.2], [19.8, 50.8], [19.2, 50.8], [19.2, 50.2]]]}
    }]
}"#;

/// The same field plus one far outside the scene, both with a declared CRS
const FIELDS_DECLARED: &str = r#"{
    "type": "FeatureCollection",
    "crs": {"type": "name", "properties": {"name": "urn:ogc:def:crs:OGC:1.3:CRS84"}},
    "features": [
        {
            "type": "Feature",
            "properties": {"id": 1},
            "geometry": {"type": "Polygon", "coordinates": [[[19.0, 49.5], [20.0, 49.5], [20.0, 50.5], [19.0, 50.5], [19.0, 49.5]]]}
        },
        {
            "type": "Feature",
            "properties": {"id": 2},
            "geometry": {"type": "Polygon", "coordinates": [[[-5.0, 40.0], [-4.0, 40.0], [-4.0, 41.0], [-5.0, 41.0], [-5.0, 40.0]]]}
        }
    ]
}"#;

const NO_FEATURES: &str = r#"{"type": "FeatureCollection", "features": []}"#;

/// 100x100 band at 0.01° resolution with origin (19.0, 50.5), EPSG:4326
fn scene_band(value: f64) -> Raster<f64> {
    let mut band = Raster::filled(100, 100, value);
    band.set_transform(GeoTransform::new(19.0, 50.5, 0.01, -0.01));
    band.set_crs(Some(CRS::wgs84()));
    band
}

fn write_band(dir: &Path, name: &str, band: &Raster<f64>) -> PathBuf {
    let path = dir.join(name);
    write_geotiff(band, &path).expect("failed to write band fixture");
    path
}

fn write_text(dir: &Path, name: &str, text: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, text).expect("failed to write vector fixture");
    path
}

/// Write the standard scene: red = 100, NIR = 200
fn scene(dir: &Path) -> (PathBuf, PathBuf) {
    (
        write_band(dir, "red.tif", &scene_band(100.0)),
        write_band(dir, "nir.tif", &scene_band(200.0)),
    )
}

fn mean_of(output: &ndvizone_algorithms::engine::ZonalOutput, feature: usize) -> Option<f64> {
    output.features.features[feature]
        .get_property("mean")
        .and_then(AttributeValue::as_f64)
}

// ---------------------------------------------------------------------------
// Reference scene
// ---------------------------------------------------------------------------

#[test]
fn reference_scene_mean_in_memory() {
    let dir = TempDir::new().unwrap();
    let (red, nir) = scene(dir.path());
    let vector = write_text(dir.path(), "field.geojson", FIELD);

    let output = compute(&vector, &red, &nir).unwrap();

    assert_eq!(output.features.len(), 1);
    assert_eq!(
        output.features.features[0].get_property("id"),
        Some(&AttributeValue::Int(1))
    );
    assert_relative_eq!(mean_of(&output, 0).unwrap(), 1.0 / 3.0, max_relative = 1e-6);
    assert_eq!(output.warnings, vec![EngineWarning::VectorCrsAssumed]);
    assert_eq!(output.vector_crs_origin, CrsOrigin::AssumedWgs84);
    assert!(!output.reprojected);
}

#[test]
fn reference_scene_mean_with_scratch_file() {
    let dir = TempDir::new().unwrap();
    let (red, nir) = scene(dir.path());
    let vector = write_text(dir.path(), "field.geojson", FIELD);

    let params = EngineParams {
        scratch: ScratchMode::TempFile,
        ..Default::default()
    };
    let output = compute_with(&vector, &red, &nir, &params).unwrap();
    assert_relative_eq!(mean_of(&output, 0).unwrap(), 1.0 / 3.0, max_relative = 1e-6);
}

#[test]
fn index_summary_and_bounds() {
    let dir = TempDir::new().unwrap();
    let (red, nir) = scene(dir.path());
    let vector = write_text(dir.path(), "field.geojson", FIELD);

    let output = compute(&vector, &red, &nir).unwrap();
    let summary = &output.index_summary;
    assert_eq!(summary.valid_count, 10_000);
    assert_eq!(summary.nodata_count, 0);
    assert_relative_eq!(summary.min.unwrap(), 1.0 / 3.0, max_relative = 1e-6);
    assert_relative_eq!(summary.max.unwrap(), 1.0 / 3.0, max_relative = 1e-6);

    let (min_x, min_y, max_x, max_y) = output.raster_bounds;
    assert_relative_eq!(min_x, 19.0, epsilon = 1e-9);
    assert_relative_eq!(min_y, 49.5, epsilon = 1e-9);
    assert_relative_eq!(max_x, 20.0, epsilon = 1e-9);
    assert_relative_eq!(max_y, 50.5, epsilon = 1e-9);
}

#[test]
fn outside_feature_is_null_not_zero() {
    let dir = TempDir::new().unwrap();
    let (red, nir) = scene(dir.path());
    let vector = write_text(dir.path(), "fields.geojson", FIELDS_DECLARED);

    let params = EngineParams {
        zonal: ZonalParams {
            stats: vec![ZonalStatistic::Mean, ZonalStatistic::Count],
            ..Default::default()
        },
        ..Default::default()
    };
    let output = compute_with(&vector, &red, &nir, &params).unwrap();

    assert!(output.warnings.is_empty());
    assert_eq!(output.vector_crs_origin, CrsOrigin::Declared);

    let inside = &output.features.features[0];
    assert_eq!(inside.get_property("count"), Some(&AttributeValue::Int(10_000)));

    let outside = &output.features.features[1];
    assert_eq!(outside.get_property("mean"), Some(&AttributeValue::Null));
    assert_eq!(outside.get_property("count"), Some(&AttributeValue::Int(0)));
}

#[test]
fn algorithm_trait_runs_pipeline() {
    let dir = TempDir::new().unwrap();
    let (red, nir) = scene(dir.path());
    let vector = write_text(dir.path(), "field.geojson", FIELD);

    let output = NdviZonalStats
        .execute_default(EngineInputs { vector, red, nir })
        .unwrap();
    assert_relative_eq!(mean_of(&output, 0).unwrap(), 1.0 / 3.0, max_relative = 1e-6);
}

// ---------------------------------------------------------------------------
// Reprojection
// ---------------------------------------------------------------------------

#[test]
fn wgs84_field_over_utm_scene() {
    let dir = TempDir::new().unwrap();
    let utm = CRS::from_epsg(32634);

    // 100x100 at 10 m; left half vegetated (1/3), right half bare (0)
    let transform = GeoTransform::new(400_000.0, 5_800_000.0, 10.0, -10.0);
    let mut red = Raster::filled(100, 100, 100.0);
    let mut nir = Raster::filled(100, 100, 100.0);
    for row in 0..100 {
        for col in 0..50 {
            nir.set(row, col, 200.0).unwrap();
        }
    }
    for band in [&mut red, &mut nir] {
        band.set_transform(transform);
        band.set_crs(Some(utm.clone()));
    }
    let red = write_band(dir.path(), "red.tif", &red);
    let nir = write_band(dir.path(), "nir.tif", &nir);

    // Field corners in UTM, stored as longitude/latitude
    let to_wgs84 = CoordTransform::new(&utm, &CRS::wgs84()).unwrap();
    let corners = [
        (400_100.0, 5_799_100.0),
        (400_300.0, 5_799_100.0),
        (400_300.0, 5_799_300.0),
        (400_100.0, 5_799_300.0),
        (400_100.0, 5_799_100.0),
    ];
    let ring: Vec<String> = corners
        .iter()
        .map(|&(e, n)| {
            let (lon, lat) = to_wgs84.apply(e, n);
            format!("[{lon:.10}, {lat:.10}]")
        })
        .collect();
    let text = format!(
        r#"{{"type": "FeatureCollection", "features": [{{"type": "Feature", "properties": {{"id": 7}},
            "geometry": {{"type": "Polygon", "coordinates": [[{}]]}}}}]}}"#,
        ring.join(", ")
    );
    let vector = write_text(dir.path(), "field.geojson", &text);

    let params = EngineParams {
        zonal: ZonalParams {
            stats: vec![ZonalStatistic::Mean, ZonalStatistic::Count],
            ..Default::default()
        },
        ..Default::default()
    };
    let output = compute_with(&vector, &red, &nir, &params).unwrap();

    assert!(output.reprojected);
    assert_eq!(output.features.crs.epsg(), Some(32634));
    assert_relative_eq!(mean_of(&output, 0).unwrap(), 1.0 / 3.0, max_relative = 1e-6);
    assert_eq!(
        output.features.features[0].get_property("count"),
        Some(&AttributeValue::Int(400))
    );
}

#[test]
fn written_output_reads_back() {
    let dir = TempDir::new().unwrap();
    let (red, nir) = scene(dir.path());
    let vector = write_text(dir.path(), "fields.geojson", FIELDS_DECLARED);

    let output = compute(&vector, &red, &nir).unwrap();
    let out_path = dir.path().join("result.geojson");
    write_geojson(&output.features, &out_path).unwrap();

    let back = read_geojson(&out_path).unwrap();
    assert_eq!(back.len(), 2);
    assert_eq!(back.features[1].get_property("mean"), Some(&AttributeValue::Null));
    assert_relative_eq!(
        back.features[0].get_property("mean").and_then(AttributeValue::as_f64).unwrap(),
        1.0 / 3.0,
        max_relative = 1e-6
    );
}

// ---------------------------------------------------------------------------
// Failures
// ---------------------------------------------------------------------------

#[test]
fn zero_features_is_empty_geometry() {
    let dir = TempDir::new().unwrap();
    let (red, nir) = scene(dir.path());
    let vector = write_text(dir.path(), "empty.geojson", NO_FEATURES);

    for scratch in [ScratchMode::InMemory, ScratchMode::TempFile] {
        let params = EngineParams {
            scratch,
            ..Default::default()
        };
        let result = compute_with(&vector, &red, &nir, &params);
        assert!(matches!(result, Err(Error::EmptyGeometry)));
    }
}

#[test]
fn missing_inputs_are_input_read_errors() {
    let dir = TempDir::new().unwrap();
    let (red, nir) = scene(dir.path());
    let vector = write_text(dir.path(), "field.geojson", FIELD);
    let missing = dir.path().join("missing.tif");

    assert!(matches!(compute(&vector, &missing, &nir), Err(Error::InputRead { .. })));
    assert!(matches!(compute(&vector, &red, &missing), Err(Error::InputRead { .. })));

    let broken = write_text(dir.path(), "broken.geojson", "{ not json");
    assert!(matches!(compute(&broken, &red, &nir), Err(Error::InputRead { .. })));
}

#[test]
fn misaligned_bands_are_rejected() {
    let dir = TempDir::new().unwrap();
    let vector = write_text(dir.path(), "field.geojson", FIELD);
    let red = write_band(dir.path(), "red.tif", &scene_band(100.0));

    let mut small = Raster::filled(50, 100, 200.0);
    small.set_transform(GeoTransform::new(19.0, 50.5, 0.01, -0.01));
    let nir_small = write_band(dir.path(), "nir_small.tif", &small);
    assert!(matches!(
        compute(&vector, &red, &nir_small),
        Err(Error::ShapeMismatch { .. })
    ));

    let mut shifted = scene_band(200.0);
    shifted.set_transform(GeoTransform::new(19.5, 50.5, 0.01, -0.01));
    let nir_shifted = write_band(dir.path(), "nir_shifted.tif", &shifted);
    assert!(matches!(
        compute(&vector, &red, &nir_shifted),
        Err(Error::TransformMismatch { .. })
    ));
}
