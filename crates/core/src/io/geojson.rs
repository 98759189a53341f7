//! GeoJSON reading/writing for feature collections
//!
//! RFC 7946 GeoJSON is always WGS84 longitude/latitude. Older files (and the
//! output of most desktop GIS tools) may carry a legacy `crs` member naming
//! another CRS; when present it is honored, otherwise the collection is
//! marked as [`CrsOrigin::AssumedWgs84`] so callers can tell the difference.

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::vector::{AttributeValue, CrsOrigin, Feature, FeatureCollection};
use ::geojson::feature::Id;
use ::geojson::{GeoJson, JsonObject, JsonValue};
use std::fs;
use std::path::Path;
use tracing::debug;

/// Read a GeoJSON file (FeatureCollection, Feature or bare Geometry)
pub fn read_geojson<P: AsRef<Path>>(path: P) -> Result<FeatureCollection> {
    let path = path.as_ref();
    let source = path.display().to_string();
    let text = fs::read_to_string(path).map_err(|e| Error::input_read(&source, e))?;
    let collection = parse_geojson_named(&text, &source)?;
    debug!(
        "read {} features from {} (crs={}, {:?})",
        collection.len(),
        source,
        collection.crs,
        collection.crs_origin
    );
    Ok(collection)
}

/// Parse GeoJSON text into a [`FeatureCollection`]
pub fn parse_geojson(text: &str) -> Result<FeatureCollection> {
    parse_geojson_named(text, "<geojson>")
}

fn parse_geojson_named(text: &str, source: &str) -> Result<FeatureCollection> {
    let geojson: GeoJson = text.parse().map_err(|e| Error::input_read(source, e))?;

    let (features, foreign_members) = match geojson {
        GeoJson::FeatureCollection(fc) => (fc.features, fc.foreign_members),
        GeoJson::Feature(f) => {
            let foreign = f.foreign_members.clone();
            (vec![f], foreign)
        }
        GeoJson::Geometry(g) => (
            vec![::geojson::Feature {
                bbox: None,
                geometry: Some(g),
                id: None,
                properties: None,
                foreign_members: None,
            }],
            None,
        ),
    };

    let (crs, crs_origin) = match foreign_members.as_ref().and_then(declared_crs) {
        Some(crs) => (crs, CrsOrigin::Declared),
        None => (CRS::wgs84(), CrsOrigin::AssumedWgs84),
    };

    let mut collection = FeatureCollection {
        features: Vec::with_capacity(features.len()),
        crs,
        crs_origin,
    };

    for (index, feature) in features.into_iter().enumerate() {
        collection.push(convert_feature(feature, index, source)?);
    }

    Ok(collection)
}

/// Extract the CRS named by a legacy `"crs": {"type": "name", "properties": {"name": ...}}` member
fn declared_crs(members: &JsonObject) -> Option<CRS> {
    let name = members
        .get("crs")?
        .get("properties")?
        .get("name")?
        .as_str()?;
    Some(CRS::parse(name))
}

fn convert_feature(feature: ::geojson::Feature, index: usize, source: &str) -> Result<Feature> {
    let geometry = match feature.geometry {
        Some(g) => Some(
            geo_types::Geometry::<f64>::try_from(g)
                .map_err(|e| Error::input_read(source, format!("feature {}: {}", index, e)))?,
        ),
        None => None,
    };

    let properties = feature
        .properties
        .unwrap_or_default()
        .into_iter()
        .map(|(key, value)| (key, AttributeValue::from(value)))
        .collect();

    let id = feature.id.map(|id| match id {
        Id::String(s) => AttributeValue::String(s),
        Id::Number(n) => AttributeValue::from(JsonValue::Number(n)),
    });

    Ok(Feature {
        geometry,
        properties,
        id,
    })
}

/// Serialize a [`FeatureCollection`] as pretty-printed GeoJSON.
///
/// A legacy `crs` member is emitted whenever the collection is not in WGS84,
/// so that the coordinates are not misread as longitude/latitude.
pub fn to_geojson_string(collection: &FeatureCollection) -> Result<String> {
    let features = collection
        .iter()
        .map(|feature| ::geojson::Feature {
            bbox: None,
            geometry: feature
                .geometry
                .as_ref()
                .map(|g| ::geojson::Geometry::new(::geojson::Value::from(g))),
            id: feature.id.as_ref().and_then(to_geojson_id),
            properties: Some(
                feature
                    .properties
                    .iter()
                    .map(|(key, value)| (key.clone(), value.to_json()))
                    .collect(),
            ),
            foreign_members: None,
        })
        .collect();

    let foreign_members = if collection.crs.epsg() == Some(4326) {
        None
    } else {
        let mut members = JsonObject::new();
        members.insert(
            "crs".to_string(),
            serde_json::json!({
                "type": "name",
                "properties": { "name": collection.crs.urn() }
            }),
        );
        Some(members)
    };

    let geojson = GeoJson::FeatureCollection(::geojson::FeatureCollection {
        bbox: None,
        features,
        foreign_members,
    });

    serde_json::to_string_pretty(&geojson).map_err(|e| Error::Other(e.to_string()))
}

fn to_geojson_id(id: &AttributeValue) -> Option<Id> {
    match id {
        AttributeValue::String(s) => Some(Id::String(s.clone())),
        AttributeValue::Int(i) => Some(Id::Number((*i).into())),
        AttributeValue::Float(f) => serde_json::Number::from_f64(*f).map(Id::Number),
        _ => None,
    }
}

/// Write a [`FeatureCollection`] to a GeoJSON file
pub fn write_geojson<P: AsRef<Path>>(collection: &FeatureCollection, path: P) -> Result<()> {
    let text = to_geojson_string(collection)?;
    fs::write(path.as_ref(), text)?;
    Ok(())
}
