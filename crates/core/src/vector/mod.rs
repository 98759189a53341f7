//! Vector data structures: features with attributes and their collection

use crate::crs::CRS;
use geo_types::Geometry;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::fmt;

/// Attribute value types
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttributeValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    /// Arrays and nested objects, kept verbatim
    Json(JsonValue),
}

impl AttributeValue {
    /// Numeric view of the value, if it has one
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttributeValue::Int(v) => Some(*v as f64),
            AttributeValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, AttributeValue::Null)
    }

    /// Wrap an optional number, mapping `None` (and non-finite values) to `Null`
    pub fn from_optional_f64(value: Option<f64>) -> Self {
        match value {
            Some(v) if v.is_finite() => AttributeValue::Float(v),
            _ => AttributeValue::Null,
        }
    }

    /// Convert to a JSON value for serialization
    pub fn to_json(&self) -> JsonValue {
        match self {
            AttributeValue::Null => JsonValue::Null,
            AttributeValue::Bool(b) => JsonValue::Bool(*b),
            AttributeValue::Int(i) => JsonValue::from(*i),
            // serde_json has no representation for NaN/Inf
            AttributeValue::Float(f) => serde_json::Number::from_f64(*f)
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::Null),
            AttributeValue::String(s) => JsonValue::String(s.clone()),
            AttributeValue::Json(v) => v.clone(),
        }
    }
}

impl From<JsonValue> for AttributeValue {
    fn from(value: JsonValue) -> Self {
        match value {
            JsonValue::Null => AttributeValue::Null,
            JsonValue::Bool(b) => AttributeValue::Bool(b),
            JsonValue::Number(n) => match n.as_i64() {
                Some(i) => AttributeValue::Int(i),
                None => n.as_f64().map_or(AttributeValue::Null, AttributeValue::Float),
            },
            JsonValue::String(s) => AttributeValue::String(s),
            other => AttributeValue::Json(other),
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Null => write!(f, "null"),
            AttributeValue::Bool(b) => write!(f, "{}", b),
            AttributeValue::Int(i) => write!(f, "{}", i),
            AttributeValue::Float(v) => write!(f, "{:.4}", v),
            AttributeValue::String(s) => write!(f, "{}", s),
            AttributeValue::Json(v) => write!(f, "{}", v),
        }
    }
}

/// A geographic feature with geometry and attributes
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    /// Feature geometry
    pub geometry: Option<Geometry<f64>>,
    /// Feature attributes
    pub properties: BTreeMap<String, AttributeValue>,
    /// Optional feature-level ID (the GeoJSON `id` member)
    pub id: Option<AttributeValue>,
}

impl Feature {
    /// Create a new feature with geometry
    pub fn new(geometry: Geometry<f64>) -> Self {
        Self {
            geometry: Some(geometry),
            properties: BTreeMap::new(),
            id: None,
        }
    }

    /// Create a feature with no geometry
    pub fn empty() -> Self {
        Self {
            geometry: None,
            properties: BTreeMap::new(),
            id: None,
        }
    }

    /// Set an attribute
    pub fn set_property(&mut self, key: impl Into<String>, value: AttributeValue) {
        self.properties.insert(key.into(), value);
    }

    /// Get an attribute
    pub fn get_property(&self, key: &str) -> Option<&AttributeValue> {
        self.properties.get(key)
    }

    /// The identifier shown to users: the `id` attribute, falling back to the
    /// feature-level id.
    pub fn display_id(&self) -> Option<&AttributeValue> {
        self.get_property("id").or(self.id.as_ref())
    }
}

/// How the CRS of a [`FeatureCollection`] was determined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CrsOrigin {
    /// The input declared its CRS
    Declared,
    /// The input declared nothing and WGS84 (EPSG:4326) was assumed
    AssumedWgs84,
}

/// Ordered collection of features sharing one CRS
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureCollection {
    pub features: Vec<Feature>,
    pub crs: CRS,
    pub crs_origin: CrsOrigin,
}

impl FeatureCollection {
    /// Empty collection in a declared CRS
    pub fn new(crs: CRS) -> Self {
        Self {
            features: Vec::new(),
            crs,
            crs_origin: CrsOrigin::Declared,
        }
    }

    pub fn push(&mut self, feature: Feature) {
        self.features.push(feature);
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Feature> {
        self.features.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Feature> {
        self.features.iter_mut()
    }
}

impl Default for FeatureCollection {
    fn default() -> Self {
        Self::new(CRS::wgs84())
    }
}

impl IntoIterator for FeatureCollection {
    type Item = Feature;
    type IntoIter = std::vec::IntoIter<Feature>;

    fn into_iter(self) -> Self::IntoIter {
        self.features.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_numbers_keep_integer_type() {
        assert_eq!(AttributeValue::from(json!(1)), AttributeValue::Int(1));
        assert_eq!(AttributeValue::from(json!(1.5)), AttributeValue::Float(1.5));
        assert_eq!(AttributeValue::from(json!(null)), AttributeValue::Null);
        assert!(matches!(AttributeValue::from(json!([1, 2])), AttributeValue::Json(_)));
    }

    #[test]
    fn missing_number_is_null_not_zero() {
        assert!(AttributeValue::from_optional_f64(None).is_null());
        assert!(AttributeValue::from_optional_f64(Some(f64::NAN)).is_null());
        assert_eq!(AttributeValue::Float(f64::NAN).to_json(), JsonValue::Null);
        assert_eq!(AttributeValue::from_optional_f64(Some(0.25)).as_f64(), Some(0.25));
    }

    #[test]
    fn display_id_prefers_attribute() {
        let mut feature = Feature::empty();
        feature.id = Some(AttributeValue::String("f-1".into()));
        assert_eq!(feature.display_id(), Some(&AttributeValue::String("f-1".into())));

        feature.set_property("id", AttributeValue::Int(7));
        assert_eq!(feature.display_id(), Some(&AttributeValue::Int(7)));
    }
}
