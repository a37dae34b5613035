use std::path::{Path, PathBuf};

use gdal::spatial_ref::SpatialRef;
use gdal::vector::{
    FieldValue, Geometry, LayerAccess, LayerOptions, OGRFieldType, OGRwkbGeometryType,
};
use gdal::DriverManager;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::schema::{normalize_type_tag, FeatureSchema};

/// File extension written for each supported OGR driver.
pub fn file_extension(driver: &str) -> Option<&'static str> {
    match driver {
        "ESRI Shapefile" => Some("shp"),
        "GPKG" => Some("gpkg"),
        "GeoJSON" => Some("geojson"),
        "FlatGeobuf" => Some("fgb"),
        "GML" => Some("gml"),
        "KML" => Some("kml"),
        "GPX" => Some("gpx"),
        "CSV" => Some("csv"),
        "DXF" => Some("dxf"),
        "MapInfo File" => Some("tab"),
        "SQLite" => Some("sqlite"),
        _ => None,
    }
}

/// Writes GeoJSON features downloaded with [`WfsClient::fetch`](crate::WfsClient::fetch)
/// to a spatial file, using the returned schema for the layer fields.
#[derive(Debug, Clone)]
pub struct VectorWriter {
    driver: String,
    extension: &'static str,
    epsg: u32,
}

impl VectorWriter {
    pub fn new(driver: &str, epsg: u32) -> Result<Self> {
        let extension = file_extension(driver)
            .ok_or_else(|| Error::Configuration(format!("invalid driver '{driver}'")))?;
        Ok(Self {
            driver: driver.to_string(),
            extension,
            epsg,
        })
    }

    pub fn output_path(&self, directory: &Path, name: &str) -> PathBuf {
        directory.join(format!("{}.{}", name, self.extension))
    }

    /// Writes `geojson` (a FeatureCollection or a bare array of features)
    /// into `{directory}/{name}.{ext}`, replacing any existing file.
    pub fn write(
        &self,
        geojson: &Value,
        schema: &FeatureSchema,
        directory: &Path,
        name: &str,
    ) -> Result<PathBuf> {
        let features = feature_list(geojson)?;
        if !directory.is_dir() {
            return Err(Error::Configuration(format!(
                "target directory {:?} doesn't exist",
                directory
            )));
        }

        let driver = DriverManager::get_driver_by_name(&self.driver).map_err(|e| {
            Error::Configuration(format!("GDAL driver '{}' is not available: {e}", self.driver))
        })?;
        let srs = SpatialRef::from_epsg(self.epsg)
            .map_err(|e| Error::Configuration(format!("unknown CRS EPSG:{}: {e}", self.epsg)))?;

        let output_path = self.output_path(directory, name);
        let fail = |reason: String| Error::Write {
            path: output_path.clone(),
            reason,
        };

        // replace any earlier output
        if output_path.exists() {
            driver
                .delete(&output_path)
                .map_err(|e| fail(e.to_string()))?;
        }

        let mut dataset = driver
            .create_vector_only(&output_path)
            .map_err(|e| fail(format!("failed to create dataset: {e}")))?;
        let mut layer = dataset
            .create_layer(LayerOptions {
                name,
                srs: Some(&srs),
                ty: geometry_type(schema.geometry_type.as_deref()),
                options: None,
            })
            .map_err(|e| fail(format!("failed to create layer: {e}")))?;

        // schema -> layer fields
        let fields: Vec<(&str, OGRFieldType::Type)> = schema
            .properties
            .iter()
            .map(|p| (p.name.as_str(), field_type(&p.type_tag)))
            .collect();
        layer
            .create_defn_fields(&fields)
            .map_err(|e| fail(format!("failed to create fields: {e}")))?;

        let mut written = 0usize;
        for (i, feature) in features.iter().enumerate() {
            let Some(geometry) = feature.get("geometry").filter(|g| !g.is_null()) else {
                warn!("Skipping feature {} without geometry", i);
                continue;
            };
            let geometry = Geometry::from_geojson(&geometry.to_string())
                .map_err(|e| fail(format!("invalid geometry in feature {i}: {e}")))?;

            let properties = feature.get("properties").and_then(Value::as_object);
            let mut names = Vec::with_capacity(fields.len());
            let mut values = Vec::with_capacity(fields.len());
            for (field, kind) in &fields {
                let value = properties
                    .and_then(|p| p.get(*field))
                    .and_then(|v| field_value(v, *kind));
                if let Some(value) = value {
                    names.push(*field);
                    values.push(value);
                }
            }

            layer
                .create_feature_fields(geometry, &names, &values)
                .map_err(|e| fail(format!("failed to write feature {i}: {e}")))?;
            written += 1;
        }

        info!(
            "Written {} of {} features to {:?}",
            written,
            features.len(),
            output_path
        );
        Ok(output_path)
    }
}

fn feature_list(geojson: &Value) -> Result<&[Value]> {
    let features = match geojson {
        Value::Array(features) => Some(features),
        other => other.get("features").and_then(Value::as_array),
    };
    match features {
        Some(features) if !features.is_empty() => Ok(features),
        _ => Err(Error::Configuration("no data to write".into())),
    }
}

fn geometry_type(name: Option<&str>) -> OGRwkbGeometryType::Type {
    match name {
        Some("Point") => OGRwkbGeometryType::wkbPoint,
        Some("LineString") => OGRwkbGeometryType::wkbLineString,
        Some("Polygon") => OGRwkbGeometryType::wkbPolygon,
        Some("MultiPoint") => OGRwkbGeometryType::wkbMultiPoint,
        Some("MultiLineString") => OGRwkbGeometryType::wkbMultiLineString,
        Some("MultiPolygon") => OGRwkbGeometryType::wkbMultiPolygon,
        Some("GeometryCollection") => OGRwkbGeometryType::wkbGeometryCollection,
        other => {
            debug!("Unknown geometry type {:?}, writing untyped layer", other);
            OGRwkbGeometryType::wkbUnknown
        }
    }
}

/// OGR field type for a schema type tag, raw (`string`, `double`) or
/// normalized (`str`, `float`).
fn field_type(tag: &str) -> OGRFieldType::Type {
    match normalize_type_tag(tag).unwrap_or(tag) {
        "float" => OGRFieldType::OFTReal,
        "int" | "integer" | "short" | "byte" => OGRFieldType::OFTInteger,
        "long" => OGRFieldType::OFTInteger64,
        "date" => OGRFieldType::OFTDate,
        "dateTime" => OGRFieldType::OFTDateTime,
        _ => OGRFieldType::OFTString,
    }
}

fn field_value(value: &Value, kind: OGRFieldType::Type) -> Option<FieldValue> {
    if value.is_null() {
        return None;
    }
    if kind == OGRFieldType::OFTReal {
        return as_f64(value).map(FieldValue::RealValue);
    }
    if kind == OGRFieldType::OFTInteger {
        return as_i64(value)
            .and_then(|n| i32::try_from(n).ok())
            .map(FieldValue::IntegerValue);
    }
    if kind == OGRFieldType::OFTInteger64 {
        return as_i64(value).map(FieldValue::Integer64Value);
    }
    match value {
        Value::String(s) => Some(FieldValue::StringValue(s.clone())),
        other => Some(FieldValue::StringValue(other.to_string())),
    }
}

fn as_f64(value: &Value) -> Option<f64> {
    value
        .as_f64()
        .or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()))
}

fn as_i64(value: &Value) -> Option<i64> {
    value
        .as_i64()
        .or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()))
}
