//! Feature-type schema returned by `DescribeFeatureType`.
//!
//! Geoserver answers with an XML Schema document in which every attribute of
//! the feature type is an `xsd:element` inside an `xsd:sequence`:
//!
//! ```xml
//! <xsd:sequence>
//!   <xsd:element name="countyname" nillable="true" type="xsd:string"/>
//!   <xsd:element name="total2011" nillable="true" type="xsd:decimal"/>
//!   <xsd:element name="geom" nillable="true" type="gml:MultiSurfacePropertyType"/>
//! </xsd:sequence>
//! ```
//!
//! Elements typed in the `gml` namespace carry the geometry; everything else
//! is an ordinary property whose type tag is the local part of its XSD type.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchemaProperty {
    pub name: String,
    /// Type tag, e.g. `string`, `int`, `decimal` (or `str`/`float` once
    /// normalized).
    #[serde(rename = "type")]
    pub type_tag: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct FeatureSchema {
    /// Non-geometry properties, in the order the service declares them.
    pub properties: Vec<SchemaProperty>,
    pub geometry_column: Option<String>,
    /// Geometry kind such as `MultiPolygon` or `Point`.
    pub geometry_type: Option<String>,
}

impl FeatureSchema {
    pub fn property(&self, name: &str) -> Option<&SchemaProperty> {
        self.properties.iter().find(|p| p.name == name)
    }

    pub fn property_names(&self) -> impl Iterator<Item = &str> {
        self.properties.iter().map(|p| p.name.as_str())
    }

    /// Restricts the schema to the requested property names and returns the
    /// list to send as `propertyName`.
    ///
    /// Kept properties follow the schema's order, not the caller's. The
    /// geometry column is always appended to the returned list so features
    /// keep their geometry. A request naming only the geometry column keeps
    /// no attribute properties. An empty request leaves the schema untouched
    /// and returns an empty list (no restriction).
    pub fn restrict_to(&mut self, requested: &[String]) -> Result<Vec<String>> {
        let requested: Vec<&str> = requested
            .iter()
            .map(|name| name.trim())
            .filter(|name| !name.is_empty())
            .collect();
        if requested.is_empty() {
            return Ok(Vec::new());
        }

        let kept: Vec<SchemaProperty> = self
            .properties
            .iter()
            .filter(|p| requested.contains(&p.name.as_str()))
            .cloned()
            .collect();

        let mut geometry_requested = false;
        for name in &requested {
            if self.geometry_column.as_deref() == Some(*name) {
                geometry_requested = true;
            } else if self.property(name).is_none() {
                warn!("Requested property '{}' is not in the schema", name);
            }
        }

        // a geometry-only request keeps no attribute columns
        if kept.is_empty() && !geometry_requested {
            return Err(Error::Configuration(format!(
                "none of the requested properties [{}] exist in the schema",
                requested.join(", ")
            )));
        }

        let mut outgoing: Vec<String> = kept.iter().map(|p| p.name.clone()).collect();
        if let Some(geometry) = &self.geometry_column {
            if !outgoing.contains(geometry) {
                outgoing.push(geometry.clone());
            }
        }

        debug!("Restricted schema to {} properties", kept.len());
        self.properties = kept;
        Ok(outgoing)
    }

    /// Maps vendor type names onto `str`/`float`; other tags are untouched.
    pub fn normalize_types(&mut self) {
        for property in &mut self.properties {
            if let Some(tag) = normalize_type_tag(&property.type_tag) {
                property.type_tag = tag.to_string();
            }
        }
    }
}

pub fn normalize_type_tag(tag: &str) -> Option<&'static str> {
    match tag {
        "string" => Some("str"),
        "decimal" | "double" => Some("float"),
        _ => None,
    }
}

/// Parses a `DescribeFeatureType` XML Schema response.
pub fn parse_describe_feature_type(xml: &str) -> Result<FeatureSchema> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut schema = FeatureSchema::default();
    let mut sequence_depth = 0usize;
    // Element declared without a `type` attribute, waiting for the base type
    // of its nested restriction.
    let mut pending: Option<String> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"sequence" => sequence_depth += 1,
                b"element" if sequence_depth > 0 => {
                    let (name, type_attr) = element_attributes(&e)?;
                    match type_attr {
                        Some(type_attr) => add_element(&mut schema, name, &type_attr),
                        None => pending = Some(name),
                    }
                }
                b"restriction" => restriction_base(&mut schema, &mut pending, &e)?,
                _ => {}
            },
            Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                b"element" if sequence_depth > 0 => {
                    let (name, type_attr) = element_attributes(&e)?;
                    add_element(&mut schema, name, type_attr.as_deref().unwrap_or("string"));
                }
                b"restriction" => restriction_base(&mut schema, &mut pending, &e)?,
                _ => {}
            },
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"sequence" => sequence_depth = sequence_depth.saturating_sub(1),
                b"element" => {
                    if let Some(name) = pending.take() {
                        add_element(&mut schema, name, "string");
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(Error::decode(
                    "schema",
                    format!("XML error at position {}: {e}", reader.error_position()),
                ))
            }
        }
    }

    if schema.properties.is_empty() && schema.geometry_column.is_none() {
        return Err(Error::decode(
            "schema",
            "no feature type elements found in DescribeFeatureType response",
        ));
    }

    debug!(
        "Parsed schema: {} properties, geometry column {:?}",
        schema.properties.len(),
        schema.geometry_column
    );
    Ok(schema)
}

fn element_attributes(e: &BytesStart) -> Result<(String, Option<String>)> {
    let mut name = None;
    let mut type_attr = None;
    for attr in e.attributes() {
        let attr = attr.map_err(|err| Error::decode("schema", err))?;
        let value = attr
            .unescape_value()
            .map_err(|err| Error::decode("schema", err))?
            .into_owned();
        match attr.key.local_name().as_ref() {
            b"name" => name = Some(value),
            b"type" => type_attr = Some(value),
            _ => {}
        }
    }
    let name = name.ok_or_else(|| Error::decode("schema", "xsd:element without a name"))?;
    Ok((name, type_attr))
}

fn restriction_base(
    schema: &mut FeatureSchema,
    pending: &mut Option<String>,
    e: &BytesStart,
) -> Result<()> {
    let Some(name) = pending.take() else {
        return Ok(());
    };
    let base = e
        .try_get_attribute("base")
        .map_err(|err| Error::decode("schema", err))?
        .map(|attr| attr.unescape_value().map(|v| v.into_owned()))
        .transpose()
        .map_err(|err| Error::decode("schema", err))?;
    add_element(schema, name, base.as_deref().unwrap_or("string"));
    Ok(())
}

fn add_element(schema: &mut FeatureSchema, name: String, type_attr: &str) {
    let (prefix, local) = match type_attr.split_once(':') {
        Some((prefix, local)) => (prefix, local),
        None => ("", type_attr),
    };

    if prefix == "gml" {
        if let Some(existing) = &schema.geometry_column {
            warn!(
                "Multiple geometry columns; keeping '{}', ignoring '{}'",
                existing, name
            );
            return;
        }
        schema.geometry_type = Some(geometry_type_name(local).to_string());
        schema.geometry_column = Some(name);
    } else {
        schema.properties.push(SchemaProperty {
            name,
            type_tag: local.to_string(),
        });
    }
}

fn geometry_type_name(gml_type: &str) -> &str {
    let base = gml_type.strip_suffix("PropertyType").unwrap_or(gml_type);
    match base {
        "Surface" => "Polygon",
        "MultiSurface" => "MultiPolygon",
        "Curve" => "LineString",
        "MultiCurve" => "MultiLineString",
        "Geometry" => "GeometryCollection",
        other => other,
    }
}
