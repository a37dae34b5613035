use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::Serialize;
use serde_json::Value;

use crate::config::trim_base;
use crate::error::Error;
use crate::schema::FeatureSchema;

/// A remote feature collection: `{host}/{workspace}` plus the dataset name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetRef {
    pub host: String,
    pub workspace: String,
    pub dataset: String,
}

impl DatasetRef {
    pub fn new(
        host: impl Into<String>,
        workspace: impl Into<String>,
        dataset: impl Into<String>,
    ) -> Self {
        Self {
            host: trim_base(host.into()),
            workspace: workspace.into(),
            dataset: dataset.into(),
        }
    }

    /// `workspace:dataset`, the qualified WFS type name.
    pub fn type_name(&self) -> String {
        format!("{}:{}", self.workspace, self.dataset)
    }
}

impl fmt::Display for DatasetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.host, self.type_name())
    }
}

/// Optional `GetFeature` parameters. Every field left as `None` (or an empty
/// property list) is simply not sent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    /// (E)CQL expression, sent as `cql_filter`.
    pub filter: Option<String>,
    pub properties: Vec<String>,
    /// Target EPSG code, sent as `srsName=EPSG:<code>`.
    pub srs: Option<u32>,
    pub output_format: Option<String>,
}

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    pub fn properties<I, S>(mut self, properties: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.properties = properties.into_iter().map(Into::into).collect();
        self
    }

    pub fn srs(mut self, epsg: u32) -> Self {
        self.srs = Some(epsg);
        self
    }

    pub fn output_format(mut self, format: impl Into<String>) -> Self {
        self.output_format = Some(format.into());
        self
    }
}

/// Decoded `GetFeature` response.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "format", rename_all = "lowercase")]
pub enum DecodedResult {
    Json {
        schema: FeatureSchema,
        geojson: Value,
    },
    Csv {
        text: String,
    },
    Zip {
        directory: PathBuf,
        files: Vec<String>,
    },
}

/// A 2D coordinate in whatever SRS the caller says it is in.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {}", self.x, self.y)
    }
}

impl FromStr for Point {
    type Err = Error;

    /// Parses `"x, y"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || Error::Configuration(format!("expected 'x, y' coordinates, got '{s}'"));

        let mut parts = s.trim().split(',');
        let (Some(x), Some(y), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(invalid());
        };
        let x = x.trim().parse::<f64>().map_err(|_| invalid())?;
        let y = y.trim().parse::<f64>().map_err(|_| invalid())?;
        Ok(Point { x, y })
    }
}

/// A single geocoder hit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Place {
    pub lat: f64,
    pub lon: f64,
    pub display_name: String,
    /// Everything the service returned for this hit.
    pub raw: Value,
}
