pub mod config;
pub mod content_type;
pub mod error;
pub mod fetch;
pub mod geocode;
pub mod model;
pub mod query;
pub mod reproject;
pub mod schema;
pub mod writer;

pub use config::ClientConfig;
pub use content_type::{ContentKind, ContentType};
pub use error::{Error, Result};
pub use fetch::WfsClient;
pub use geocode::Geocoder;
pub use model::{DatasetRef, DecodedResult, Place, Point, QueryParams};
pub use reproject::reproject;
pub use schema::{FeatureSchema, SchemaProperty};
pub use writer::VectorWriter;
