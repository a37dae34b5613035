use std::fs::{self, File};
use std::io::{self, Cursor};
use std::path::Path;

use reqwest::blocking::{Client, Response};
use reqwest::header::CONTENT_TYPE;
use tracing::{debug, info};
use zip::ZipArchive;

use crate::config::ClientConfig;
use crate::content_type::{ContentKind, ContentType};
use crate::error::{Error, Result};
use crate::model::{DatasetRef, DecodedResult, QueryParams};
use crate::query::{describe_feature_type_url, get_feature_url};
use crate::schema::{parse_describe_feature_type, FeatureSchema};

/// Blocking WFS client. One `fetch` costs two round-trips: the schema lookup
/// and the `GetFeature` request.
pub struct WfsClient {
    http: Client,
    config: ClientConfig,
}

impl WfsClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let http = config.build_http_client()?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Dataset on the configured default host.
    pub fn dataset(&self, workspace: &str, dataset: &str) -> DatasetRef {
        DatasetRef::new(self.config.host.clone(), workspace, dataset)
    }

    /// Fetches the feature-type schema of `dataset`, as the service reports
    /// it (no normalization).
    pub fn describe_feature_type(&self, dataset: &DatasetRef) -> Result<FeatureSchema> {
        let url = describe_feature_type_url(dataset);
        debug!("DescribeFeatureType: {}", url);

        let response = self.get(&url)?;
        let body = response
            .text()
            .map_err(|e| Error::decode("schema", e))?;
        parse_describe_feature_type(&body)
    }

    /// Downloads `dataset` and decodes it according to the response's
    /// content type.
    ///
    /// Zip responses are extracted into `zip_output_dir`, which must be
    /// given; it is created if missing and existing files are overwritten.
    pub fn fetch(
        &self,
        dataset: &DatasetRef,
        query: &QueryParams,
        zip_output_dir: Option<&Path>,
    ) -> Result<DecodedResult> {
        // schema first, so requested properties can be checked
        let mut schema = self.describe_feature_type(dataset)?;
        let properties = schema.restrict_to(&query.properties)?;
        schema.normalize_types();

        let url = get_feature_url(dataset, query, &properties);
        info!("Fetching {}", dataset);
        debug!("GetFeature: {}", url);

        let response = self.get(&url)?;
        // decode by the declared content type, not the requested format
        let content_type = response_content_type(&response)?;
        let kind = content_type.kind()?;

        match kind {
            ContentKind::Zip => {
                let directory = zip_output_dir.ok_or_else(|| {
                    Error::Configuration(
                        "zip response received but no output directory was supplied".into(),
                    )
                })?;
                let bytes = response.bytes().map_err(|e| Error::decode("zip", e))?;
                let files = extract_zip(&bytes, directory)?;
                info!("Extracted {} files into {:?}", files.len(), directory);
                Ok(DecodedResult::Zip {
                    directory: directory.to_path_buf(),
                    files,
                })
            }
            ContentKind::Json => {
                let bytes = response.bytes().map_err(|e| Error::decode("json", e))?;
                let geojson =
                    serde_json::from_slice(&bytes).map_err(|e| Error::decode("json", e))?;
                info!("Decoded JSON response ({} bytes)", bytes.len());
                Ok(DecodedResult::Json { schema, geojson })
            }
            ContentKind::Csv => {
                let text = response.text().map_err(|e| Error::decode("csv", e))?;
                info!("Decoded CSV response ({} bytes)", text.len());
                Ok(DecodedResult::Csv { text })
            }
        }
    }

    fn get(&self, url: &str) -> Result<Response> {
        let response = self
            .http
            .get(url)
            .send()
            .map_err(|e| Error::transport(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::transport(url, format!("bad status code: {status}")));
        }
        Ok(response)
    }
}

fn response_content_type(response: &Response) -> Result<ContentType> {
    let header = response
        .headers()
        .get(CONTENT_TYPE)
        .ok_or_else(|| Error::Format("response has no Content-Type header".into()))?;
    let header = header
        .to_str()
        .map_err(|e| Error::Format(format!("unreadable Content-Type header: {e}")))?;
    ContentType::parse(header)
}

/// Extracts every member of the archive below `directory` and returns the
/// member names in archive order.
pub fn extract_zip(bytes: &[u8], directory: &Path) -> Result<Vec<String>> {
    let mut archive = ZipArchive::new(Cursor::new(bytes)).map_err(|e| Error::decode("zip", e))?;
    fs::create_dir_all(directory)?;

    let mut names = Vec::with_capacity(archive.len());
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).map_err(|e| Error::decode("zip", e))?;
        let name = entry.name().to_string();

        let relative = entry
            .enclosed_name()
            .ok_or_else(|| Error::decode("zip", format!("unsafe member path '{name}'")))?;
        let target = directory.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&target)?;
        } else {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut file = File::create(&target)?;
            io::copy(&mut entry, &mut file)?;
        }
        debug!("Extracted {:?}", target);
        names.push(name);
    }

    Ok(names)
}
