//! WFS request URLs.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

use crate::model::{DatasetRef, QueryParams};

/// Everything but unreserved characters and `/` is escaped.
const QUERY_VALUE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~')
    .remove(b'/');

/// Percent-encodes a single query value (reserved characters, spaces and
/// quotes included) so that it survives as one parameter. Spaces become
/// `%20`.
pub fn encode_component(value: &str) -> String {
    utf8_percent_encode(value, QUERY_VALUE).to_string()
}

/// `GetFeature` URL for `dataset`.
///
/// `properties` is the final list to send (already restricted and with the
/// geometry column added); the caller's unfiltered list in `query` is not
/// used here. Optional fragments are appended only when they have a value.
pub fn get_feature_url(dataset: &DatasetRef, query: &QueryParams, properties: &[String]) -> String {
    let mut url = format!(
        "{}/{}/ows?service=WFS&version=1.0.0&request=GetFeature&typeName={}",
        dataset.host,
        dataset.workspace,
        dataset.type_name()
    );

    if let Some(filter) = query.filter.as_deref().filter(|f| !f.trim().is_empty()) {
        url.push_str("&cql_filter=");
        url.push_str(&encode_component(filter));
    }
    if !properties.is_empty() {
        url.push_str("&propertyName=");
        url.push_str(&encode_component(&properties.join(",")));
    }
    if let Some(srs) = query.srs {
        url.push_str(&format!("&srsName=EPSG:{srs}"));
    }
    if let Some(format) = query.output_format.as_deref().filter(|f| !f.is_empty()) {
        url.push_str("&outputFormat=");
        url.push_str(&encode_component(format));
    }

    url
}

/// `DescribeFeatureType` URL for `dataset`, served from the global `/wfs`
/// endpoint with WFS 1.1.0.
pub fn describe_feature_type_url(dataset: &DatasetRef) -> String {
    format!(
        "{}/wfs?service=WFS&version=1.1.0&request=DescribeFeatureType&typeName={}",
        dataset.host,
        dataset.type_name()
    )
}
