//! Forward and reverse geocoding against an OSM Nominatim service.

use reqwest::blocking::Client;
use serde_json::Value;
use tracing::{debug, info};

use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::model::{Place, Point};
use crate::query::encode_component;
use crate::reproject::{reproject, WGS84};

pub struct Geocoder {
    http: Client,
    base_url: String,
}

impl Geocoder {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        Ok(Self {
            http: config.build_http_client()?,
            base_url: config.nominatim_url.clone(),
        })
    }

    /// Looks up `address` and returns the best match, with full address
    /// details in [`Place::raw`].
    pub fn geocode_address(&self, address: &str) -> Result<Place> {
        let address = address.trim();
        if address.is_empty() {
            return Err(Error::Configuration("no address supplied".into()));
        }

        let url = format!(
            "{}/search?q={}&format=jsonv2&addressdetails=1&limit=1",
            self.base_url,
            encode_component(address)
        );
        let body = self.get_json(&url)?;

        let hit = match body {
            Value::Array(hits) => hits.into_iter().next(),
            other => {
                return Err(Error::decode(
                    "json",
                    format!("expected an array of results, got {other}"),
                ))
            }
        }
        .ok_or_else(|| Error::NotFound(address.to_string()))?;

        let place = place_from_json(hit)?;
        info!("Geocoded '{}' to {}, {}", address, place.lat, place.lon);
        Ok(place)
    }

    /// Reverse-geocodes `location`, given in `epsg` coordinates. Points not
    /// already in EPSG:4326 are reprojected first.
    pub fn geocode_location(&self, location: Point, epsg: u32) -> Result<Place> {
        let wgs84 = reproject(location, epsg, WGS84)?;
        if epsg != WGS84 {
            debug!("Reprojected {} from EPSG:{} to {}", location, epsg, wgs84);
        }

        let url = format!(
            "{}/reverse?lat={}&lon={}&format=jsonv2&addressdetails=1",
            self.base_url, wgs84.y, wgs84.x
        );
        let body = self.get_json(&url)?;
        if body.get("error").is_some() {
            return Err(Error::NotFound(location.to_string()));
        }

        let place = place_from_json(body)?;
        info!("Reverse geocoded {} to '{}'", location, place.display_name);
        Ok(place)
    }

    fn get_json(&self, url: &str) -> Result<Value> {
        debug!("Nominatim request: {}", url);
        let response = self
            .http
            .get(url)
            .send()
            .map_err(|e| Error::transport(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::transport(url, format!("bad status code: {status}")));
        }

        let bytes = response.bytes().map_err(|e| Error::decode("json", e))?;
        serde_json::from_slice(&bytes).map_err(|e| Error::decode("json", e))
    }
}

/// Nominatim reports coordinates as strings; accept numbers too.
fn coordinate(hit: &Value, key: &str) -> Result<f64> {
    let value = hit
        .get(key)
        .ok_or_else(|| Error::decode("json", format!("result has no '{key}'")))?;
    let parsed = match value {
        Value::String(s) => s.parse::<f64>().ok(),
        Value::Number(n) => n.as_f64(),
        _ => None,
    };
    parsed.ok_or_else(|| Error::decode("json", format!("'{key}' is not a coordinate: {value}")))
}

fn place_from_json(hit: Value) -> Result<Place> {
    let lat = coordinate(&hit, "lat")?;
    let lon = coordinate(&hit, "lon")?;
    let display_name = hit
        .get("display_name")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    Ok(Place {
        lat,
        lon,
        display_name,
        raw: hit,
    })
}
