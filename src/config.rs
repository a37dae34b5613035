use std::time::Duration;

use reqwest::blocking::Client;

use crate::error::{Error, Result};

pub const DEFAULT_HOST: &str = "https://markfoley.info/geoserver";
pub const DEFAULT_NOMINATIM_URL: &str = "https://nominatim.openstreetmap.org";
pub const DEFAULT_USER_AGENT: &str = "gisp-agent";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Settings shared by [`WfsClient`](crate::WfsClient) and
/// [`Geocoder`](crate::Geocoder).
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Geoserver base URL, used when a dataset is referenced without a host.
    pub host: String,
    pub timeout: Duration,
    pub user_agent: String,
    pub nominatim_url: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            timeout: DEFAULT_TIMEOUT,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            nominatim_url: DEFAULT_NOMINATIM_URL.to_string(),
        }
    }
}

impl ClientConfig {
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = trim_base(host.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn with_nominatim_url(mut self, url: impl Into<String>) -> Self {
        self.nominatim_url = trim_base(url.into());
        self
    }

    pub(crate) fn build_http_client(&self) -> Result<Client> {
        if self.user_agent.trim().is_empty() {
            return Err(Error::Configuration("user agent must not be empty".into()));
        }
        Client::builder()
            .timeout(self.timeout)
            .user_agent(self.user_agent.clone())
            .build()
            .map_err(|e| Error::Configuration(format!("failed to build HTTP client: {e}")))
    }
}

/// Base URLs are joined with `/path`, so a trailing slash would double up.
pub(crate) fn trim_base(url: String) -> String {
    match url.strip_suffix('/') {
        Some(stripped) => trim_base(stripped.to_string()),
        None => url,
    }
}
