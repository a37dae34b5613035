use std::collections::BTreeMap;
use std::fmt;

use crate::error::{Error, Result};

/// The three response formats we know how to decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Csv,
    Json,
    Zip,
}

impl ContentKind {
    pub fn from_mime(mime: &str) -> Option<Self> {
        match mime {
            "text/csv" => Some(ContentKind::Csv),
            "application/json" => Some(ContentKind::Json),
            "application/zip" => Some(ContentKind::Zip),
            _ => None,
        }
    }

    pub fn mime(&self) -> &'static str {
        match self {
            ContentKind::Csv => "text/csv",
            ContentKind::Json => "application/json",
            ContentKind::Zip => "application/zip",
        }
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mime())
    }
}

/// A parsed `Content-Type` header: `;`-separated segments, each `key` or
/// `key=value`. The first segment's key is the MIME type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentType {
    pub mime: String,
    pub params: BTreeMap<String, String>,
}

impl ContentType {
    pub fn parse(header: &str) -> Result<Self> {
        let mut segments = header.split(';').map(str::trim);

        let mime = segments
            .next()
            .map(|first| first.split('=').next().unwrap_or_default().trim())
            .filter(|mime| !mime.is_empty())
            .ok_or_else(|| Error::Format(format!("empty Content-Type header '{header}'")))?;

        let params = segments
            .filter_map(|segment| segment.split_once('='))
            .map(|(key, value)| {
                (
                    key.trim().to_ascii_lowercase(),
                    value.trim().trim_matches('"').to_string(),
                )
            })
            .collect();

        Ok(Self {
            mime: mime.to_ascii_lowercase(),
            params,
        })
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    pub fn charset(&self) -> Option<&str> {
        self.param("charset")
    }

    /// The decoding branch for this header; anything outside the supported
    /// set is a format error.
    pub fn kind(&self) -> Result<ContentKind> {
        ContentKind::from_mime(&self.mime).ok_or_else(|| {
            Error::Format(format!(
                "'{}' is not one of text/csv, application/json, application/zip",
                self.mime
            ))
        })
    }
}
