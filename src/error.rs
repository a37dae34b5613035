use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// The request never produced a usable response: connection failure,
    /// timeout, or a non-2xx status.
    #[error("request to {url} failed: {reason}")]
    Transport { url: String, reason: String },

    /// The response declared a content type we cannot handle.
    #[error("unsupported content type: {0}")]
    Format(String),

    /// The caller's arguments cannot produce a valid request or result.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// The body did not parse as the declared format.
    #[error("failed to decode {format} response: {reason}")]
    Decode { format: &'static str, reason: String },

    /// The geocoder answered but found nothing.
    #[error("no result found for '{0}'")]
    NotFound(String),

    #[error("reprojection from EPSG:{source_epsg} to EPSG:{target_epsg} failed: {reason}")]
    Reproject {
        source_epsg: u32,
        target_epsg: u32,
        reason: String,
    },

    /// GDAL failed while creating or filling an output file.
    #[error("failed to write {path:?}: {reason}")]
    Write { path: PathBuf, reason: String },

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl Error {
    pub(crate) fn transport(url: &str, reason: impl ToString) -> Self {
        Error::Transport {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn decode(format: &'static str, reason: impl ToString) -> Self {
        Error::Decode {
            format,
            reason: reason.to_string(),
        }
    }

    /// Short kind name, used by the CLI when reporting failures.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Transport { .. } => "transport",
            Error::Format(_) => "format",
            Error::Configuration(_) => "configuration",
            Error::Decode { .. } => "decode",
            Error::NotFound(_) => "not-found",
            Error::Reproject { .. } => "reproject",
            Error::Write { .. } => "write",
            Error::Io(_) => "io",
        }
    }
}
