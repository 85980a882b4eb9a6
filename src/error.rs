//! Error types for the polling pipeline.
//!
//! Each concern owns an enum so the loops can decide locally what is
//! recoverable: fetch and format failures are retried on the next tick,
//! dispatch failures are logged and dropped, configuration failures are
//! fatal at startup only.

use std::path::PathBuf;
use thiserror::Error;

/// Failure reaching a target or the directory source.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("No fetcher for {target:?}, provide an http://, https:// or file:// target")]
    UnsupportedScheme { target: String },

    #[error("Failed to build HTTP client: {reason}")]
    ClientBuild { reason: String },

    #[error("Request to {target} failed: {reason}")]
    Request { target: String, reason: String },

    #[error("{target} answered with HTTP {status}")]
    Status { target: String, status: u16 },

    #[error("Cannot read {path}: {source}")]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A document could not be turned into the expected shape.
#[derive(Error, Debug)]
pub enum FormatError {
    #[error("No header fields and no events found in log from {source_id}")]
    EmptyLog { source_id: String },

    #[error("No {kind} records found in listing from {source_id}")]
    EmptyListing { kind: &'static str, source_id: String },

    #[error("Invalid coordinate {value:?}: {reason}")]
    Coordinate { value: String, reason: String },
}

/// The notification sink rejected a message or could not be reached.
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("Failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Webhook request failed: {0}")]
    Transport(String),

    #[error("Webhook answered with HTTP {status}: {body}")]
    Rejected { status: u16, body: String },
}

/// Invalid or missing configuration, only raised before any loop starts.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Provide a valid webhook URL for slack")]
    MissingWebhook,

    #[error("Provide at least one target")]
    MissingTargets,

    #[error("Unknown time zone {name:?}: {reason}")]
    InvalidTimezone { name: String, reason: String },

    #[error("{field} must be greater than zero")]
    ZeroInterval { field: &'static str },

    #[error("Failed to load config: {reason}")]
    Load { reason: String },

    #[error("Configuration file already exists at {path}. Use --force to overwrite")]
    AlreadyExists { path: PathBuf },

    #[error("Cannot write configuration to {path}: {reason}")]
    Save { path: PathBuf, reason: String },
}

impl From<figment::Error> for ConfigError {
    fn from(e: figment::Error) -> Self {
        ConfigError::Load {
            reason: e.to_string(),
        }
    }
}

/// Crate-level error wrapping every concern.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Format(#[from] FormatError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to encode JSON output: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
