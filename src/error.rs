// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading or validating the configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    ParseFailed {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Missing required config value: {0}")]
    MissingField(&'static str),

    #[error("Invalid config value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

/// Errors raised by the object store adapters
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Object store unavailable while accessing {key}: {reason}")]
    Unavailable { key: String, reason: String },

    #[error("Invalid object key: {0}")]
    InvalidKey(String),
}

impl StoreError {
    pub(crate) fn unavailable(key: &str, reason: impl ToString) -> Self {
        StoreError::Unavailable {
            key: key.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Errors that can occur during episode metadata operations
#[derive(Error, Debug)]
pub enum MetadataError {
    #[error("Metadata store error: {0}")]
    Store(#[from] StoreError),

    #[error("Corrupt metadata record {key}: {source}")]
    RecordCorrupt {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to serialize metadata: {0}")]
    SerializeFailed(#[from] serde_json::Error),
}

/// Errors raised while converting or probing audio
#[derive(Error, Debug)]
pub enum ConversionError {
    #[error("Failed to launch {tool}: {source}")]
    ToolUnavailable {
        tool: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("{tool} failed on {path}: {stderr}")]
    ToolFailed {
        tool: &'static str,
        path: PathBuf,
        stderr: String,
    },

    #[error("Could not read duration of {path} from '{output}'")]
    InvalidDuration { path: PathBuf, output: String },

    #[error("Failed to read audio file {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write audio file {path}: {source}")]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors that can occur when rendering the RSS feed
#[derive(Error, Debug)]
pub enum FeedError {
    #[error("Channel field '{0}' is required but empty")]
    MissingField(&'static str),

    #[error("Channel field '{field}' is not a valid URL: {source}")]
    InvalidUrl {
        field: &'static str,
        #[source]
        source: url::ParseError,
    },

    #[error("Failed to write RSS document: {0}")]
    WriteFailed(#[from] rss::Error),

    #[error("RSS document is not valid UTF-8: {0}")]
    Encoding(#[from] std::string::FromUtf8Error),
}

/// Errors returned by the CDN cache invalidation adapters
#[derive(Error, Debug)]
pub enum InvalidationError {
    #[error("Invalidation request to {endpoint} failed: {source}")]
    RequestFailed {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Invalidation rejected by {endpoint} with HTTP {status}")]
    Rejected { endpoint: String, status: u16 },

    #[error("CloudFront {operation} failed: {reason}")]
    CloudFront {
        operation: &'static str,
        reason: String,
    },

    #[error("No CloudFront distribution serves {0}")]
    DistributionNotFound(String),
}

/// Errors that can occur while publishing a single artifact
#[derive(Error, Debug)]
pub enum ArtifactError {
    #[error("Failed to read artifact {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Reasons a single episode is skipped during a run
#[derive(Error, Debug)]
pub enum EpisodeError {
    #[error("Conversion failed: {0}")]
    Conversion(#[from] ConversionError),

    #[error("Upload failed: {0}")]
    Upload(#[from] ArtifactError),
}

/// Fatal errors for a publish run. Everything else degrades and is logged.
#[derive(Error, Debug)]
pub enum PublishError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Feed error: {0}")]
    Feed(#[from] FeedError),

    #[error("Failed to prepare directory {path}: {source}")]
    DirectoryFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write feed file {path}: {source}")]
    FeedWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
