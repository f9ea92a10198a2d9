// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `podpub.toml` loading and validation.
//!
//! Every check that can fail happens here, before the first byte is read
//! from or written to storage.

use std::path::{Path, PathBuf};

use chrono::{DateTime, FixedOffset, Utc};
use chrono_tz::Tz;
use serde::Deserialize;
use url::Url;

use crate::cdn::{CacheInvalidator, HttpPurgeInvalidator};
use crate::convert::AudioSettings;
use crate::episode::EpisodeDefaults;
use crate::error::ConfigError;
use crate::feed::ChannelDescriptor;
use crate::store::{LocalStore, ObjectStore, validate_key};

/// Default location of the configuration file
pub const DEFAULT_CONFIG_FILE: &str = "podpub.toml";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub podcast: ChannelDescriptor,
    pub feed: FeedSettings,
    pub episode: EpisodeDefaults,
    #[serde(default)]
    pub audio: AudioSettings,
    #[serde(default)]
    pub directories: Directories,
    pub storage: StorageSettings,
    #[serde(default)]
    pub cdn: CdnSettings,
    #[serde(default)]
    pub system: SystemSettings,
}

/// The `[feed]` section
#[derive(Debug, Clone, Deserialize)]
pub struct FeedSettings {
    /// Name of the feed document, locally and as storage key
    #[serde(default = "default_feed_filename")]
    pub filename: String,
    /// Artwork file name inside the assets directory
    #[serde(default)]
    pub artwork: Option<String>,
    /// Public base URL the store is served from
    pub base_url: Url,
}

fn default_feed_filename() -> String {
    "feed.xml".to_string()
}

/// Local working directories
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Directories {
    /// Artwork and other channel assets
    pub assets: PathBuf,
    /// Incoming source audio
    pub episodes: PathBuf,
    /// Converted audio, as uploaded
    pub published: PathBuf,
    /// Source files that were published successfully
    pub processed: PathBuf,
    /// Rendered feed document
    pub feed: PathBuf,
}

impl Default for Directories {
    fn default() -> Self {
        Self {
            assets: PathBuf::from("assets"),
            episodes: PathBuf::from("episodes"),
            published: PathBuf::from("published"),
            processed: PathBuf::from("processed"),
            feed: PathBuf::from("feed"),
        }
    }
}

impl Directories {
    /// Resolve relative directories against `base`
    fn resolve(&mut self, base: &Path) {
        for dir in [
            &mut self.assets,
            &mut self.episodes,
            &mut self.published,
            &mut self.processed,
            &mut self.feed,
        ] {
            if dir.is_relative() {
                *dir = base.join(&*dir);
            }
        }
    }
}

/// The `[storage]` section, selected by its `backend` key
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum StorageSettings {
    Local {
        root: PathBuf,
    },
    S3 {
        bucket: String,
        region: String,
        #[serde(default)]
        endpoint: Option<String>,
        #[serde(default)]
        prefix: Option<String>,
        #[serde(default)]
        key_id: Option<String>,
        #[serde(default)]
        key_secret: Option<String>,
    },
}

impl StorageSettings {
    /// Build the configured object store
    pub fn open(&self) -> Result<Box<dyn ObjectStore>, ConfigError> {
        match self {
            StorageSettings::Local { root } => Ok(Box::new(LocalStore::new(root.clone()))),
            #[cfg(feature = "s3")]
            StorageSettings::S3 {
                bucket,
                region,
                endpoint,
                prefix,
                key_id,
                key_secret,
            } => {
                let (key_id, key_secret) = aws_credentials(
                    key_id,
                    key_secret,
                    "storage.key_id",
                    "storage.key_secret",
                )?;

                Ok(Box::new(crate::store::S3Store::new(crate::store::S3Settings {
                    bucket: bucket.clone(),
                    region: region.clone(),
                    endpoint: endpoint.clone(),
                    prefix: prefix.clone(),
                    key_id,
                    key_secret,
                })))
            }
            #[cfg(not(feature = "s3"))]
            StorageSettings::S3 { .. } => Err(ConfigError::InvalidValue {
                field: "storage.backend",
                reason: "this build does not include S3 support (enable the `s3` feature)"
                    .to_string(),
            }),
        }
    }
}

/// The `[cdn]` section, selected by its `backend` key
///
/// Without the section, cache invalidation is skipped.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum CdnSettings {
    #[default]
    None,
    /// POST changed paths to a purge endpoint
    Http {
        purge_url: Url,
        #[serde(default)]
        token: Option<String>,
    },
    /// CloudFront `CreateInvalidation`
    CloudFront {
        /// Looked up by domain when not given
        #[serde(default)]
        distribution_id: Option<String>,
        /// Host the distribution serves, defaults to the `feed.base_url` host
        #[serde(default)]
        domain: Option<String>,
        #[serde(default)]
        key_id: Option<String>,
        #[serde(default)]
        key_secret: Option<String>,
    },
}

impl CdnSettings {
    /// Build the configured invalidator, `None` when invalidation is off
    pub fn invalidator(
        &self,
        base_url: &Url,
    ) -> Result<Option<Box<dyn CacheInvalidator>>, ConfigError> {
        match self {
            CdnSettings::None => Ok(None),
            CdnSettings::Http { purge_url, token } => Ok(Some(Box::new(
                HttpPurgeInvalidator::new(purge_url.clone(), token.clone()),
            ))),
            #[cfg(feature = "s3")]
            CdnSettings::CloudFront {
                distribution_id,
                domain,
                key_id,
                key_secret,
            } => {
                use crate::cdn::{CloudFrontInvalidator, DistributionTarget};

                let target = match (distribution_id, domain) {
                    (Some(id), _) => DistributionTarget::Id(id.clone()),
                    (None, Some(domain)) => DistributionTarget::Domain(domain.clone()),
                    (None, None) => DistributionTarget::Domain(
                        base_url
                            .host_str()
                            .ok_or(ConfigError::MissingField("cdn.domain"))?
                            .to_string(),
                    ),
                };
                let (key_id, key_secret) =
                    aws_credentials(key_id, key_secret, "cdn.key_id", "cdn.key_secret")?;

                Ok(Some(Box::new(CloudFrontInvalidator::new(
                    target, key_id, key_secret,
                ))))
            }
            #[cfg(not(feature = "s3"))]
            CdnSettings::CloudFront { .. } => {
                let _ = base_url;
                Err(ConfigError::InvalidValue {
                    field: "cdn.backend",
                    reason: "this build does not include CloudFront support (enable the `s3` feature)"
                        .to_string(),
                })
            }
        }
    }
}

/// Explicit credentials, falling back to the standard AWS environment variables
#[cfg(feature = "s3")]
fn aws_credentials(
    key_id: &Option<String>,
    key_secret: &Option<String>,
    key_id_field: &'static str,
    key_secret_field: &'static str,
) -> Result<(String, String), ConfigError> {
    let key_id = key_id
        .clone()
        .or_else(|| std::env::var("AWS_ACCESS_KEY_ID").ok())
        .ok_or(ConfigError::MissingField(key_id_field))?;
    let key_secret = key_secret
        .clone()
        .or_else(|| std::env::var("AWS_SECRET_ACCESS_KEY").ok())
        .ok_or(ConfigError::MissingField(key_secret_field))?;
    Ok((key_id, key_secret))
}

/// Zone new episode dates are stamped in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishTimezone {
    Fixed(FixedOffset),
    /// IANA zone; the offset follows daylight saving time
    Named(Tz),
}

impl PublishTimezone {
    /// Accepts `UTC`, `Z`, offsets like `+02:00` or `-0500`, and IANA names
    /// like `Europe/Berlin`
    pub fn parse(value: &str) -> Option<Self> {
        parse_utc_offset(value)
            .map(PublishTimezone::Fixed)
            .or_else(|| value.trim().parse::<Tz>().ok().map(PublishTimezone::Named))
    }

    /// `instant` in this zone, with the offset in effect at that instant
    pub fn localize(&self, instant: DateTime<Utc>) -> DateTime<FixedOffset> {
        match self {
            PublishTimezone::Fixed(offset) => instant.with_timezone(offset),
            PublishTimezone::Named(tz) => instant.with_timezone(tz).fixed_offset(),
        }
    }

    pub fn now(&self) -> DateTime<FixedOffset> {
        self.localize(Utc::now())
    }
}

/// The `[system]` section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SystemSettings {
    /// Zone for new episode dates: `UTC`, `+02:00` or `Europe/Berlin`
    pub timezone: String,
}

impl Default for SystemSettings {
    fn default() -> Self {
        Self {
            timezone: "UTC".to_string(),
        }
    }
}

impl SystemSettings {
    pub fn publish_timezone(&self) -> Result<PublishTimezone, ConfigError> {
        PublishTimezone::parse(&self.timezone).ok_or_else(|| ConfigError::InvalidValue {
            field: "system.timezone",
            reason: format!(
                "'{}' is neither a UTC offset like +02:00 nor a zone name like Europe/Berlin",
                self.timezone
            ),
        })
    }
}

fn parse_utc_offset(value: &str) -> Option<FixedOffset> {
    let value = value.trim();
    if value.eq_ignore_ascii_case("utc") || value == "Z" {
        return FixedOffset::east_opt(0);
    }

    let (sign, rest) = match value.as_bytes().first()? {
        b'+' => (1, &value[1..]),
        b'-' => (-1, &value[1..]),
        _ => return None,
    };

    let digits: String = rest.chars().filter(|c| *c != ':').collect();
    if digits.len() != 4 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }

    let hours: i32 = digits[..2].parse().ok()?;
    let minutes: i32 = digits[2..].parse().ok()?;
    if hours > 23 || minutes > 59 {
        return None;
    }

    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

impl Config {
    /// Parse a configuration document without touching the filesystem
    pub fn from_toml(content: &str, path: &Path) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content).map_err(|e| ConfigError::ParseFailed {
            path: path.to_path_buf(),
            source: e,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check everything that would otherwise fail halfway through a run
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.podcast
            .validate()
            .map_err(|e| ConfigError::InvalidValue {
                field: "podcast",
                reason: e.to_string(),
            })?;

        if self.episode.default_title.trim().is_empty() {
            return Err(ConfigError::MissingField("episode.default_title"));
        }

        if !matches!(self.feed.base_url.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidValue {
                field: "feed.base_url",
                reason: format!("'{}' is not an http(s) URL", self.feed.base_url),
            });
        }

        validate_key(&self.feed.filename).map_err(|_| ConfigError::InvalidValue {
            field: "feed.filename",
            reason: format!("'{}' is not a valid storage key", self.feed.filename),
        })?;

        if let Some(artwork) = &self.feed.artwork
            && (artwork.is_empty() || artwork.contains('/') || artwork.contains('\\'))
        {
            return Err(ConfigError::InvalidValue {
                field: "feed.artwork",
                reason: format!("'{}' must be a plain file name", artwork),
            });
        }

        self.system.publish_timezone()?;
        Ok(())
    }
}

/// Load and validate the configuration file at `path`
///
/// Relative directories are resolved against the file's parent directory.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFailed {
        path: path.to_path_buf(),
        source: e,
    })?;

    let mut config = Config::from_toml(&content, path)?;

    if let Some(base) = path.parent() {
        config.directories.resolve(base);
        if let StorageSettings::Local { root } = &mut config.storage
            && root.is_relative()
        {
            *root = base.join(&*root);
        }
    }

    Ok(config)
}
