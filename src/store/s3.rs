// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! S3-compatible object store.
//!
//! Works against AWS S3 and S3-compatible services (MinIO, Backblaze B2,
//! Tigris...). The SHA-256 fingerprint of every uploaded object is stored as
//! user metadata, because ETags are not content hashes for multipart uploads.

use async_trait::async_trait;
use aws_sdk_s3::{
    Client,
    config::{BehaviorVersion, Credentials, Region, retry::RetryConfig},
    error::DisplayErrorContext,
    primitives::ByteStream,
};
use bytes::Bytes;

use super::{Fingerprint, ListPage, ObjectStore, validate_key};
use crate::error::StoreError;

/// User metadata key carrying the content fingerprint
const FINGERPRINT_METADATA_KEY: &str = "podpub-fingerprint";

/// Connection settings for [`S3Store`]
#[derive(Debug, Clone)]
pub struct S3Settings {
    pub bucket: String,
    pub region: String,
    pub endpoint: Option<String>,
    pub prefix: Option<String>,
    pub key_id: String,
    pub key_secret: String,
}

#[derive(Debug, Clone)]
pub struct S3Store {
    client: Client,
    bucket: String,
    prefix: Option<String>,
}

impl S3Store {
    pub fn new(settings: S3Settings) -> Self {
        let credentials = Credentials::new(
            settings.key_id,
            settings.key_secret,
            None,
            None,
            "podpub-config",
        );

        let mut config_builder = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .credentials_provider(credentials)
            .region(Region::new(settings.region))
            // 1 initial attempt + 3 retries with exponential backoff
            .retry_config(RetryConfig::standard().with_max_attempts(4));

        // Path-style addressing for S3-compatible services
        if let Some(endpoint_url) = settings.endpoint {
            config_builder = config_builder.endpoint_url(endpoint_url).force_path_style(true);
        }

        Self {
            client: Client::from_conf(config_builder.build()),
            bucket: settings.bucket,
            prefix: settings
                .prefix
                .map(|p| p.trim_matches('/').to_string())
                .filter(|p| !p.is_empty()),
        }
    }

    fn full_key(&self, key: &str) -> Result<String, StoreError> {
        let key = validate_key(key)?;
        Ok(match &self.prefix {
            Some(prefix) => format!("{}/{}", prefix, key),
            None => key.to_string(),
        })
    }

    fn full_prefix(&self, prefix: &str) -> String {
        match &self.prefix {
            Some(root) => format!("{}/{}", root, prefix),
            None => prefix.to_string(),
        }
    }

    fn relative_key<'a>(&self, key: &'a str) -> &'a str {
        match &self.prefix {
            Some(prefix) => key
                .strip_prefix(prefix.as_str())
                .and_then(|s| s.strip_prefix('/'))
                .unwrap_or(key),
            None => key,
        }
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    fn name(&self) -> &str {
        &self.bucket
    }

    async fn put(&self, key: &str, data: Bytes, content_type: &str) -> Result<(), StoreError> {
        let full_key = self.full_key(key)?;
        let fingerprint = Fingerprint::of_bytes(&data);

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&full_key)
            .content_type(content_type)
            .metadata(FINGERPRINT_METADATA_KEY, fingerprint.as_str())
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| StoreError::unavailable(key, DisplayErrorContext(e)))?;

        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Bytes, StoreError> {
        let full_key = self.full_key(key)?;

        let output = match self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&full_key)
            .send()
            .await
        {
            Ok(output) => output,
            Err(e) if e.as_service_error().is_some_and(|err| err.is_no_such_key()) => {
                return Err(StoreError::NotFound(key.to_string()));
            }
            Err(e) => return Err(StoreError::unavailable(key, DisplayErrorContext(e))),
        };

        let body = output
            .body
            .collect()
            .await
            .map_err(|e| StoreError::unavailable(key, e))?;

        Ok(body.into_bytes())
    }

    async fn head(&self, key: &str) -> Result<Option<Fingerprint>, StoreError> {
        let full_key = self.full_key(key)?;

        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(&full_key)
            .send()
            .await
        {
            // Objects without a recorded fingerprint were not uploaded by us,
            // report them as absent so they get replaced.
            Ok(output) => Ok(output
                .metadata()
                .and_then(|meta| meta.get(FINGERPRINT_METADATA_KEY))
                .and_then(|value| Fingerprint::parse(value))),
            Err(e) if e.as_service_error().is_some_and(|err| err.is_not_found()) => Ok(None),
            Err(e) => Err(StoreError::unavailable(key, DisplayErrorContext(e))),
        }
    }

    async fn list(
        &self,
        prefix: &str,
        continuation: Option<&str>,
    ) -> Result<ListPage, StoreError> {
        let mut request = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(self.full_prefix(prefix));

        if let Some(token) = continuation {
            request = request.continuation_token(token);
        }

        let output = request
            .send()
            .await
            .map_err(|e| StoreError::unavailable(prefix, DisplayErrorContext(e)))?;

        let keys = output
            .contents()
            .iter()
            .filter_map(|object| object.key())
            .map(|key| self.relative_key(key).to_string())
            .collect();

        Ok(ListPage {
            keys,
            next: output.next_continuation_token().map(String::from),
        })
    }
}
