// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Object store abstraction.
//!
//! The publishing core only ever talks to storage through [`ObjectStore`]:
//! a flat key space with put/get/head/list. Keys use `/` separators and never
//! start with one.

mod fingerprint;
mod local;
mod memory;
#[cfg(feature = "s3")]
mod s3;

pub use fingerprint::Fingerprint;
pub use local::LocalStore;
pub use memory::MemoryStore;
#[cfg(feature = "s3")]
pub use s3::{S3Settings, S3Store};

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::StoreError;

/// One page of keys returned by [`ObjectStore::list`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListPage {
    pub keys: Vec<String>,
    /// Token to pass back to fetch the next page, `None` on the last page
    pub next: Option<String>,
}

/// Key-value object store used for audio, artwork, metadata and the feed
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Human readable name for log output
    fn name(&self) -> &str;

    /// Store `data` under `key`, replacing any existing object
    async fn put(&self, key: &str, data: Bytes, content_type: &str) -> Result<(), StoreError>;

    /// Fetch the object stored under `key`
    ///
    /// Returns [`StoreError::NotFound`] when the key does not exist.
    async fn get(&self, key: &str) -> Result<Bytes, StoreError>;

    /// Probe the fingerprint of the object under `key` without downloading it
    ///
    /// Returns `Ok(None)` when the object does not exist.
    async fn head(&self, key: &str) -> Result<Option<Fingerprint>, StoreError>;

    /// List keys starting with `prefix`, one page at a time
    async fn list(&self, prefix: &str, continuation: Option<&str>)
    -> Result<ListPage, StoreError>;
}

/// Reject keys that could escape the store root or are otherwise unusable
pub(crate) fn validate_key(key: &str) -> Result<&str, StoreError> {
    let invalid = key.is_empty()
        || key.starts_with('/')
        || key.contains('\\')
        || key.split('/').any(|part| part.is_empty() || part == "." || part == "..");

    if invalid {
        Err(StoreError::InvalidKey(key.to_string()))
    } else {
        Ok(key)
    }
}
