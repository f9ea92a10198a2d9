// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;

use super::{Fingerprint, ListPage, ObjectStore, validate_key};
use crate::error::StoreError;

const DEFAULT_PAGE_SIZE: usize = 1000;

/// Object store backed by a local directory
///
/// Keys map to paths below `root`. Content types are not persisted; a web
/// server in front of the directory is expected to derive them from the
/// extension. Useful for staging a feed before pointing it at a bucket.
#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
    page_size: usize,
}

impl LocalStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Limit the number of keys returned per [`ObjectStore::list`] call
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StoreError> {
        Ok(self.root.join(validate_key(key)?))
    }

    /// Recursively collect keys of all files below `dir`
    fn collect_keys(&self, dir: &Path, keys: &mut Vec<String>) -> std::io::Result<()> {
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e),
        };

        for entry in entries {
            let entry = entry?;
            let path = entry.path();

            if entry.file_type()?.is_dir() {
                self.collect_keys(&path, keys)?;
            } else if let Ok(relative) = path.strip_prefix(&self.root) {
                let key: Vec<_> = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect();
                keys.push(key.join("/"));
            }
        }

        Ok(())
    }
}

#[async_trait]
impl ObjectStore for LocalStore {
    fn name(&self) -> &str {
        "local"
    }

    async fn put(&self, key: &str, data: Bytes, content_type: &str) -> Result<(), StoreError> {
        let path = self.path_for(key)?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StoreError::unavailable(key, e))?;
        }

        tokio::fs::write(&path, &data)
            .await
            .map_err(|e| StoreError::unavailable(key, e))?;

        tracing::debug!(key, content_type, bytes = data.len(), "stored object");
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Bytes, StoreError> {
        let path = self.path_for(key)?;

        match tokio::fs::read(&path).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StoreError::NotFound(key.to_string())),
            Err(e) => Err(StoreError::unavailable(key, e)),
        }
    }

    async fn head(&self, key: &str) -> Result<Option<Fingerprint>, StoreError> {
        let path = self.path_for(key)?;

        match Fingerprint::of_file(&path).await {
            Ok(fingerprint) => Ok(Some(fingerprint)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::unavailable(key, e)),
        }
    }

    async fn list(
        &self,
        prefix: &str,
        continuation: Option<&str>,
    ) -> Result<ListPage, StoreError> {
        // Only walk the deepest directory the prefix names
        let start = match prefix.rsplit_once('/') {
            Some((dir, _)) => self.path_for(dir)?,
            None => self.root.clone(),
        };

        let mut keys = Vec::new();
        self.collect_keys(&start, &mut keys)
            .map_err(|e| StoreError::unavailable(prefix, e))?;

        keys.retain(|key| key.starts_with(prefix));
        keys.sort();

        let remaining: Vec<String> = keys
            .into_iter()
            .filter(|key| continuation.is_none_or(|token| key.as_str() > token))
            .collect();

        let has_more = remaining.len() > self.page_size;
        let page: Vec<String> = remaining.into_iter().take(self.page_size).collect();
        let next = if has_more { page.last().cloned() } else { None };

        Ok(ListPage { keys: page, next })
    }
}
