// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use bytes::Bytes;
use chrono::{DateTime, FixedOffset};

use crate::episode::{EpisodeDefaults, EpisodeRecord, stem_of};
use crate::error::{MetadataError, StoreError};
use crate::store::ObjectStore;

/// Key prefix under which one JSON document per episode is stored
pub const METADATA_PREFIX: &str = "assets/metadata/";

const METADATA_CONTENT_TYPE: &str = "application/json";

/// Reads and writes episode records in the object store
///
/// This is the source of truth for episode history. It does not depend on
/// any local directory, so a fresh checkout can rebuild the complete feed.
pub struct MetadataRepository<'a> {
    store: &'a dyn ObjectStore,
}

impl<'a> MetadataRepository<'a> {
    pub fn new(store: &'a dyn ObjectStore) -> Self {
        Self { store }
    }

    /// Storage key for the record of `filename`
    pub fn key_for(filename: &str) -> String {
        format!("{}{}.json", METADATA_PREFIX, stem_of(filename))
    }

    /// Store a record, replacing whatever was stored for the same stem
    pub async fn put(&self, record: &EpisodeRecord) -> Result<(), MetadataError> {
        let key = Self::key_for(&record.filename);
        let json = serde_json::to_vec_pretty(record)?;

        self.store
            .put(&key, Bytes::from(json), METADATA_CONTENT_TYPE)
            .await?;

        tracing::debug!(key = %key, "saved episode metadata");
        Ok(())
    }

    /// Load the record for `filename`, `None` if there is none
    pub async fn get(&self, filename: &str) -> Result<Option<EpisodeRecord>, MetadataError> {
        self.fetch(&Self::key_for(filename)).await
    }

    /// Like [`get`](Self::get), but substitutes a minimal record for corrupt data
    ///
    /// The substitute carries the default title and description, zero size
    /// and duration, and `fallback_date`.
    pub async fn get_or_placeholder(
        &self,
        filename: &str,
        defaults: &EpisodeDefaults,
        fallback_date: DateTime<FixedOffset>,
    ) -> Result<Option<EpisodeRecord>, MetadataError> {
        match self.get(filename).await {
            Err(MetadataError::RecordCorrupt { key, source }) => {
                tracing::warn!(key = %key, error = %source, "corrupt metadata, using placeholder");
                Ok(Some(EpisodeRecord::placeholder(
                    filename,
                    defaults,
                    fallback_date,
                )))
            }
            other => other,
        }
    }

    /// Load every record in the metadata namespace
    ///
    /// Follows the store's pagination to the end. Records that cannot be
    /// fetched or parsed are logged and skipped; only a failure to list the
    /// namespace itself is returned as an error.
    pub async fn list_all(&self) -> Result<Vec<EpisodeRecord>, MetadataError> {
        let mut keys = Vec::new();
        let mut continuation: Option<String> = None;

        loop {
            let page = self
                .store
                .list(METADATA_PREFIX, continuation.as_deref())
                .await?;
            keys.extend(page.keys.into_iter().filter(|key| key.ends_with(".json")));

            match page.next {
                Some(token) => continuation = Some(token),
                None => break,
            }
        }

        let mut records = Vec::with_capacity(keys.len());
        let mut skipped = 0;

        for key in &keys {
            match self.fetch(key).await {
                Ok(Some(record)) => records.push(record),
                // Removed between listing and fetching
                Ok(None) => {}
                Err(e) => {
                    skipped += 1;
                    tracing::warn!(key = %key, error = %e, "skipping unreadable episode metadata");
                }
            }
        }

        tracing::debug!(
            loaded = records.len(),
            skipped,
            "listed episode metadata"
        );
        Ok(records)
    }

    async fn fetch(&self, key: &str) -> Result<Option<EpisodeRecord>, MetadataError> {
        let data = match self.store.get(key).await {
            Ok(data) => data,
            Err(StoreError::NotFound(_)) => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        serde_json::from_slice(&data)
            .map(Some)
            .map_err(|e| MetadataError::RecordCorrupt {
                key: key.to_string(),
                source: e,
            })
    }
}
