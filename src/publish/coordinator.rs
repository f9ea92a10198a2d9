// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::collections::BTreeSet;

use crate::cdn::CacheInvalidator;
use crate::error::ArtifactError;
use crate::store::{Fingerprint, ObjectStore};

use super::artifact::Artifact;

/// Paths whose content changed during one run
///
/// Paths carry a leading `/`, the form CDNs expect for invalidation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishManifest {
    paths: BTreeSet<String>,
}

impl PublishManifest {
    /// Record that the object under `key` was replaced
    pub fn record(&mut self, key: &str) {
        self.paths.insert(format!("/{}", key.trim_start_matches('/')));
    }

    pub fn contains(&self, key: &str) -> bool {
        self.paths
            .contains(&format!("/{}", key.trim_start_matches('/')))
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn paths(&self) -> Vec<String> {
        self.paths.iter().cloned().collect()
    }
}

/// Result of publishing one artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    /// Content differed from the stored object (or there was none) and was uploaded
    Uploaded(Fingerprint),
    /// The stored object already has this content
    Unchanged(Fingerprint),
}

impl PublishOutcome {
    pub fn was_uploaded(&self) -> bool {
        matches!(self, PublishOutcome::Uploaded(_))
    }
}

/// Uploads artifacts only when their content changed
pub struct PublishCoordinator<'a> {
    store: &'a dyn ObjectStore,
}

impl<'a> PublishCoordinator<'a> {
    pub fn new(store: &'a dyn ObjectStore) -> Self {
        Self { store }
    }

    /// Publish `artifact` unless the store already holds identical content
    ///
    /// The local fingerprint is compared with the one reported by the store;
    /// a missing remote object counts as changed. Uploaded keys are recorded
    /// in `manifest`.
    pub async fn publish(
        &self,
        manifest: &mut PublishManifest,
        artifact: &Artifact,
    ) -> Result<PublishOutcome, ArtifactError> {
        let data = artifact.load().await?;
        let local = Fingerprint::of_bytes(&data);
        let remote = self.store.head(&artifact.key).await?;

        if remote.as_ref() == Some(&local) {
            tracing::debug!(key = %artifact.key, "unchanged, skipping upload");
            return Ok(PublishOutcome::Unchanged(local));
        }

        self.store
            .put(&artifact.key, data, artifact.content_type())
            .await?;
        manifest.record(&artifact.key);

        tracing::info!(
            key = %artifact.key,
            store = self.store.name(),
            fingerprint = %local,
            "uploaded"
        );
        Ok(PublishOutcome::Uploaded(local))
    }

    /// Request cache invalidation for every path in `manifest`
    ///
    /// Nothing is requested for an empty manifest. Failures are logged and
    /// swallowed: the content is already published at this point.
    pub async fn invalidate(
        &self,
        manifest: &PublishManifest,
        invalidator: &dyn CacheInvalidator,
    ) -> Option<String> {
        if manifest.is_empty() {
            return None;
        }

        match invalidator.invalidate(&manifest.paths()).await {
            Ok(id) => {
                tracing::info!(invalidation_id = %id, paths = manifest.len(), "cache invalidation requested");
                Some(id)
            }
            Err(e) => {
                tracing::warn!(error = %e, "cache invalidation failed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{InvalidationError, StoreError};
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use bytes::Bytes;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingInvalidator {
        calls: Mutex<Vec<Vec<String>>>,
        fail: bool,
    }

    #[async_trait]
    impl CacheInvalidator for RecordingInvalidator {
        async fn invalidate(&self, paths: &[String]) -> Result<String, InvalidationError> {
            self.calls.lock().unwrap().push(paths.to_vec());
            if self.fail {
                Err(InvalidationError::Rejected {
                    endpoint: "https://cdn.example.com/purge".to_string(),
                    status: 503,
                })
            } else {
                Ok(format!("inv-{}", paths.len()))
            }
        }
    }

    #[test]
    fn manifest_normalizes_leading_slash() {
        let mut manifest = PublishManifest::default();
        manifest.record("feed.xml");
        manifest.record("/feed.xml");

        assert_eq!(manifest.paths(), vec!["/feed.xml"]);
        assert!(manifest.contains("feed.xml"));
    }

    #[tokio::test]
    async fn uploads_when_remote_is_absent() {
        let store = MemoryStore::new();
        let coordinator = PublishCoordinator::new(&store);
        let mut manifest = PublishManifest::default();

        let outcome = coordinator
            .publish(&mut manifest, &Artifact::audio("ep.mp3", Bytes::from_static(b"audio")))
            .await
            .unwrap();

        assert!(outcome.was_uploaded());
        assert_eq!(manifest.paths(), vec!["/episodes/ep.mp3"]);
        assert_eq!(store.content_type("episodes/ep.mp3").as_deref(), Some("audio/mpeg"));
    }

    #[tokio::test]
    async fn skips_unchanged_content() {
        let store = MemoryStore::with_objects([("feed.xml", "<rss/>")]);
        let coordinator = PublishCoordinator::new(&store);
        let mut manifest = PublishManifest::default();

        let outcome = coordinator
            .publish(&mut manifest, &Artifact::feed("feed.xml", "<rss/>"))
            .await
            .unwrap();

        assert_eq!(outcome, PublishOutcome::Unchanged(Fingerprint::of_bytes(b"<rss/>")));
        assert!(manifest.is_empty());
        assert_eq!(store.put_count(), 0);
    }

    #[tokio::test]
    async fn uploads_changed_content() {
        let store = MemoryStore::with_objects([("feed.xml", "<rss>old</rss>")]);
        let coordinator = PublishCoordinator::new(&store);
        let mut manifest = PublishManifest::default();

        let outcome = coordinator
            .publish(&mut manifest, &Artifact::feed("feed.xml", "<rss>new</rss>"))
            .await
            .unwrap();

        assert!(outcome.was_uploaded());
        assert!(manifest.contains("feed.xml"));
        assert_eq!(&store.get("feed.xml").await.unwrap()[..], b"<rss>new</rss>");
    }

    #[tokio::test]
    async fn second_publish_is_a_no_op() {
        let store = MemoryStore::new();
        let coordinator = PublishCoordinator::new(&store);
        let artifact = Artifact::audio("ep.mp3", Bytes::from_static(b"audio"));

        let mut first = PublishManifest::default();
        coordinator.publish(&mut first, &artifact).await.unwrap();

        let mut second = PublishManifest::default();
        let outcome = coordinator.publish(&mut second, &artifact).await.unwrap();

        assert!(!outcome.was_uploaded());
        assert!(second.is_empty());
        assert_eq!(store.put_count(), 1);
    }

    #[tokio::test]
    async fn store_outage_is_reported_and_not_recorded() {
        let store = MemoryStore::new();
        store.set_unavailable(true);
        let coordinator = PublishCoordinator::new(&store);
        let mut manifest = PublishManifest::default();

        let result = coordinator
            .publish(&mut manifest, &Artifact::feed("feed.xml", "<rss/>"))
            .await;

        assert!(matches!(
            result,
            Err(ArtifactError::Store(StoreError::Unavailable { .. }))
        ));
        assert!(manifest.is_empty());
    }

    #[tokio::test]
    async fn invalidate_sends_exactly_the_manifest() {
        let store = MemoryStore::new();
        let coordinator = PublishCoordinator::new(&store);
        let invalidator = RecordingInvalidator::default();

        let mut manifest = PublishManifest::default();
        manifest.record("feed.xml");
        manifest.record("episodes/ep.mp3");

        let id = coordinator.invalidate(&manifest, &invalidator).await;

        assert_eq!(id.as_deref(), Some("inv-2"));
        assert_eq!(
            *invalidator.calls.lock().unwrap(),
            vec![vec!["/episodes/ep.mp3".to_string(), "/feed.xml".to_string()]]
        );
    }

    #[tokio::test]
    async fn invalidate_skips_empty_manifest() {
        let store = MemoryStore::new();
        let coordinator = PublishCoordinator::new(&store);
        let invalidator = RecordingInvalidator::default();

        let id = coordinator
            .invalidate(&PublishManifest::default(), &invalidator)
            .await;

        assert_eq!(id, None);
        assert!(invalidator.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn invalidation_failure_is_not_fatal() {
        let store = MemoryStore::new();
        let coordinator = PublishCoordinator::new(&store);
        let invalidator = RecordingInvalidator {
            fail: true,
            ..Default::default()
        };

        let mut manifest = PublishManifest::default();
        manifest.record("feed.xml");

        assert_eq!(coordinator.invalidate(&manifest, &invalidator).await, None);
    }
}
