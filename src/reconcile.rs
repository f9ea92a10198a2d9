// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Merging this run's episodes with the published history.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::config::PublishTimezone;
use crate::convert::AudioConverter;
use crate::episode::{EpisodeDefaults, EpisodeRecord};
use crate::metadata::MetadataRepository;
use crate::store::ObjectStore;

/// Merge `new_records` into `existing`, newest first
///
/// A record in `new_records` replaces any existing record with the same
/// filename. If `new_records` names a file twice the later one wins; if
/// `existing` does, the first one listed wins.
///
/// Episodes with equal dates keep a fixed relative order: new records in
/// processing order, then existing records in listing order.
pub fn reconcile(
    new_records: Vec<EpisodeRecord>,
    existing: Vec<EpisodeRecord>,
) -> Vec<EpisodeRecord> {
    let mut seen = HashSet::with_capacity(new_records.len() + existing.len());

    let mut merged: Vec<EpisodeRecord> = new_records
        .into_iter()
        .rev()
        .filter(|record| seen.insert(record.filename.clone()))
        .collect();
    merged.reverse();

    merged.extend(
        existing
            .into_iter()
            .filter(|record| seen.insert(record.filename.clone())),
    );

    // sort_by is stable
    merged.sort_by(|a, b| b.publish_date.cmp(&a.publish_date));
    merged
}

/// Outcome of [`ReconciliationEngine::run`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciled {
    pub episodes: Vec<EpisodeRecord>,
    /// The repository could not be listed and a fallback source was used
    pub degraded: bool,
}

/// Rebuilds episode history from the audio files in a local directory
///
/// Only consulted when the metadata repository cannot be listed. Stored
/// metadata is still used for a file when it can be fetched on its own.
/// Missing or corrupt metadata becomes a placeholder record dated by the
/// file's modification time, with size and duration taken from the file.
pub struct FilesystemCatalog<'a> {
    dir: PathBuf,
    defaults: EpisodeDefaults,
    timezone: PublishTimezone,
    converter: Option<&'a dyn AudioConverter>,
}

impl<'a> FilesystemCatalog<'a> {
    pub fn new(
        dir: impl Into<PathBuf>,
        defaults: EpisodeDefaults,
        timezone: PublishTimezone,
    ) -> Self {
        Self {
            dir: dir.into(),
            defaults,
            timezone,
            converter: None,
        }
    }

    /// Probe durations of placeholder records through `converter`
    pub fn with_converter(mut self, converter: &'a dyn AudioConverter) -> Self {
        self.converter = Some(converter);
        self
    }

    /// Records for every `*.mp3` file in the directory, sorted by filename
    ///
    /// A missing or unreadable directory yields an empty list.
    pub async fn scan(&self, repository: &MetadataRepository<'_>) -> Vec<EpisodeRecord> {
        let files = match audio_files(&self.dir).await {
            Ok(files) => files,
            Err(e) => {
                tracing::warn!(dir = %self.dir.display(), error = %e, "cannot scan published directory");
                return Vec::new();
            }
        };

        let mut records = Vec::with_capacity(files.len());
        for (filename, path) in files {
            if let Some(record) = self.record_for(repository, &filename, &path).await {
                records.push(record);
            }
        }
        records
    }

    async fn record_for(
        &self,
        repository: &MetadataRepository<'_>,
        filename: &str,
        path: &Path,
    ) -> Option<EpisodeRecord> {
        let metadata = match tokio::fs::metadata(path).await {
            Ok(metadata) => metadata,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "skipping unreadable audio file");
                return None;
            }
        };

        let modified = metadata
            .modified()
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| Utc::now());
        let file_date = self.timezone.localize(modified);

        let stored = repository
            .get_or_placeholder(filename, &self.defaults, file_date)
            .await;
        let mut record = match stored {
            Ok(Some(record)) => record,
            Ok(None) => EpisodeRecord::placeholder(filename, &self.defaults, file_date),
            Err(e) => {
                tracing::debug!(filename, error = %e, "metadata unavailable, using placeholder");
                EpisodeRecord::placeholder(filename, &self.defaults, file_date)
            }
        };

        if record.size_bytes == 0 {
            record.size_bytes = metadata.len();
        }
        if record.duration_ms == 0 {
            record.duration_ms = self.probe_duration(path).await;
        }
        Some(record)
    }

    async fn probe_duration(&self, path: &Path) -> u64 {
        let Some(converter) = self.converter else {
            return 0;
        };
        converter.probe_duration(path).await.unwrap_or_else(|e| {
            tracing::debug!(path = %path.display(), error = %e, "duration probe failed");
            0
        })
    }
}

async fn audio_files(dir: &Path) -> std::io::Result<Vec<(String, PathBuf)>> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut files = Vec::new();

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let is_mp3 = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("mp3"));

        if is_mp3
            && entry.file_type().await?.is_file()
            && let Some(name) = entry.file_name().to_str()
        {
            files.push((name.to_string(), path));
        }
    }

    files.sort();
    Ok(files)
}

/// Fetches the published history and merges new episodes into it
pub struct ReconciliationEngine<'a> {
    repository: MetadataRepository<'a>,
    fallback: Option<FilesystemCatalog<'a>>,
}

impl<'a> ReconciliationEngine<'a> {
    pub fn new(store: &'a dyn ObjectStore) -> Self {
        Self {
            repository: MetadataRepository::new(store),
            fallback: None,
        }
    }

    /// Use `catalog` when the repository cannot be listed
    pub fn with_fallback(mut self, catalog: FilesystemCatalog<'a>) -> Self {
        self.fallback = Some(catalog);
        self
    }

    /// Merge `new_records` with everything previously published
    ///
    /// Never fails: when the repository is unreachable the fallback catalog
    /// is used, or only `new_records` when there is none.
    pub async fn run(&self, new_records: Vec<EpisodeRecord>) -> Reconciled {
        let (existing, degraded) = match self.repository.list_all().await {
            Ok(existing) => (existing, false),
            Err(e) => {
                tracing::warn!(error = %e, "cannot list episode metadata, feed may be incomplete");
                let existing = match &self.fallback {
                    Some(catalog) => catalog.scan(&self.repository).await,
                    None => Vec::new(),
                };
                (existing, true)
            }
        };

        let episodes = reconcile(new_records, existing);
        tracing::debug!(episodes = episodes.len(), degraded, "reconciled episodes");

        Reconciled { episodes, degraded }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::ConvertedAudio;
    use chrono::FixedOffset;
    use crate::error::ConversionError;
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use bytes::Bytes;
    use tempfile::tempdir;

    fn date(s: &str) -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339(s).unwrap()
    }

    fn make_record(filename: &str, date_str: &str) -> EpisodeRecord {
        EpisodeRecord {
            filename: filename.to_string(),
            title: format!("Title of {filename}"),
            description: String::new(),
            publish_date: date(date_str),
            size_bytes: 100,
            duration_ms: 1000,
        }
    }

    fn names(records: &[EpisodeRecord]) -> Vec<&str> {
        records.iter().map(|r| r.filename.as_str()).collect()
    }

    fn defaults() -> EpisodeDefaults {
        EpisodeDefaults {
            default_title: "Untitled Episode".to_string(),
            default_description: "No description".to_string(),
        }
    }

    fn utc() -> PublishTimezone {
        PublishTimezone::Fixed(FixedOffset::east_opt(0).unwrap())
    }

    struct FixedDuration(u64);

    #[async_trait]
    impl AudioConverter for FixedDuration {
        async fn convert(
            &self,
            _input: &Path,
            _output: &Path,
        ) -> Result<ConvertedAudio, ConversionError> {
            unreachable!("catalog only probes")
        }

        async fn probe_duration(&self, _path: &Path) -> Result<u64, ConversionError> {
            Ok(self.0)
        }
    }

    #[test]
    fn new_record_replaces_existing_and_sorts_newest_first() {
        let new = vec![make_record("b.mp3", "2024-02-01T00:00:00Z")];
        let existing = vec![
            make_record("a.mp3", "2024-01-01T00:00:00Z"),
            make_record("b.mp3", "2024-01-15T00:00:00Z"),
        ];

        let result = reconcile(new, existing);

        assert_eq!(names(&result), vec!["b.mp3", "a.mp3"]);
        assert_eq!(result[0].publish_date, date("2024-02-01T00:00:00Z"));
        assert_eq!(result[1].publish_date, date("2024-01-01T00:00:00Z"));
    }

    #[test]
    fn new_version_wins_even_when_older() {
        let new = vec![make_record("a.mp3", "2023-06-01T00:00:00Z")];
        let existing = vec![make_record("a.mp3", "2024-06-01T00:00:00Z")];

        let result = reconcile(new, existing);

        assert_eq!(result.len(), 1);
        assert_eq!(result[0].publish_date, date("2023-06-01T00:00:00Z"));
    }

    #[test]
    fn result_has_one_record_per_filename() {
        let new = vec![
            make_record("x.mp3", "2024-03-01T00:00:00Z"),
            make_record("y.mp3", "2024-03-02T00:00:00Z"),
            make_record("x.mp3", "2024-03-03T00:00:00Z"),
        ];
        let existing = vec![
            make_record("y.mp3", "2024-01-01T00:00:00Z"),
            make_record("z.mp3", "2024-01-02T00:00:00Z"),
            make_record("z.mp3", "2024-01-05T00:00:00Z"),
        ];

        let result = reconcile(new, existing);

        let distinct: HashSet<_> = result.iter().map(|r| r.filename.clone()).collect();
        assert_eq!(result.len(), 3);
        assert_eq!(distinct.len(), 3);

        // last processed duplicate wins among new records
        let x = result.iter().find(|r| r.filename == "x.mp3").unwrap();
        assert_eq!(x.publish_date, date("2024-03-03T00:00:00Z"));

        // first listed duplicate wins among existing records
        let z = result.iter().find(|r| r.filename == "z.mp3").unwrap();
        assert_eq!(z.publish_date, date("2024-01-02T00:00:00Z"));
    }

    #[test]
    fn result_is_sorted_descending() {
        let new = vec![
            make_record("n1.mp3", "2024-01-10T00:00:00Z"),
            make_record("n2.mp3", "2024-05-10T00:00:00Z"),
        ];
        let existing = vec![
            make_record("e1.mp3", "2024-03-10T00:00:00Z"),
            make_record("e2.mp3", "2023-12-31T23:59:59Z"),
            make_record("e3.mp3", "2024-07-01T00:00:00Z"),
        ];

        let result = reconcile(new, existing);

        assert!(
            result
                .windows(2)
                .all(|pair| pair[0].publish_date >= pair[1].publish_date)
        );
        assert_eq!(
            names(&result),
            vec!["e3.mp3", "n2.mp3", "e1.mp3", "n1.mp3", "e2.mp3"]
        );
    }

    #[test]
    fn ties_put_new_records_first() {
        let same = "2024-01-01T00:00:00Z";
        let new = vec![make_record("n.mp3", same)];
        let existing = vec![make_record("e1.mp3", same), make_record("e2.mp3", same)];

        assert_eq!(
            names(&reconcile(new, existing)),
            vec!["n.mp3", "e1.mp3", "e2.mp3"]
        );
    }

    #[test]
    fn reversing_tied_input_keeps_the_same_set() {
        let same = "2024-01-01T00:00:00Z";
        let existing = vec![make_record("e1.mp3", same), make_record("e2.mp3", same)];
        let reversed: Vec<_> = existing.iter().rev().cloned().collect();

        let mut forward: Vec<_> = reconcile(Vec::new(), existing)
            .into_iter()
            .map(|r| r.filename)
            .collect();
        let mut backward: Vec<_> = reconcile(Vec::new(), reversed)
            .into_iter()
            .map(|r| r.filename)
            .collect();
        forward.sort();
        backward.sort();

        assert_eq!(forward, backward);
    }

    #[test]
    fn empty_inputs_yield_empty_result() {
        assert!(reconcile(Vec::new(), Vec::new()).is_empty());
    }

    #[tokio::test]
    async fn engine_merges_with_repository() {
        let store = MemoryStore::new();
        let repo = MetadataRepository::new(&store);
        repo.put(&make_record("a.mp3", "2024-01-01T00:00:00Z"))
            .await
            .unwrap();
        repo.put(&make_record("b.mp3", "2024-01-15T00:00:00Z"))
            .await
            .unwrap();

        let engine = ReconciliationEngine::new(&store);
        let reconciled = engine
            .run(vec![make_record("b.mp3", "2024-02-01T00:00:00Z")])
            .await;

        assert!(!reconciled.degraded);
        assert_eq!(names(&reconciled.episodes), vec!["b.mp3", "a.mp3"]);
        assert_eq!(
            reconciled.episodes[0].publish_date,
            date("2024-02-01T00:00:00Z")
        );
    }

    #[tokio::test]
    async fn engine_skips_corrupt_records() {
        let store = MemoryStore::new();
        let repo = MetadataRepository::new(&store);
        repo.put(&make_record("a.mp3", "2024-01-01T00:00:00Z"))
            .await
            .unwrap();
        store
            .put(
                "assets/metadata/broken.json",
                Bytes::from_static(b"not json"),
                "application/json",
            )
            .await
            .unwrap();

        let reconciled = ReconciliationEngine::new(&store)
            .run(vec![make_record("c.mp3", "2024-03-01T00:00:00Z")])
            .await;

        assert!(!reconciled.degraded);
        assert_eq!(names(&reconciled.episodes), vec!["c.mp3", "a.mp3"]);
    }

    #[tokio::test]
    async fn unreachable_repository_degrades_to_new_records() {
        let store = MemoryStore::new();
        store.set_unavailable(true);

        let reconciled = ReconciliationEngine::new(&store)
            .run(vec![make_record("new.mp3", "2024-03-01T00:00:00Z")])
            .await;

        assert!(reconciled.degraded);
        assert_eq!(names(&reconciled.episodes), vec!["new.mp3"]);
    }

    #[tokio::test]
    async fn unreachable_repository_falls_back_to_filesystem() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("old.mp3"), b"0123456789").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"ignored").unwrap();
        std::fs::write(dir.path().join("new.mp3"), b"fresh").unwrap();

        let store = MemoryStore::new();
        store.set_unavailable(true);
        let converter = FixedDuration(42_000);
        let catalog = FilesystemCatalog::new(dir.path(), defaults(), utc())
            .with_converter(&converter);

        let reconciled = ReconciliationEngine::new(&store)
            .with_fallback(catalog)
            .run(vec![make_record("new.mp3", "2099-01-01T00:00:00Z")])
            .await;

        assert!(reconciled.degraded);
        assert_eq!(names(&reconciled.episodes), vec!["new.mp3", "old.mp3"]);

        let new = &reconciled.episodes[0];
        assert_eq!(new.title, "Title of new.mp3");

        let old = &reconciled.episodes[1];
        assert_eq!(old.title, "Untitled Episode");
        assert_eq!(old.description, "No description");
        assert_eq!(old.size_bytes, 10);
        assert_eq!(old.duration_ms, 42_000);
    }

    #[tokio::test]
    async fn catalog_prefers_stored_metadata() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("known.mp3"), b"audio").unwrap();

        let store = MemoryStore::new();
        let repo = MetadataRepository::new(&store);
        let stored = make_record("known.mp3", "2024-01-01T00:00:00Z");
        repo.put(&stored).await.unwrap();

        let catalog = FilesystemCatalog::new(dir.path(), defaults(), utc());
        let records = catalog.scan(&repo).await;

        assert_eq!(records, vec![stored]);
    }

    #[tokio::test]
    async fn catalog_of_missing_directory_is_empty() {
        let dir = tempdir().unwrap();
        let store = MemoryStore::new();
        let repo = MetadataRepository::new(&store);

        let catalog = FilesystemCatalog::new(
            dir.path().join("missing"),
            defaults(),
            utc(),
        );

        assert!(catalog.scan(&repo).await.is_empty());
    }

    #[tokio::test]
    async fn catalog_replaces_corrupt_record_with_placeholder() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("bad.mp3"), b"1234567").unwrap();

        let store = MemoryStore::new();
        store
            .put(
                "assets/metadata/bad.json",
                Bytes::from_static(b"{\"filename\": "),
                "application/json",
            )
            .await
            .unwrap();
        let repo = MetadataRepository::new(&store);

        let berlin = PublishTimezone::parse("Europe/Berlin").unwrap();
        let converter = FixedDuration(5_000);
        let catalog = FilesystemCatalog::new(dir.path(), defaults(), berlin)
            .with_converter(&converter);
        let records = catalog.scan(&repo).await;

        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.filename, "bad.mp3");
        assert_eq!(record.title, "Untitled Episode");
        assert_eq!(record.description, "No description");
        assert_eq!(record.size_bytes, 7);
        assert_eq!(record.duration_ms, 5_000);

        let modified = DateTime::<Utc>::from(
            std::fs::metadata(dir.path().join("bad.mp3"))
                .unwrap()
                .modified()
                .unwrap(),
        );
        assert_eq!(record.publish_date, berlin.localize(modified));
        assert!(
            [3600, 7200].contains(&record.publish_date.offset().local_minus_utc()),
            "dated in Berlin time"
        );
    }
}
