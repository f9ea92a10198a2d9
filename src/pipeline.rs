// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::{Path, PathBuf};

use crate::cdn::CacheInvalidator;
use crate::config::{Config, PublishTimezone};
use crate::convert::{AudioConverter, ConvertedAudio};
use crate::episode::{EpisodeRecord, sanitize_filename, stem_of};
use crate::error::{EpisodeError, PublishError};
use crate::feed::{FeedLinks, render_feed};
use crate::metadata::MetadataRepository;
use crate::progress::{ProgressEvent, SharedProgressReporter};
use crate::publish::{Artifact, PublishCoordinator, PublishManifest, PublishOutcome, public_url};
use crate::reconcile::{FilesystemCatalog, ReconciliationEngine};
use crate::store::ObjectStore;

/// Collaborators of a publish run
pub struct PublishContext<'a> {
    pub config: &'a Config,
    pub store: &'a dyn ObjectStore,
    pub converter: &'a dyn AudioConverter,
    /// `None` skips cache invalidation
    pub invalidator: Option<&'a dyn CacheInvalidator>,
    pub reporter: SharedProgressReporter,
}

/// Per-run overrides of the configured episode defaults
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub title: Option<String>,
    pub description: Option<String>,
}

/// Result of a publish run
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    /// Filenames of the episodes published in this run
    pub episodes_published: Vec<String>,
    /// Source files that were skipped (source name, error message)
    pub episodes_failed: Vec<(String, String)>,
    /// Number of episodes in the rendered feed
    pub total_episodes: usize,
    /// Local copy of the rendered feed
    pub feed_path: PathBuf,
    /// The feed differed from the stored copy and was uploaded
    pub feed_uploaded: bool,
    /// Every path whose content changed in this run
    pub changed_paths: Vec<String>,
    /// Paths the CDN accepted an invalidation request for
    pub invalidated_paths: Vec<String>,
    pub invalidation_id: Option<String>,
    /// Episode history came from the filesystem fallback
    pub degraded: bool,
}

/// Publish `sources` and bring the feed up to date
///
/// This is the main entry point for the library. It:
/// 1. Validates the configuration
/// 2. Converts and uploads each source file, recording its metadata
/// 3. Merges the new episodes with the published history
/// 4. Uploads the artwork and the rendered feed if they changed
/// 5. Invalidates the CDN cache for everything that changed
///
/// Failures of single episodes, metadata writes, artwork and invalidation
/// are reported and the run continues. Only configuration errors, feed
/// rendering errors and local directory errors abort it.
pub async fn process_run(
    ctx: &PublishContext<'_>,
    sources: &[PathBuf],
    options: &RunOptions,
) -> Result<RunReport, PublishError> {
    let config = ctx.config;
    config.validate()?;
    let timezone = config.system.publish_timezone()?;

    let dirs = &config.directories;
    for dir in [&dirs.published, &dirs.processed, &dirs.feed] {
        ensure_dir(dir).await?;
    }

    let coordinator = PublishCoordinator::new(ctx.store);
    let repository = MetadataRepository::new(ctx.store);
    let mut manifest = PublishManifest::default();
    let mut report = RunReport::default();
    let mut new_records = Vec::with_capacity(sources.len());

    for (index, source) in sources.iter().enumerate() {
        let source_name = display_name(source);
        ctx.reporter.report(ProgressEvent::ProcessingEpisode {
            source: source_name.clone(),
            index,
            total: sources.len(),
        });

        let result = publish_episode(
            ctx,
            &coordinator,
            &repository,
            &mut manifest,
            source,
            options,
            timezone,
        )
        .await;

        match result {
            Ok(record) => {
                ctx.reporter.report(ProgressEvent::EpisodePublished {
                    filename: record.filename.clone(),
                    size_bytes: record.size_bytes,
                    duration_ms: record.duration_ms,
                });
                report.episodes_published.push(record.filename.clone());
                new_records.push(record);
            }
            Err(e) => {
                tracing::warn!(source = %source.display(), error = %e, "skipping episode");
                ctx.reporter.report(ProgressEvent::EpisodeFailed {
                    source: source_name.clone(),
                    error: e.to_string(),
                });
                report.episodes_failed.push((source_name, e.to_string()));
            }
        }
    }

    let catalog = FilesystemCatalog::new(&dirs.published, config.episode.clone(), timezone)
        .with_converter(ctx.converter);
    let reconciled = ReconciliationEngine::new(ctx.store)
        .with_fallback(catalog)
        .run(new_records)
        .await;

    report.total_episodes = reconciled.episodes.len();
    report.degraded = reconciled.degraded;
    ctx.reporter.report(ProgressEvent::Reconciled {
        total_episodes: reconciled.episodes.len(),
        degraded: reconciled.degraded,
    });

    let links = FeedLinks {
        media_base: config.feed.base_url.clone(),
        artwork_url: publish_artwork(ctx, &coordinator, &mut manifest).await,
    };

    let document = render_feed(&config.podcast, &reconciled.episodes, &links)?;

    let feed_path = dirs.feed.join(&config.feed.filename);
    if let Some(parent) = feed_path.parent() {
        ensure_dir(parent).await?;
    }
    tokio::fs::write(&feed_path, document.as_bytes())
        .await
        .map_err(|e| PublishError::FeedWriteFailed {
            path: feed_path.clone(),
            source: e,
        })?;
    report.feed_path = feed_path;
    ctx.reporter.report(ProgressEvent::FeedRendered {
        episode_count: reconciled.episodes.len(),
    });

    let feed = Artifact::feed(&config.feed.filename, document);
    match coordinator.publish(&mut manifest, &feed).await {
        Ok(outcome) => {
            report.feed_uploaded = outcome.was_uploaded();
            report_outcome(&ctx.reporter, &feed.key, &outcome);
        }
        Err(e) => tracing::warn!(key = %feed.key, error = %e, "feed upload failed"),
    }

    report.changed_paths = manifest.paths();
    match ctx.invalidator {
        Some(invalidator) => {
            if let Some(id) = coordinator.invalidate(&manifest, invalidator).await {
                ctx.reporter.report(ProgressEvent::InvalidationRequested {
                    invalidation_id: id.clone(),
                    path_count: manifest.len(),
                });
                report.invalidated_paths = manifest.paths();
                report.invalidation_id = Some(id);
            }
        }
        None if !manifest.is_empty() => {
            tracing::info!(paths = manifest.len(), "no CDN configured, skipping invalidation");
        }
        None => {}
    }

    ctx.reporter.report(ProgressEvent::RunCompleted {
        published_count: report.episodes_published.len(),
        failed_count: report.episodes_failed.len(),
        uploaded_count: report.changed_paths.len(),
    });

    Ok(report)
}

/// Convert, upload and record a single source file
///
/// The source is moved to the processed directory only after its audio is
/// stored, so a failed upload is retried by the next run. Converted audio is
/// staged as `{stem}.mp3.partial` and only lands in the published directory
/// once stored.
async fn publish_episode(
    ctx: &PublishContext<'_>,
    coordinator: &PublishCoordinator<'_>,
    repository: &MetadataRepository<'_>,
    manifest: &mut PublishManifest,
    source: &Path,
    options: &RunOptions,
    timezone: PublishTimezone,
) -> Result<EpisodeRecord, EpisodeError> {
    let config = ctx.config;
    let sanitized = sanitize_filename(&display_name(source));
    let filename = format!("{}.mp3", stem_of(&sanitized));
    let published = config.directories.published.join(&filename);
    let staging = config
        .directories
        .published
        .join(format!("{}.partial", filename));

    let audio = match stage_and_upload(ctx, coordinator, manifest, source, &staging, &filename)
        .await
    {
        Ok(audio) => audio,
        Err(e) => {
            let _ = tokio::fs::remove_file(&staging).await;
            return Err(e);
        }
    };

    if let Err(e) = tokio::fs::rename(&staging, &published).await {
        tracing::warn!(
            path = %published.display(),
            error = %e,
            "failed to finalize published audio"
        );
    }

    let record = EpisodeRecord {
        filename,
        title: options
            .title
            .clone()
            .unwrap_or_else(|| config.episode.default_title.clone()),
        description: options
            .description
            .clone()
            .unwrap_or_else(|| config.episode.default_description.clone()),
        publish_date: timezone.now(),
        size_bytes: audio.size_bytes,
        duration_ms: audio.duration_ms,
    };

    if let Err(e) = repository.put(&record).await {
        tracing::warn!(filename = %record.filename, error = %e, "failed to save episode metadata");
    }

    let processed = config.directories.processed.join(&sanitized);
    if let Err(e) = move_file(source, &processed).await {
        tracing::warn!(
            source = %source.display(),
            target = %processed.display(),
            error = %e,
            "failed to move processed source"
        );
    }

    Ok(record)
}

/// Convert `source` into `staging` and upload the result
async fn stage_and_upload(
    ctx: &PublishContext<'_>,
    coordinator: &PublishCoordinator<'_>,
    manifest: &mut PublishManifest,
    source: &Path,
    staging: &Path,
    filename: &str,
) -> Result<ConvertedAudio, EpisodeError> {
    let audio = ctx.converter.convert(source, staging).await?;

    let artifact = Artifact::audio(filename, audio.bytes.clone());
    let outcome = coordinator.publish(manifest, &artifact).await?;
    report_outcome(&ctx.reporter, &artifact.key, &outcome);

    Ok(audio)
}

/// Upload the configured artwork, returning its public URL
async fn publish_artwork(
    ctx: &PublishContext<'_>,
    coordinator: &PublishCoordinator<'_>,
    manifest: &mut PublishManifest,
) -> Option<String> {
    let name = ctx.config.feed.artwork.as_deref()?;
    let path = ctx.config.directories.assets.join(name);

    if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
        tracing::warn!(path = %path.display(), "artwork not found, feed will have no image");
        return None;
    }

    let artifact = Artifact::artwork(name, path);
    match coordinator.publish(manifest, &artifact).await {
        Ok(outcome) => {
            report_outcome(&ctx.reporter, &artifact.key, &outcome);
            Some(public_url(&ctx.config.feed.base_url, &artifact.key))
        }
        Err(e) => {
            tracing::warn!(key = %artifact.key, error = %e, "artwork upload failed");
            None
        }
    }
}

fn report_outcome(reporter: &SharedProgressReporter, key: &str, outcome: &PublishOutcome) {
    let key = key.to_string();
    reporter.report(match outcome {
        PublishOutcome::Uploaded(_) => ProgressEvent::ArtifactUploaded { key },
        PublishOutcome::Unchanged(_) => ProgressEvent::ArtifactUnchanged { key },
    });
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

async fn ensure_dir(dir: &Path) -> Result<(), PublishError> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| PublishError::DirectoryFailed {
            path: dir.to_path_buf(),
            source: e,
        })
}

/// Move a file, copying across filesystems when a rename is not possible
async fn move_file(from: &Path, to: &Path) -> std::io::Result<()> {
    if tokio::fs::rename(from, to).await.is_ok() {
        return Ok(());
    }
    tokio::fs::copy(from, to).await?;
    tokio::fs::remove_file(from).await
}

/// Source files waiting in the incoming directory, sorted by name
///
/// Hidden files and subdirectories are ignored. The directory is created
/// when it does not exist yet.
pub async fn discover_sources(dir: &Path) -> Result<Vec<PathBuf>, PublishError> {
    ensure_dir(dir).await?;

    let read_failed = |e| PublishError::DirectoryFailed {
        path: dir.to_path_buf(),
        source: e,
    };

    let mut entries = tokio::fs::read_dir(dir).await.map_err(read_failed)?;
    let mut sources = Vec::new();

    while let Some(entry) = entries.next_entry().await.map_err(read_failed)? {
        let hidden = entry.file_name().to_string_lossy().starts_with('.');
        if !hidden && entry.file_type().await.map_err(read_failed)?.is_file() {
            sources.push(entry.path());
        }
    }

    sources.sort();
    Ok(sources)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CdnSettings, Directories, FeedSettings, StorageSettings, SystemSettings};
    use crate::convert::{AudioSettings, ConvertedAudio};
    use crate::episode::EpisodeDefaults;
    use crate::error::{ConversionError, InvalidationError};
    use crate::feed::ChannelDescriptor;
    use crate::progress::NoopReporter;
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use bytes::Bytes;
    use std::sync::Mutex;
    use tempfile::{TempDir, tempdir};
    use url::Url;

    /// Copies the input and reports a fixed duration; `.bad` inputs fail
    struct CopyConverter;

    #[async_trait]
    impl AudioConverter for CopyConverter {
        async fn convert(
            &self,
            input: &Path,
            output: &Path,
        ) -> Result<ConvertedAudio, ConversionError> {
            if input.extension().is_some_and(|ext| ext == "bad") {
                return Err(ConversionError::ToolFailed {
                    tool: "ffmpeg",
                    path: input.to_path_buf(),
                    stderr: "Invalid data found when processing input".to_string(),
                });
            }

            let data = tokio::fs::read(input)
                .await
                .map_err(|e| ConversionError::ReadFailed {
                    path: input.to_path_buf(),
                    source: e,
                })?;
            tokio::fs::write(output, &data)
                .await
                .map_err(|e| ConversionError::WriteFailed {
                    path: output.to_path_buf(),
                    source: e,
                })?;

            Ok(ConvertedAudio {
                size_bytes: data.len() as u64,
                bytes: Bytes::from(data),
                duration_ms: 90_000,
            })
        }

        async fn probe_duration(&self, _path: &Path) -> Result<u64, ConversionError> {
            Ok(90_000)
        }
    }

    #[derive(Default)]
    struct RecordingInvalidator {
        calls: Mutex<Vec<Vec<String>>>,
    }

    #[async_trait]
    impl CacheInvalidator for RecordingInvalidator {
        async fn invalidate(&self, paths: &[String]) -> Result<String, InvalidationError> {
            let mut calls = self.calls.lock().unwrap();
            calls.push(paths.to_vec());
            Ok(format!("inv-{}", calls.len()))
        }
    }

    fn make_config(root: &Path) -> Config {
        Config {
            podcast: ChannelDescriptor {
                title: "Test Podcast".to_string(),
                description: "A podcast for tests".to_string(),
                author: "Test Author".to_string(),
                email: Some("author@example.com".to_string()),
                language: "en".to_string(),
                copyright: None,
                website: "https://example.com".to_string(),
                explicit: false,
                category: None,
            },
            feed: FeedSettings {
                filename: "feed.xml".to_string(),
                artwork: Some("artwork.png".to_string()),
                base_url: Url::parse("https://cdn.example.com").unwrap(),
            },
            episode: EpisodeDefaults {
                default_title: "New Episode".to_string(),
                default_description: "Fresh audio".to_string(),
            },
            audio: AudioSettings::default(),
            directories: Directories {
                assets: root.join("assets"),
                episodes: root.join("episodes"),
                published: root.join("published"),
                processed: root.join("processed"),
                feed: root.join("feed"),
            },
            storage: StorageSettings::Local {
                root: root.join("bucket"),
            },
            cdn: CdnSettings::default(),
            system: SystemSettings::default(),
        }
    }

    fn setup() -> (TempDir, Config) {
        let dir = tempdir().unwrap();
        let config = make_config(dir.path());
        std::fs::create_dir_all(&config.directories.assets).unwrap();
        std::fs::create_dir_all(&config.directories.episodes).unwrap();
        std::fs::write(config.directories.assets.join("artwork.png"), b"png").unwrap();
        (dir, config)
    }

    fn add_source(config: &Config, name: &str, content: &[u8]) -> PathBuf {
        let path = config.directories.episodes.join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    fn context<'a>(
        config: &'a Config,
        store: &'a MemoryStore,
        invalidator: Option<&'a dyn CacheInvalidator>,
    ) -> PublishContext<'a> {
        PublishContext {
            config,
            store,
            converter: &CopyConverter,
            invalidator,
            reporter: NoopReporter::shared(),
        }
    }

    #[tokio::test]
    async fn publishes_episode_artwork_and_feed() {
        let (_dir, config) = setup();
        let source = add_source(&config, "My First Episode.wav", b"audio-1");
        let store = MemoryStore::new();
        let invalidator = RecordingInvalidator::default();
        let ctx = context(&config, &store, Some(&invalidator));

        let options = RunOptions {
            title: Some("Pilot".to_string()),
            description: None,
        };
        let report = process_run(&ctx, &[source.clone()], &options)
            .await
            .unwrap();

        assert_eq!(report.episodes_published, vec!["my_first_episode.mp3"]);
        assert!(report.episodes_failed.is_empty());
        assert_eq!(report.total_episodes, 1);
        assert!(report.feed_uploaded);
        assert!(!report.degraded);
        assert_eq!(
            report.changed_paths,
            vec![
                "/assets/artwork.png",
                "/episodes/my_first_episode.mp3",
                "/feed.xml"
            ]
        );
        assert_eq!(report.invalidated_paths, report.changed_paths);
        assert_eq!(report.invalidation_id.as_deref(), Some("inv-1"));

        let keys = store.keys();
        assert!(keys.contains(&"assets/metadata/my_first_episode.json".to_string()));
        assert!(keys.contains(&"episodes/my_first_episode.mp3".to_string()));

        let record = MetadataRepository::new(&store)
            .get("my_first_episode.mp3")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.title, "Pilot");
        assert_eq!(record.description, "Fresh audio");
        assert_eq!(record.size_bytes, 7);
        assert_eq!(record.duration_ms, 90_000);

        assert!(!source.exists());
        assert!(
            config
                .directories
                .processed
                .join("my_first_episode.wav")
                .exists()
        );
        let published = &config.directories.published;
        assert!(published.join("my_first_episode.mp3").exists());
        assert!(!published.join("my_first_episode.mp3.partial").exists());

        let feed = std::fs::read_to_string(&report.feed_path).unwrap();
        assert!(feed.contains("https://cdn.example.com/episodes/my_first_episode.mp3"));
        assert!(feed.contains("https://cdn.example.com/assets/artwork.png"));
        assert_eq!(
            &store.get("feed.xml").await.unwrap()[..],
            feed.as_bytes()
        );
    }

    #[tokio::test]
    async fn second_run_without_changes_uploads_nothing() {
        let (_dir, config) = setup();
        let source = add_source(&config, "episode.mp3", b"audio");
        let store = MemoryStore::new();
        let invalidator = RecordingInvalidator::default();
        let ctx = context(&config, &store, Some(&invalidator));

        process_run(&ctx, &[source], &RunOptions::default())
            .await
            .unwrap();
        let puts_after_first = store.put_count();

        let report = process_run(&ctx, &[], &RunOptions::default())
            .await
            .unwrap();

        assert_eq!(store.put_count(), puts_after_first);
        assert!(!report.feed_uploaded);
        assert!(report.changed_paths.is_empty());
        assert_eq!(report.invalidation_id, None);
        assert_eq!(report.total_episodes, 1);
        assert_eq!(invalidator.calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn new_episode_is_merged_with_history() {
        let (_dir, config) = setup();
        let store = MemoryStore::new();
        let ctx = context(&config, &store, None);

        let first = add_source(&config, "one.mp3", b"first");
        process_run(&ctx, &[first], &RunOptions::default())
            .await
            .unwrap();

        let second = add_source(&config, "two.mp3", b"second");
        let report = process_run(&ctx, &[second], &RunOptions::default())
            .await
            .unwrap();

        assert_eq!(report.total_episodes, 2);
        assert!(report.feed_uploaded);
        assert!(report.invalidated_paths.is_empty());
        assert_eq!(
            report.changed_paths,
            vec!["/episodes/two.mp3", "/feed.xml"]
        );

        let feed = std::fs::read_to_string(&report.feed_path).unwrap();
        let two = feed.find("episodes/two.mp3").unwrap();
        let one = feed.find("episodes/one.mp3").unwrap();
        assert!(two < one, "newest episode must come first");
    }

    #[tokio::test]
    async fn conversion_failure_skips_episode() {
        let (_dir, config) = setup();
        let broken = add_source(&config, "broken.bad", b"???");
        let good = add_source(&config, "good.mp3", b"audio");
        let store = MemoryStore::new();
        let ctx = context(&config, &store, None);

        let report = process_run(&ctx, &[broken.clone(), good], &RunOptions::default())
            .await
            .unwrap();

        assert_eq!(report.episodes_published, vec!["good.mp3"]);
        assert_eq!(report.episodes_failed.len(), 1);
        assert_eq!(report.episodes_failed[0].0, "broken.bad");
        assert_eq!(report.total_episodes, 1);
        assert!(broken.exists());
    }

    #[tokio::test]
    async fn failed_upload_keeps_episode_out_of_feed() {
        let (_dir, config) = setup();
        let source = add_source(&config, "stuck.mp3", b"audio");
        let store = MemoryStore::new();
        store.fail_key("episodes/stuck.mp3");
        let ctx = context(&config, &store, None);

        let report = process_run(&ctx, &[source.clone()], &RunOptions::default())
            .await
            .unwrap();

        assert!(report.episodes_published.is_empty());
        assert_eq!(report.episodes_failed.len(), 1);
        assert_eq!(report.total_episodes, 0);
        assert!(source.exists(), "source must stay for the next run");
        assert!(
            !store
                .keys()
                .contains(&"assets/metadata/stuck.json".to_string())
        );
    }

    #[tokio::test]
    async fn failed_upload_leaves_nothing_for_the_fallback_catalog() {
        let (_dir, config) = setup();
        let source = add_source(&config, "stuck.mp3", b"audio");
        let store = MemoryStore::new();
        store.fail_key("episodes/stuck.mp3");
        store.fail_key("assets/metadata/");
        let ctx = context(&config, &store, None);

        let first = process_run(&ctx, &[source.clone()], &RunOptions::default())
            .await
            .unwrap();
        assert_eq!(first.episodes_failed.len(), 1);
        assert!(first.degraded);
        assert_eq!(first.total_episodes, 0);

        let published = &config.directories.published;
        assert!(!published.join("stuck.mp3").exists());
        assert!(!published.join("stuck.mp3.partial").exists());
        assert!(source.exists());

        let second = process_run(&ctx, &[], &RunOptions::default())
            .await
            .unwrap();

        assert!(second.degraded);
        assert_eq!(second.total_episodes, 0);
        let feed = std::fs::read_to_string(&second.feed_path).unwrap();
        assert!(!feed.contains("stuck.mp3"));
        let stored = store.get("feed.xml").await.unwrap();
        assert!(!String::from_utf8_lossy(&stored).contains("stuck.mp3"));
    }

    #[tokio::test]
    async fn failed_metadata_write_keeps_episode_in_feed() {
        let (_dir, config) = setup();
        let source = add_source(&config, "ep.mp3", b"audio");
        let store = MemoryStore::new();
        store.fail_key("assets/metadata/ep.json");
        let ctx = context(&config, &store, None);

        let report = process_run(&ctx, &[source.clone()], &RunOptions::default())
            .await
            .unwrap();

        assert_eq!(report.episodes_published, vec!["ep.mp3"]);
        assert!(report.episodes_failed.is_empty());
        assert_eq!(report.total_episodes, 1);
        assert!(!report.degraded);
        assert!(store.keys().contains(&"episodes/ep.mp3".to_string()));
        assert!(!store.keys().contains(&"assets/metadata/ep.json".to_string()));
        assert!(!source.exists());

        let feed = std::fs::read_to_string(&report.feed_path).unwrap();
        assert!(feed.contains("https://cdn.example.com/episodes/ep.mp3"));
    }

    #[tokio::test]
    async fn missing_artwork_renders_feed_without_image() {
        let (_dir, config) = setup();
        std::fs::remove_file(config.directories.assets.join("artwork.png")).unwrap();
        let store = MemoryStore::new();
        let ctx = context(&config, &store, None);

        let report = process_run(&ctx, &[], &RunOptions::default())
            .await
            .unwrap();

        assert_eq!(report.total_episodes, 0);
        assert_eq!(report.changed_paths, vec!["/feed.xml"]);
        let feed = std::fs::read_to_string(&report.feed_path).unwrap();
        assert!(!feed.contains("artwork.png"));
    }

    #[tokio::test]
    async fn invalid_channel_fails_before_any_io() {
        let (_dir, mut config) = setup();
        config.podcast.title = "   ".to_string();
        let source = add_source(&config, "episode.mp3", b"audio");
        let store = MemoryStore::new();
        let ctx = context(&config, &store, None);

        let result = process_run(&ctx, &[source.clone()], &RunOptions::default()).await;

        assert!(matches!(result, Err(PublishError::Config(_))));
        assert_eq!(store.put_count(), 0);
        assert!(source.exists());
        assert!(!config.directories.published.exists());
    }

    #[tokio::test]
    async fn unreachable_store_still_renders_local_feed() {
        let (_dir, config) = setup();
        let store = MemoryStore::new();
        let ctx = context(&config, &store, None);

        let first = add_source(&config, "kept.mp3", b"audio");
        process_run(&ctx, &[first], &RunOptions::default())
            .await
            .unwrap();

        store.set_unavailable(true);
        let report = process_run(&ctx, &[], &RunOptions::default())
            .await
            .unwrap();

        assert!(report.degraded);
        assert_eq!(report.total_episodes, 1);
        assert!(!report.feed_uploaded);
        let feed = std::fs::read_to_string(&report.feed_path).unwrap();
        assert!(feed.contains("episodes/kept.mp3"));
    }

    #[tokio::test]
    async fn discover_sources_lists_visible_files_sorted() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("b.wav"), b"").unwrap();
        std::fs::write(dir.path().join("a.mp3"), b"").unwrap();
        std::fs::write(dir.path().join(".DS_Store"), b"").unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();

        let sources = discover_sources(dir.path()).await.unwrap();

        assert_eq!(
            sources,
            vec![dir.path().join("a.mp3"), dir.path().join("b.wav")]
        );
    }

    #[tokio::test]
    async fn discover_sources_creates_missing_directory() {
        let dir = tempdir().unwrap();
        let incoming = dir.path().join("incoming");

        assert!(discover_sources(&incoming).await.unwrap().is_empty());
        assert!(incoming.is_dir());
    }
}
