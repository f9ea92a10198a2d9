pub mod cdn;
pub mod config;
pub mod convert;
pub mod episode;
pub mod error;
pub mod feed;
pub mod metadata;
pub mod pipeline;
pub mod progress;
pub mod publish;
pub mod reconcile;
pub mod store;

// Re-export main types for convenience
pub use cdn::{CacheInvalidator, HttpPurgeInvalidator};
#[cfg(feature = "s3")]
pub use cdn::{CloudFrontInvalidator, DistributionTarget};
pub use config::{
    CdnSettings, Config, DEFAULT_CONFIG_FILE, PublishTimezone, StorageSettings, load_config,
};
pub use convert::{AudioConverter, AudioSettings, ConvertedAudio, FfmpegConverter};
pub use episode::{EpisodeDefaults, EpisodeRecord, sanitize_filename, stem_of};
pub use error::{
    ArtifactError, ConfigError, ConversionError, EpisodeError, FeedError, InvalidationError,
    MetadataError, PublishError, StoreError,
};
pub use feed::{ChannelDescriptor, FeedLinks, format_duration, render_feed};
pub use metadata::MetadataRepository;
pub use pipeline::{PublishContext, RunOptions, RunReport, discover_sources, process_run};
pub use progress::{NoopReporter, ProgressEvent, ProgressReporter, SharedProgressReporter};
pub use publish::{Artifact, PublishCoordinator, PublishManifest, PublishOutcome};
pub use reconcile::{FilesystemCatalog, Reconciled, ReconciliationEngine, reconcile};
pub use store::{Fingerprint, ListPage, LocalStore, MemoryStore, ObjectStore};
