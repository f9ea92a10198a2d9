use std::sync::Arc;

/// Events emitted during a publish run for progress reporting
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// A source file is being converted and uploaded
    ProcessingEpisode {
        source: String,
        /// Index of this file in the run
        index: usize,
        /// Number of source files in the run
        total: usize,
    },

    /// An episode was converted, uploaded and recorded
    EpisodePublished {
        filename: String,
        size_bytes: u64,
        duration_ms: u64,
    },

    /// An episode was skipped; its source stays where it was
    EpisodeFailed { source: String, error: String },

    /// New episodes were merged with the published history
    Reconciled {
        total_episodes: usize,
        /// History came from a fallback source
        degraded: bool,
    },

    /// An artifact's content changed and was uploaded
    ArtifactUploaded { key: String },

    /// An artifact already matched the stored copy
    ArtifactUnchanged { key: String },

    /// The feed document was rendered and written locally
    FeedRendered { episode_count: usize },

    /// Cache invalidation was requested for the changed paths
    InvalidationRequested {
        invalidation_id: String,
        path_count: usize,
    },

    /// Publish run completed
    RunCompleted {
        published_count: usize,
        failed_count: usize,
        uploaded_count: usize,
    },
}

/// Trait for reporting progress events during a publish run.
///
/// Implementations can use this to display spinners, log messages,
/// or collect statistics.
pub trait ProgressReporter: Send + Sync {
    /// Report a progress event
    fn report(&self, event: ProgressEvent);
}

/// A shared reference to a progress reporter
pub type SharedProgressReporter = Arc<dyn ProgressReporter>;

/// A no-op progress reporter that silently ignores all events.
/// Useful for tests or quiet mode.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopReporter;

impl ProgressReporter for NoopReporter {
    fn report(&self, _event: ProgressEvent) {
        // Intentionally empty
    }
}

impl NoopReporter {
    /// Create a new NoopReporter wrapped in an Arc
    pub fn shared() -> SharedProgressReporter {
        Arc::new(Self)
    }
}
