mod artifact;
mod coordinator;

pub use artifact::{Artifact, ArtifactKind, ArtifactSource, artwork_key, audio_key, public_url};
pub use coordinator::{PublishCoordinator, PublishManifest, PublishOutcome};
