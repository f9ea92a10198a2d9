// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::{Path, PathBuf};

use bytes::Bytes;
use url::Url;

use crate::error::ArtifactError;

const EPISODES_PREFIX: &str = "episodes/";
const ASSETS_PREFIX: &str = "assets/";

/// Storage key of an episode's audio file
pub fn audio_key(filename: &str) -> String {
    format!("{}{}", EPISODES_PREFIX, filename)
}

/// Storage key of the channel artwork
pub fn artwork_key(name: &str) -> String {
    format!("{}{}", ASSETS_PREFIX, name)
}

/// Public URL of a stored object, given the base URL the store is served from
pub fn public_url(base: &Url, key: &str) -> String {
    format!("{}/{}", base.as_str().trim_end_matches('/'), key)
}

/// What an artifact is, which decides its content type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    Artwork,
    Audio,
    Feed,
}

/// Where the content of an artifact comes from
#[derive(Debug, Clone)]
pub enum ArtifactSource {
    File(PathBuf),
    Bytes(Bytes),
}

/// A single file to publish under a storage key
#[derive(Debug, Clone)]
pub struct Artifact {
    pub key: String,
    pub kind: ArtifactKind,
    pub source: ArtifactSource,
}

impl Artifact {
    pub fn artwork(name: &str, path: impl Into<PathBuf>) -> Self {
        Self {
            key: artwork_key(name),
            kind: ArtifactKind::Artwork,
            source: ArtifactSource::File(path.into()),
        }
    }

    pub fn audio(filename: &str, data: Bytes) -> Self {
        Self {
            key: audio_key(filename),
            kind: ArtifactKind::Audio,
            source: ArtifactSource::Bytes(data),
        }
    }

    pub fn feed(key: &str, document: impl Into<Bytes>) -> Self {
        Self {
            key: key.to_string(),
            kind: ArtifactKind::Feed,
            source: ArtifactSource::Bytes(document.into()),
        }
    }

    /// Content type to upload the artifact with
    pub fn content_type(&self) -> &'static str {
        match self.kind {
            ArtifactKind::Feed => "application/rss+xml",
            ArtifactKind::Artwork | ArtifactKind::Audio => content_type_for(&self.key),
        }
    }

    /// Load the artifact's content
    pub async fn load(&self) -> Result<Bytes, ArtifactError> {
        match &self.source {
            ArtifactSource::Bytes(data) => Ok(data.clone()),
            ArtifactSource::File(path) => tokio::fs::read(path)
                .await
                .map(Bytes::from)
                .map_err(|e| ArtifactError::ReadFailed {
                    path: path.clone(),
                    source: e,
                }),
        }
    }
}

/// Map a file extension to the content type objects are served with
fn content_type_for(key: &str) -> &'static str {
    let ext = Path::new(key)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());

    match ext.as_deref() {
        Some("mp3") => "audio/mpeg",
        Some("m4a") => "audio/mp4",
        Some("aac") => "audio/aac",
        Some("ogg") => "audio/ogg",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("xml") => "application/xml",
        Some("json") => "application/json",
        _ => "application/octet-stream",
    }
}
