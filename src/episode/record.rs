// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

/// Metadata of one published episode
///
/// Records are never patched: processing a file with the same name again
/// produces a new record that replaces the old one wholesale. The JSON keys
/// (`date`, `size`, `duration`) match the layout already present in existing
/// buckets; the longer field names are accepted when reading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpisodeRecord {
    pub filename: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "date", alias = "publish_date")]
    pub publish_date: DateTime<FixedOffset>,
    #[serde(rename = "size", alias = "size_bytes", default)]
    pub size_bytes: u64,
    #[serde(rename = "duration", alias = "duration_ms", default)]
    pub duration_ms: u64,
}

/// Title and description applied when nothing better is known
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct EpisodeDefaults {
    pub default_title: String,
    #[serde(default)]
    pub default_description: String,
}

impl EpisodeRecord {
    /// Minimal stand-in for an episode whose stored metadata is unusable
    pub fn placeholder(
        filename: &str,
        defaults: &EpisodeDefaults,
        publish_date: DateTime<FixedOffset>,
    ) -> Self {
        Self {
            filename: filename.to_string(),
            title: defaults.default_title.clone(),
            description: defaults.default_description.clone(),
            publish_date,
            size_bytes: 0,
            duration_ms: 0,
        }
    }
}
