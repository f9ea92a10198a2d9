// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use serde::Deserialize;
use url::Url;

use crate::error::FeedError;

/// Channel-level feed metadata, read from the `[podcast]` config section
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ChannelDescriptor {
    pub title: String,
    pub description: String,
    pub author: String,
    #[serde(default)]
    pub email: Option<String>,
    pub language: String,
    #[serde(default)]
    pub copyright: Option<String>,
    pub website: String,
    #[serde(default)]
    pub explicit: bool,
    #[serde(default)]
    pub category: Option<String>,
}

impl ChannelDescriptor {
    /// Check required fields, returning the parsed website link
    pub fn validate(&self) -> Result<Url, FeedError> {
        let required = [
            ("title", &self.title),
            ("description", &self.description),
            ("author", &self.author),
            ("language", &self.language),
            ("website", &self.website),
        ];

        if let Some(&(field, _)) = required.iter().find(|(_, value)| value.trim().is_empty()) {
            return Err(FeedError::MissingField(field));
        }

        Url::parse(&self.website).map_err(|e| FeedError::InvalidUrl {
            field: "website",
            source: e,
        })
    }

    /// `email (name)` as used by `managingEditor`, when an email is configured
    pub fn managing_editor(&self) -> Option<String> {
        self.email
            .as_deref()
            .filter(|email| !email.trim().is_empty())
            .map(|email| format!("{} ({})", email, self.author))
    }
}
