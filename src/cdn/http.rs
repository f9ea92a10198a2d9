// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use url::Url;

use super::{CacheInvalidator, caller_reference};
use crate::error::InvalidationError;

/// Body posted to the purge endpoint
#[derive(Debug, Serialize)]
struct PurgeRequest<'a> {
    paths: &'a [String],
    caller_reference: String,
}

/// Accepted shapes of the purge endpoint's answer
#[derive(Debug, Default, Deserialize)]
struct PurgeResponse {
    #[serde(default, alias = "invalidation_id")]
    id: Option<String>,
}

/// Invalidates paths by POSTing them to an HTTP purge endpoint
///
/// The request body is `{"paths": [...], "caller_reference": "..."}`; the
/// invalidation id is read from an `id` field of a JSON answer, falling back
/// to the caller reference.
#[derive(Clone)]
pub struct HttpPurgeInvalidator {
    client: reqwest::Client,
    endpoint: Url,
    token: Option<String>,
}

impl HttpPurgeInvalidator {
    pub fn new(endpoint: Url, token: Option<String>) -> Self {
        Self::with_client(reqwest::Client::new(), endpoint, token)
    }

    /// Create an invalidator with a custom reqwest::Client
    pub fn with_client(client: reqwest::Client, endpoint: Url, token: Option<String>) -> Self {
        Self {
            client,
            endpoint,
            token,
        }
    }
}

#[async_trait]
impl CacheInvalidator for HttpPurgeInvalidator {
    async fn invalidate(&self, paths: &[String]) -> Result<String, InvalidationError> {
        let reference = caller_reference();
        let body = PurgeRequest {
            paths,
            caller_reference: reference.clone(),
        };

        let mut request = self.client.post(self.endpoint.clone()).json(&body);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| InvalidationError::RequestFailed {
                endpoint: self.endpoint.to_string(),
                source: e,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(InvalidationError::Rejected {
                endpoint: self.endpoint.to_string(),
                status: status.as_u16(),
            });
        }

        // Endpoints are not required to answer with JSON
        let answer = response
            .bytes()
            .await
            .ok()
            .and_then(|body| serde_json::from_slice::<PurgeResponse>(&body).ok())
            .unwrap_or_default();

        Ok(answer.id.unwrap_or(reference))
    }
}
