// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use async_trait::async_trait;
use aws_sdk_cloudfront::{
    Client,
    config::{BehaviorVersion, Credentials, Region, retry::RetryConfig},
    error::{BuildError, DisplayErrorContext},
    types::{InvalidationBatch, Paths},
};

use super::{CacheInvalidator, caller_reference};
use crate::error::InvalidationError;

/// CloudFront is a global service; its API is signed for us-east-1
const CLOUDFRONT_REGION: &str = "us-east-1";

/// How the distribution to invalidate is found
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DistributionTarget {
    Id(String),
    /// The first distribution serving this host, as its CloudFront domain or
    /// as an alternate domain name
    Domain(String),
}

/// Invalidates paths through CloudFront's `CreateInvalidation`
#[derive(Debug, Clone)]
pub struct CloudFrontInvalidator {
    client: Client,
    target: DistributionTarget,
}

impl CloudFrontInvalidator {
    pub fn new(target: DistributionTarget, key_id: String, key_secret: String) -> Self {
        let credentials = Credentials::new(key_id, key_secret, None, None, "podpub-config");

        let config = aws_sdk_cloudfront::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .credentials_provider(credentials)
            .region(Region::new(CLOUDFRONT_REGION))
            .retry_config(RetryConfig::standard().with_max_attempts(4))
            .build();

        Self {
            client: Client::from_conf(config),
            target,
        }
    }

    /// Resolve the configured target to a distribution id
    async fn distribution_id(&self) -> Result<String, InvalidationError> {
        let domain = match &self.target {
            DistributionTarget::Id(id) => return Ok(id.clone()),
            DistributionTarget::Domain(domain) => domain,
        };

        let mut marker: Option<String> = None;
        loop {
            let output = self
                .client
                .list_distributions()
                .set_marker(marker.take())
                .send()
                .await
                .map_err(|e| api_error("ListDistributions", DisplayErrorContext(e)))?;

            let Some(list) = output.distribution_list() else {
                break;
            };

            let found = list.items().iter().find(|summary| {
                let aliases = summary
                    .aliases()
                    .map(|aliases| aliases.items())
                    .unwrap_or_default();
                serves_domain(summary.domain_name(), aliases, domain)
            });
            if let Some(summary) = found {
                tracing::debug!(domain = %domain, distribution = summary.id(), "resolved CloudFront distribution");
                return Ok(summary.id().to_string());
            }

            match list.next_marker() {
                Some(next) if !next.is_empty() => marker = Some(next.to_string()),
                _ => break,
            }
        }

        Err(InvalidationError::DistributionNotFound(domain.clone()))
    }
}

fn api_error(operation: &'static str, reason: impl ToString) -> InvalidationError {
    InvalidationError::CloudFront {
        operation,
        reason: reason.to_string(),
    }
}

/// Whether a distribution with `domain_name` and `aliases` serves `host`
fn serves_domain(domain_name: &str, aliases: &[String], host: &str) -> bool {
    domain_name.eq_ignore_ascii_case(host)
        || aliases.iter().any(|alias| alias.eq_ignore_ascii_case(host))
}

/// The batch sent with `CreateInvalidation`
fn invalidation_batch(paths: &[String], reference: &str) -> Result<InvalidationBatch, BuildError> {
    let paths = Paths::builder()
        .quantity(i32::try_from(paths.len()).unwrap_or(i32::MAX))
        .set_items(Some(paths.to_vec()))
        .build()?;

    InvalidationBatch::builder()
        .paths(paths)
        .caller_reference(reference)
        .build()
}

#[async_trait]
impl CacheInvalidator for CloudFrontInvalidator {
    async fn invalidate(&self, paths: &[String]) -> Result<String, InvalidationError> {
        let distribution_id = self.distribution_id().await?;
        let reference = caller_reference();
        let batch = invalidation_batch(paths, &reference)
            .map_err(|e| api_error("CreateInvalidation", e))?;

        let output = self
            .client
            .create_invalidation()
            .distribution_id(&distribution_id)
            .invalidation_batch(batch)
            .send()
            .await
            .map_err(|e| api_error("CreateInvalidation", DisplayErrorContext(e)))?;

        Ok(output
            .invalidation()
            .map(|invalidation| invalidation.id().to_string())
            .unwrap_or(reference))
    }
}
