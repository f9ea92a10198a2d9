// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! CDN cache invalidation.

#[cfg(feature = "s3")]
mod cloudfront;
mod http;

#[cfg(feature = "s3")]
pub use cloudfront::{CloudFrontInvalidator, DistributionTarget};
pub use http::HttpPurgeInvalidator;

use async_trait::async_trait;
use chrono::Utc;

use crate::error::InvalidationError;

/// CDN cache invalidation abstraction
#[async_trait]
pub trait CacheInvalidator: Send + Sync {
    /// Invalidate the cached copies of `paths`, returning the invalidation id
    async fn invalidate(&self, paths: &[String]) -> Result<String, InvalidationError>;
}

/// Unique reference so the CDN does not deduplicate separate runs
pub(crate) fn caller_reference() -> String {
    format!("podpub-{}", Utc::now().timestamp_millis())
}
