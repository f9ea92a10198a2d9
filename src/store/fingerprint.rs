// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::fmt;
use std::path::Path;

use sha2::{Digest, Sha256};
use tokio::io::AsyncReadExt;

const HASH_PREFIX: &str = "sha256:";
const READ_CHUNK_SIZE: usize = 64 * 1024;

/// Content hash used to decide whether an artifact changed since it was published
///
/// Rendered as `sha256:<hex>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Hash an in-memory payload
    pub fn of_bytes(data: &[u8]) -> Self {
        Self::from_digest(Sha256::digest(data).as_slice())
    }

    /// Hash a file on disk without loading it into memory at once
    pub async fn of_file(path: &Path) -> std::io::Result<Self> {
        let mut file = tokio::fs::File::open(path).await?;
        let mut hasher = Sha256::new();
        let mut buffer = vec![0u8; READ_CHUNK_SIZE];

        loop {
            let read = file.read(&mut buffer).await?;
            if read == 0 {
                break;
            }
            hasher.update(&buffer[..read]);
        }

        Ok(Self::from_digest(hasher.finalize().as_slice()))
    }

    /// Accept a fingerprint previously rendered by [`Fingerprint::as_str`]
    ///
    /// Returns `None` for anything that is not a `sha256:` hex digest, such
    /// as objects uploaded by other tools.
    pub fn parse(value: &str) -> Option<Self> {
        let hex = value.strip_prefix(HASH_PREFIX)?;
        let valid = hex.len() == 64 && hex.chars().all(|c| matches!(c, '0'..='9' | 'a'..='f'));
        valid.then(|| Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn from_digest(digest: &[u8]) -> Self {
        let hex: String = digest.iter().map(|b| format!("{:02x}", b)).collect();
        Self(format!("{}{}", HASH_PREFIX, hex))
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
