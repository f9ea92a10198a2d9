// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! In-memory object store.

use std::collections::{BTreeMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use bytes::Bytes;

use super::{Fingerprint, ListPage, ObjectStore, validate_key};
use crate::error::StoreError;

#[derive(Debug, Clone)]
struct StoredObject {
    data: Bytes,
    content_type: String,
}

/// Object store kept entirely in memory
///
/// Objects live in a `BTreeMap` behind a [`Mutex`], so listing is naturally
/// ordered and paginated. Besides embedding, it is the store used by the
/// tests: it counts uploads and can simulate an unreachable backend, either
/// entirely or for selected keys.
#[derive(Debug)]
pub struct MemoryStore {
    objects: Mutex<BTreeMap<String, StoredObject>>,
    page_size: usize,
    put_count: AtomicUsize,
    unavailable: AtomicBool,
    failing_keys: Mutex<HashSet<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            objects: Mutex::new(BTreeMap::new()),
            page_size: 1000,
            put_count: AtomicUsize::new(0),
            unavailable: AtomicBool::new(false),
            failing_keys: Mutex::new(HashSet::new()),
        }
    }

    /// Create a store pre-populated with objects
    ///
    /// Panics if any key fails validation. If test setup is wrong, then the
    /// test should not pass.
    pub fn with_objects(
        objects: impl IntoIterator<Item = (impl Into<String>, impl Into<Bytes>)>,
    ) -> Self {
        let store = Self::new();
        {
            let mut map = store.lock_objects();
            for (key, data) in objects {
                let key = key.into();
                if validate_key(&key).is_err() {
                    panic!("MemoryStore::with_objects: invalid key {key}");
                }
                map.insert(
                    key,
                    StoredObject {
                        data: data.into(),
                        content_type: "application/octet-stream".to_string(),
                    },
                );
            }
        }
        store
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Make every subsequent call fail with [`StoreError::Unavailable`]
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Make calls touching `key` fail with [`StoreError::Unavailable`]
    pub fn fail_key(&self, key: impl Into<String>) {
        self.failing_keys
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.into());
    }

    /// Number of successful `put` calls so far
    pub fn put_count(&self) -> usize {
        self.put_count.load(Ordering::SeqCst)
    }

    /// Content type the object under `key` was stored with
    pub fn content_type(&self, key: &str) -> Option<String> {
        self.lock_objects()
            .get(key)
            .map(|object| object.content_type.clone())
    }

    pub fn keys(&self) -> Vec<String> {
        self.lock_objects().keys().cloned().collect()
    }

    fn lock_objects(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, StoredObject>> {
        self.objects.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn check_available(&self, key: &str) -> Result<(), StoreError> {
        let key_fails = self
            .failing_keys
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(key);

        if self.unavailable.load(Ordering::SeqCst) || key_fails {
            Err(StoreError::unavailable(key, "simulated outage"))
        } else {
            Ok(())
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn put(&self, key: &str, data: Bytes, content_type: &str) -> Result<(), StoreError> {
        validate_key(key)?;
        self.check_available(key)?;

        self.lock_objects().insert(
            key.to_string(),
            StoredObject {
                data,
                content_type: content_type.to_string(),
            },
        );
        self.put_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Bytes, StoreError> {
        validate_key(key)?;
        self.check_available(key)?;

        self.lock_objects()
            .get(key)
            .map(|object| object.data.clone())
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    async fn head(&self, key: &str) -> Result<Option<Fingerprint>, StoreError> {
        validate_key(key)?;
        self.check_available(key)?;

        Ok(self
            .lock_objects()
            .get(key)
            .map(|object| Fingerprint::of_bytes(&object.data)))
    }

    async fn list(
        &self,
        prefix: &str,
        continuation: Option<&str>,
    ) -> Result<ListPage, StoreError> {
        self.check_available(prefix)?;

        let objects = self.lock_objects();
        let mut matching = objects
            .keys()
            .filter(|key| key.starts_with(prefix))
            .filter(|key| continuation.is_none_or(|token| key.as_str() > token));

        let keys: Vec<String> = matching.by_ref().take(self.page_size).cloned().collect();
        let next = if matching.next().is_some() {
            keys.last().cloned()
        } else {
            None
        };

        Ok(ListPage { keys, next })
    }
}
