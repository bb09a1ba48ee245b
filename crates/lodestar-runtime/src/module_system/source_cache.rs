// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Memoized source and byte loading over the storage collaborator

use crate::error::{Result, RuntimeError};
use crate::module_system::memo::MemoMap;
use crate::storage::ResourceReader;
use bytes::Bytes;
use futures::FutureExt;
use std::path::Path;
use std::rc::Rc;
use tracing::debug;

/// Loads and memoizes source text by physical location.
///
/// Every distinct location is read at most once for the cache's lifetime;
/// concurrent requests share one in-flight read, and a failure settles the
/// entry permanently. Failures carry the identifier the first requester
/// asked for, plus the location.
pub struct SourceCache {
    storage: Rc<dyn ResourceReader>,
    entries: MemoMap<String>,
}

impl SourceCache {
    /// Creates a cache over the given storage collaborator.
    pub fn new(storage: Rc<dyn ResourceReader>) -> Self {
        Self {
            storage,
            entries: MemoMap::new(),
        }
    }

    /// Loads the source text at `location`, requested for `identifier`.
    pub async fn load(&self, identifier: &str, location: &Path) -> Result<String> {
        let key = location.to_string_lossy().into_owned();
        let entry = self.entries.get_or_insert_with(&key, || {
            let storage = Rc::clone(&self.storage);
            let identifier = identifier.to_string();
            let location = location.to_path_buf();
            async move {
                debug!(%identifier, location = %location.display(), "reading source");
                let bytes = storage
                    .read(&location)
                    .await
                    .map_err(|e| RuntimeError::load(&identifier, &location, e))?;
                String::from_utf8(bytes.to_vec()).map_err(|_| {
                    RuntimeError::load(&identifier, &location, "source is not valid UTF-8")
                })
            }
            .boxed_local()
        });
        entry.await
    }
}

/// Byte-loading analog of [`SourceCache`] for pre-resolved artifacts.
pub struct ByteCache {
    storage: Rc<dyn ResourceReader>,
    entries: MemoMap<Bytes>,
}

impl ByteCache {
    /// Creates a cache over the given storage collaborator.
    pub fn new(storage: Rc<dyn ResourceReader>) -> Self {
        Self {
            storage,
            entries: MemoMap::new(),
        }
    }

    /// Loads the raw bytes at `location`, requested for `identifier`.
    pub async fn load(&self, identifier: &str, location: &Path) -> Result<Bytes> {
        let key = location.to_string_lossy().into_owned();
        let entry = self.entries.get_or_insert_with(&key, || {
            let storage = Rc::clone(&self.storage);
            let identifier = identifier.to_string();
            let location = location.to_path_buf();
            async move {
                debug!(%identifier, location = %location.display(), "reading artifact");
                storage
                    .read(&location)
                    .await
                    .map_err(|e| RuntimeError::load(&identifier, &location, e))
            }
            .boxed_local()
        });
        entry.await
    }
}
