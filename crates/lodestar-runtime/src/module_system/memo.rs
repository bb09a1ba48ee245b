// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Single-flight memoization of asynchronous results

use crate::error::Result;
use futures::FutureExt;
use futures::future::{LocalBoxFuture, Shared};
use std::cell::RefCell;
use std::collections::HashMap;

/// A memoized, single-assignment asynchronous result.
pub(crate) type MemoFuture<T> = Shared<LocalBoxFuture<'static, Result<T>>>;

/// Instance-owned map of key → memoized asynchronous result.
///
/// The first requester of a key installs the sole underlying operation;
/// every other requester awaits the same shared future. Once settled
/// (success or failure) an entry never changes, and entries are never
/// evicted. The map is mutated only between suspension points, so plain
/// `RefCell` interior mutability suffices under the cooperative
/// single-threaded model.
pub(crate) struct MemoMap<T: Clone> {
    entries: RefCell<HashMap<String, MemoFuture<T>>>,
}

impl<T: Clone + 'static> MemoMap<T> {
    pub fn new() -> Self {
        Self {
            entries: RefCell::new(HashMap::new()),
        }
    }

    /// Returns the entry for `key`, if one was ever installed.
    pub fn get(&self, key: &str) -> Option<MemoFuture<T>> {
        self.entries.borrow().get(key).cloned()
    }

    /// Returns the entry for `key`, installing the future produced by
    /// `init` on first request.
    pub fn get_or_insert_with(
        &self,
        key: &str,
        init: impl FnOnce() -> LocalBoxFuture<'static, Result<T>>,
    ) -> MemoFuture<T> {
        let mut entries = self.entries.borrow_mut();
        if let Some(existing) = entries.get(key) {
            return existing.clone();
        }
        let entry = init().shared();
        entries.insert(key.to_string(), entry.clone());
        entry
    }

    /// Registers an existing entry under an additional key. Keeps any
    /// entry already present for that key.
    pub fn alias(&self, key: &str, entry: MemoFuture<T>) {
        self.entries
            .borrow_mut()
            .entry(key.to_string())
            .or_insert(entry);
    }

    /// Number of installed entries (aliases included).
    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }
}
