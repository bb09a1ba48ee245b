// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Storage collaborator supplying raw bytes for physical locations

use async_trait::async_trait;
use bytes::Bytes;
use std::cell::RefCell;
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};

/// Scoped, read-only access to named resources.
///
/// The runtime never writes; failures surface as opaque [`io::Error`]
/// causes and are given context by the caches that wrap this trait.
#[async_trait(?Send)]
pub trait ResourceReader {
    /// Reads the full contents of the resource at `location`.
    async fn read(&self, location: &Path) -> io::Result<Bytes>;
}

/// Reads resources from the filesystem below a base directory.
#[derive(Debug, Clone)]
pub struct FsReader {
    base: PathBuf,
}

impl FsReader {
    /// Creates a reader scoped to `base`.
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }
}

#[async_trait(?Send)]
impl ResourceReader for FsReader {
    async fn read(&self, location: &Path) -> io::Result<Bytes> {
        let path = self.base.join(location);
        let contents = tokio::fs::read(&path).await?;
        Ok(Bytes::from(contents))
    }
}

/// In-memory resources, for tests and embedded registries.
#[derive(Debug, Default)]
pub struct MemoryReader {
    files: RefCell<HashMap<PathBuf, Bytes>>,
}

impl MemoryReader {
    /// Creates an empty reader.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a resource under a location.
    pub fn insert(&self, location: impl Into<PathBuf>, contents: impl AsRef<[u8]>) {
        self.files.borrow_mut().insert(
            location.into(),
            Bytes::copy_from_slice(contents.as_ref()),
        );
    }
}

#[async_trait(?Send)]
impl ResourceReader for MemoryReader {
    async fn read(&self, location: &Path) -> io::Result<Bytes> {
        self.files.borrow().get(location).cloned().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("no resource at '{}'", location.display()),
            )
        })
    }
}
