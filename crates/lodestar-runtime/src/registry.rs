// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Package registry: identifier prefixes mapped to package descriptors

use crate::error::{Result, RuntimeError};
use serde::Deserialize;
use std::collections::HashMap;

/// Entry-point name used when a package declares none.
pub const DEFAULT_ENTRY_POINT: &str = "index";

/// A registry entry describing where a package's artifacts live.
///
/// Descriptors are read-only during resolution.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageDescriptor {
    /// Base directory of the package's artifacts
    pub base_path: String,
    /// Declared entry-point name, used when an identifier names the
    /// package itself
    #[serde(default)]
    pub main: Option<String>,
    /// Distribution subdirectory, stripped when resolving original sources
    #[serde(default)]
    pub dist_dir: Option<String>,
    /// Source subdirectory, prepended when resolving original sources
    #[serde(default)]
    pub source_dir: Option<String>,
}

impl PackageDescriptor {
    /// Creates a descriptor with only a base path.
    pub fn new(base_path: impl Into<String>) -> Self {
        Self {
            base_path: base_path.into(),
            main: None,
            dist_dir: None,
            source_dir: None,
        }
    }

    /// Sets the declared entry-point name.
    pub fn with_main(mut self, main: impl Into<String>) -> Self {
        self.main = Some(main.into());
        self
    }

    /// Sets the distribution subdirectory.
    pub fn with_dist_dir(mut self, dist_dir: impl Into<String>) -> Self {
        self.dist_dir = Some(dist_dir.into());
        self
    }

    /// Sets the source subdirectory.
    pub fn with_source_dir(mut self, source_dir: impl Into<String>) -> Self {
        self.source_dir = Some(source_dir.into());
        self
    }

    /// The entry-point name, declared or defaulted.
    pub fn entry_point(&self) -> &str {
        self.main.as_deref().unwrap_or(DEFAULT_ENTRY_POINT)
    }
}

/// Read-only mapping from exact identifier prefixes to package
/// descriptors.
#[derive(Debug, Clone, Default)]
pub struct PackageRegistry {
    packages: HashMap<String, PackageDescriptor>,
}

/// On-disk manifest shape (`lodestar.json`).
#[derive(Debug, Deserialize)]
struct Manifest {
    packages: HashMap<String, PackageDescriptor>,
}

impl PackageRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a package under an identifier prefix.
    pub fn insert(&mut self, prefix: impl Into<String>, descriptor: PackageDescriptor) {
        self.packages.insert(prefix.into(), descriptor);
    }

    /// Looks up a package by exact prefix.
    pub fn get(&self, prefix: &str) -> Option<&PackageDescriptor> {
        self.packages.get(prefix)
    }

    /// Number of registered packages.
    pub fn len(&self) -> usize {
        self.packages.len()
    }

    /// True if no packages are registered.
    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    /// Parses a registry from manifest JSON.
    pub fn from_manifest(json: &str) -> Result<Self> {
        let manifest: Manifest = serde_json::from_str(json)
            .map_err(|e| RuntimeError::Configuration(format!("invalid registry manifest: {e}")))?;
        Ok(Self {
            packages: manifest.packages,
        })
    }
}
