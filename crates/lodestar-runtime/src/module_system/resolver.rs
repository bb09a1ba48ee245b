// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Module path resolution through the package registry

use crate::error::{Result, RuntimeError};
use crate::registry::{PackageDescriptor, PackageRegistry};
use std::path::PathBuf;
use std::rc::Rc;
use tracing::trace;

/// Default extension appended to source-mode locations.
pub const DEFAULT_SOURCE_EXTENSION: &str = ".lds";

/// Maps logical module identifiers to physical locations.
///
/// Resolution is a pure function of the registry and the identifier: the
/// registry is read-only, and repeated calls return identical results.
pub struct PathResolver {
    registry: Rc<PackageRegistry>,
    root: PathBuf,
    source_extension: String,
}

impl PathResolver {
    /// Creates a resolver over a registry, rooting every resolved location
    /// under `root` and appending `source_extension` in source mode.
    pub fn new(
        registry: Rc<PackageRegistry>,
        root: impl Into<PathBuf>,
        source_extension: impl Into<String>,
    ) -> Self {
        let mut source_extension = source_extension.into();
        if !source_extension.is_empty() && !source_extension.starts_with('.') {
            source_extension.insert(0, '.');
        }
        Self {
            registry,
            root: root.into(),
            source_extension,
        }
    }

    /// Creates a resolver with an empty root and the default source
    /// extension.
    pub fn with_defaults(registry: Rc<PackageRegistry>) -> Self {
        Self::new(registry, PathBuf::new(), DEFAULT_SOURCE_EXTENSION)
    }

    /// Resolves an identifier to its artifact location.
    pub fn resolve(&self, identifier: &str) -> Result<PathBuf> {
        let (package, component) = self.locate(identifier)?;
        let component = normalize(&component);
        let file = if component.is_empty() {
            package.entry_point().to_string()
        } else {
            component
        };
        let location = self.root.join(&package.base_path).join(file);
        trace!(identifier, location = %location.display(), "resolved artifact");
        Ok(location)
    }

    /// Resolves an identifier to its original-source location.
    ///
    /// The component is rebased from the package's distribution
    /// subdirectory into its source subdirectory, and the configured
    /// source extension is appended.
    pub fn resolve_source(&self, identifier: &str) -> Result<PathBuf> {
        let (package, component) = self.locate(identifier)?;
        let mut component = normalize(&component);
        if component.is_empty() {
            component = package.entry_point().to_string();
        }

        if let Some(dist) = &package.dist_dir {
            component = strip_subdirectory(&component, dist);
        }
        if let Some(source) = &package.source_dir {
            component = if component.is_empty() {
                source.clone()
            } else {
                format!("{source}/{component}")
            };
        }

        let file = format!("{component}{}", self.source_extension);
        let location = self.root.join(&package.base_path).join(file);
        trace!(identifier, location = %location.display(), "resolved source");
        Ok(location)
    }

    /// Longest-prefix registry match by progressive right-truncation.
    ///
    /// Starting from the full identifier, each miss strips the last path
    /// segment off the prefix and prepends it to the accumulating
    /// component, down to and including the empty prefix. The first
    /// matching prefix is the most specific registered package containing
    /// the identifier.
    fn locate(&self, identifier: &str) -> Result<(&PackageDescriptor, String)> {
        let mut prefix = identifier;
        let mut component: Vec<&str> = Vec::new();

        loop {
            if let Some(package) = self.registry.get(prefix) {
                return Ok((package, component.join("/")));
            }
            if prefix.is_empty() {
                return Err(RuntimeError::Resolution(identifier.to_string()));
            }
            match prefix.rfind('/') {
                Some(pos) => {
                    component.insert(0, &prefix[pos + 1..]);
                    prefix = &prefix[..pos];
                }
                None => {
                    component.insert(0, prefix);
                    prefix = "";
                }
            }
        }
    }
}

/// Lexically normalizes a `/`-separated component: drops empty and `.`
/// segments, `..` pops its parent.
fn normalize(component: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in component.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    segments.join("/")
}

/// Strips a leading subdirectory from a component at a segment boundary.
fn strip_subdirectory(component: &str, subdirectory: &str) -> String {
    let subdirectory = subdirectory.trim_matches('/');
    if component == subdirectory {
        return String::new();
    }
    match component.strip_prefix(subdirectory) {
        Some(rest) if rest.starts_with('/') => rest[1..].to_string(),
        _ => component.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver(entries: Vec<(&str, PackageDescriptor)>) -> PathResolver {
        let mut registry = PackageRegistry::new();
        for (prefix, descriptor) in entries {
            registry.insert(prefix, descriptor);
        }
        PathResolver::with_defaults(Rc::new(registry))
    }

    #[test]
    fn resolves_component_under_base_path() {
        let resolver = resolver(vec![(
            "lib/foo",
            PackageDescriptor::new("libs").with_main("index"),
        )]);
        assert_eq!(
            resolver.resolve("lib/foo/bar").unwrap(),
            PathBuf::from("libs/bar")
        );
    }

    #[test]
    fn empty_component_uses_the_entry_point() {
        let resolver = resolver(vec![(
            "lib/foo",
            PackageDescriptor::new("libs").with_main("start"),
        )]);
        assert_eq!(
            resolver.resolve("lib/foo").unwrap(),
            PathBuf::from("libs/start")
        );
    }

    #[test]
    fn longest_prefix_wins() {
        let resolver = resolver(vec![
            ("a", PackageDescriptor::new("pkg-a")),
            ("a/b", PackageDescriptor::new("pkg-ab")),
        ]);
        assert_eq!(
            resolver.resolve("a/b/c").unwrap(),
            PathBuf::from("pkg-ab/c")
        );
    }

    #[test]
    fn empty_prefix_matches_as_a_root_package() {
        let resolver = resolver(vec![("", PackageDescriptor::new("fallback"))]);
        assert_eq!(
            resolver.resolve("any/thing").unwrap(),
            PathBuf::from("fallback/any/thing")
        );
    }

    #[test]
    fn unresolvable_identifier_names_the_original() {
        let resolver = resolver(vec![("known", PackageDescriptor::new("k"))]);
        assert_eq!(
            resolver.resolve("un/known/module").unwrap_err(),
            RuntimeError::Resolution("un/known/module".into())
        );
    }

    #[test]
    fn resolution_is_deterministic() {
        let resolver = resolver(vec![("lib", PackageDescriptor::new("libs"))]);
        let first = resolver.resolve("lib/x/y").unwrap();
        let second = resolver.resolve("lib/x/y").unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn source_mode_rebases_dist_to_source_and_appends_extension() {
        let resolver = resolver(vec![(
            "lib/foo",
            PackageDescriptor::new("libs")
                .with_main("index")
                .with_dist_dir("dist")
                .with_source_dir("src"),
        )]);
        // Component "bar" is not under dist, so only the source prefix
        // applies
        assert_eq!(
            resolver.resolve_source("lib/foo/bar").unwrap(),
            PathBuf::from("libs/src/bar.lds")
        );
        // A component under dist is rebased
        assert_eq!(
            resolver.resolve_source("lib/foo/dist/bar").unwrap(),
            PathBuf::from("libs/src/bar.lds")
        );
    }

    #[test]
    fn source_mode_without_layout_hints_only_appends_extension() {
        let resolver = resolver(vec![("lib", PackageDescriptor::new("libs"))]);
        assert_eq!(
            resolver.resolve_source("lib/util").unwrap(),
            PathBuf::from("libs/util.lds")
        );
    }

    #[test]
    fn dist_strip_respects_segment_boundaries() {
        assert_eq!(strip_subdirectory("dist/bar", "dist"), "bar");
        assert_eq!(strip_subdirectory("dist", "dist"), "");
        assert_eq!(strip_subdirectory("distribution/bar", "dist"), "distribution/bar");
    }

    #[test]
    fn components_are_normalized() {
        assert_eq!(normalize("a//b/./c"), "a/b/c");
        assert_eq!(normalize("a/b/../c"), "a/c");
        assert_eq!(normalize("."), "");
    }

    #[test]
    fn resolver_root_prefixes_locations() {
        let mut registry = PackageRegistry::new();
        registry.insert("lib", PackageDescriptor::new("libs"));
        let resolver = PathResolver::new(Rc::new(registry), "/srv/modules", "lds");
        assert_eq!(
            resolver.resolve("lib/a").unwrap(),
            PathBuf::from("/srv/modules/libs/a")
        );
        assert_eq!(
            resolver.resolve_source("lib/a").unwrap(),
            PathBuf::from("/srv/modules/libs/a.lds")
        );
    }
}
