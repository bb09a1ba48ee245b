// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! The runtime facade wiring the module system together

use crate::error::Result;
use crate::module_system::{
    install_default_builtins, ArtifactPipeline, ByteCache, CodeInvoker, HostCapabilities,
    ModuleLoad, PathResolver, SourceCache, Strategy, StrategyDispatcher, TextPipeline,
    DEFAULT_SOURCE_EXTENSION,
};
use crate::registry::PackageRegistry;
use crate::storage::{FsReader, ResourceReader};
use crate::transform::SourceTransform;
use lodestar_script::Value;
use std::path::PathBuf;
use std::rc::Rc;
use tracing::debug;

/// Configuration for a [`Runtime`].
pub struct RuntimeOptions {
    registry: PackageRegistry,
    storage: Option<Rc<dyn ResourceReader>>,
    resolver_root: PathBuf,
    source_extension: String,
    prefetch: bool,
    transform: Option<Rc<dyn SourceTransform>>,
    custom_loader: Option<Rc<dyn ModuleLoad>>,
}

impl RuntimeOptions {
    /// Options over a registry, with filesystem storage scoped to the
    /// current directory and defaults everywhere else.
    pub fn new(registry: PackageRegistry) -> Self {
        Self {
            registry,
            storage: None,
            resolver_root: PathBuf::new(),
            source_extension: DEFAULT_SOURCE_EXTENSION.to_string(),
            prefetch: true,
            transform: None,
            custom_loader: None,
        }
    }

    /// Supplies the storage collaborator resolved locations are read from.
    pub fn with_storage(mut self, storage: Rc<dyn ResourceReader>) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Prefixes every resolved location with a root directory.
    pub fn with_resolver_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.resolver_root = root.into();
        self
    }

    /// Overrides the source-mode file extension.
    pub fn with_source_extension(mut self, extension: impl Into<String>) -> Self {
        self.source_extension = extension.into();
        self
    }

    /// Enables or disables the invoker's literal-dependency pre-pass.
    pub fn with_prefetch(mut self, enabled: bool) -> Self {
        self.prefetch = enabled;
        self
    }

    /// Installs a source transform between loading and invocation.
    pub fn with_transform(mut self, transform: Rc<dyn SourceTransform>) -> Self {
        self.transform = Some(transform);
        self
    }

    /// Supplies the custom loading capability.
    pub fn with_custom_loader(mut self, loader: Rc<dyn ModuleLoad>) -> Self {
        self.custom_loader = Some(loader);
        self
    }
}

/// The assembled module runtime.
///
/// Wires registry, storage, resolver, caches, invoker, pipelines and
/// dispatcher, and exposes the public loading operations. All caches are
/// owned by this instance and live as long as it does.
pub struct Runtime {
    resolver: Rc<PathResolver>,
    sources: Rc<SourceCache>,
    artifacts: ArtifactPipeline,
    dispatcher: Rc<StrategyDispatcher>,
    invoker: Rc<CodeInvoker>,
}

impl Runtime {
    /// Builds a runtime from options.
    ///
    /// Capability wiring: the text pipeline is this host's native
    /// asynchronous loader, there is no native synchronous loader, and the
    /// custom slot is whatever the options supplied.
    pub fn new(options: RuntimeOptions) -> Self {
        let storage = options
            .storage
            .unwrap_or_else(|| Rc::new(FsReader::new(".")));
        let resolver = Rc::new(PathResolver::new(
            Rc::new(options.registry),
            options.resolver_root,
            options.source_extension,
        ));
        let sources = Rc::new(SourceCache::new(Rc::clone(&storage)));
        let bytes = Rc::new(ByteCache::new(storage));

        let mut invoker = CodeInvoker::new().with_prefetch(options.prefetch);
        install_default_builtins(&mut invoker);
        let invoker = Rc::new(invoker);

        let text = TextPipeline::new(
            Rc::clone(&resolver),
            Rc::clone(&sources),
            Rc::clone(&invoker),
            options.transform,
        );
        let artifacts = ArtifactPipeline::new(
            Rc::clone(&resolver),
            bytes,
            Rc::clone(&invoker),
        );

        let dispatcher = Rc::new(StrategyDispatcher::new(HostCapabilities {
            native_async: Some(Rc::new(text)),
            native_sync: None,
            custom: options.custom_loader,
        }));

        debug!("runtime assembled");
        Self {
            resolver,
            sources,
            artifacts,
            dispatcher,
            invoker,
        }
    }

    /// Resolves an identifier to its artifact location.
    pub fn resolve(&self, identifier: &str) -> Result<PathBuf> {
        self.resolver.resolve(identifier)
    }

    /// Resolves an identifier to its original-source location.
    pub fn resolve_source(&self, identifier: &str) -> Result<PathBuf> {
        self.resolver.resolve_source(identifier)
    }

    /// Loads the source text of a module, memoized by location.
    pub async fn load_source(&self, identifier: &str) -> Result<String> {
        let location = self.resolver.resolve_source(identifier)?;
        self.sources.load(identifier, &location).await
    }

    /// Loads a module through the strategy dispatcher.
    pub async fn load_module(&self, identifier: &str) -> Result<Value> {
        self.dispatcher.load(identifier).await
    }

    /// Loads a pre-resolved module through the artifact pipeline.
    pub async fn load_artifact(&self, identifier: &str) -> Result<Value> {
        self.artifacts.load(identifier).await
    }

    /// Evaluates source text as a module body; nested dependencies load
    /// through the dispatcher.
    pub async fn invoke_code(&self, source: &str) -> Result<Value> {
        self.invoker.invoke(source, &*self.dispatcher).await
    }

    /// The dispatcher's current strategy.
    pub fn strategy(&self) -> Strategy {
        self.dispatcher.strategy()
    }
}
