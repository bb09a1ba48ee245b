// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Module pipelines: resolve → load → (transform) → invoke

use crate::error::{Result, RuntimeError};
use crate::module_system::invoker::CodeInvoker;
use crate::module_system::memo::MemoMap;
use crate::module_system::resolver::PathResolver;
use crate::module_system::source_cache::{ByteCache, SourceCache};
use crate::module_system::ModuleLoad;
use crate::transform::SourceTransform;
use async_trait::async_trait;
use futures::FutureExt;
use lodestar_script::Value;
use std::rc::Rc;
use tracing::debug;

/// Text pipeline: resolve-source → load text → optional transform →
/// invoke. Memoized by identifier only.
///
/// Cheap to clone; clones share the caches. The pipeline hands itself to
/// the invoker as the loader for nested dependencies.
#[derive(Clone)]
pub struct TextPipeline {
    inner: Rc<TextPipelineInner>,
}

struct TextPipelineInner {
    resolver: Rc<PathResolver>,
    sources: Rc<SourceCache>,
    invoker: Rc<CodeInvoker>,
    transform: Option<Rc<dyn SourceTransform>>,
    modules: MemoMap<Value>,
}

impl TextPipeline {
    /// Creates a text pipeline over the given components.
    pub fn new(
        resolver: Rc<PathResolver>,
        sources: Rc<SourceCache>,
        invoker: Rc<CodeInvoker>,
        transform: Option<Rc<dyn SourceTransform>>,
    ) -> Self {
        Self {
            inner: Rc::new(TextPipelineInner {
                resolver,
                sources,
                invoker,
                transform,
                modules: MemoMap::new(),
            }),
        }
    }

    /// Loads a module and returns its exported bindings.
    ///
    /// Single-flight per identifier: a second concurrent request observes
    /// the first request's memoized result.
    pub async fn load(&self, identifier: &str) -> Result<Value> {
        let entry = self.inner.modules.get_or_insert_with(identifier, || {
            let inner = Rc::clone(&self.inner);
            let identifier = identifier.to_string();
            async move {
                debug!(%identifier, "loading module (text pipeline)");
                let location = inner.resolver.resolve_source(&identifier)?;
                let text = inner.sources.load(&identifier, &location).await?;
                let text = match &inner.transform {
                    Some(transform) => transform.transform(text, &identifier).await?,
                    None => text,
                };
                let loader = TextPipeline {
                    inner: Rc::clone(&inner),
                };
                inner.invoker.invoke(&text, &loader).await
            }
            .boxed_local()
        });
        entry.await
    }
}

#[async_trait(?Send)]
impl ModuleLoad for TextPipeline {
    async fn load_module(&self, identifier: &str) -> Result<Value> {
        self.load(identifier).await
    }
}

/// Pre-resolved pipeline: resolve-artifact → load bytes → invoke.
///
/// Memoized under both the requested identifier and its resolved
/// location. When a second identifier resolves to an already-cached
/// location, the existing entry is reused and aliased under the new
/// identifier: one evaluation, one shared result.
#[derive(Clone)]
pub struct ArtifactPipeline {
    inner: Rc<ArtifactPipelineInner>,
}

struct ArtifactPipelineInner {
    resolver: Rc<PathResolver>,
    bytes: Rc<ByteCache>,
    invoker: Rc<CodeInvoker>,
    modules: MemoMap<Value>,
}

impl ArtifactPipeline {
    /// Creates a pre-resolved pipeline over the given components.
    pub fn new(
        resolver: Rc<PathResolver>,
        bytes: Rc<ByteCache>,
        invoker: Rc<CodeInvoker>,
    ) -> Self {
        Self {
            inner: Rc::new(ArtifactPipelineInner {
                resolver,
                bytes,
                invoker,
                modules: MemoMap::new(),
            }),
        }
    }

    /// Loads a pre-resolved module and returns its exported bindings.
    pub async fn load(&self, identifier: &str) -> Result<Value> {
        if let Some(entry) = self.inner.modules.get(identifier) {
            return entry.await;
        }

        // Resolution is pure, so running it outside the memo entry keeps
        // the identifier and location keys consistent.
        let location = self.inner.resolver.resolve(identifier)?;
        let location_key = location.to_string_lossy().into_owned();

        if let Some(entry) = self.inner.modules.get(&location_key) {
            debug!(%identifier, location = %location.display(), "aliasing shared artifact");
            self.inner.modules.alias(identifier, entry.clone());
            return entry.await;
        }

        let entry = self.inner.modules.get_or_insert_with(&location_key, || {
            let inner = Rc::clone(&self.inner);
            let identifier = identifier.to_string();
            async move {
                debug!(%identifier, "loading module (artifact pipeline)");
                let bytes = inner.bytes.load(&identifier, &location).await?;
                let text = String::from_utf8(bytes.to_vec()).map_err(|_| {
                    RuntimeError::load(&identifier, &location, "artifact is not valid UTF-8 text")
                })?;
                let loader = ArtifactPipeline {
                    inner: Rc::clone(&inner),
                };
                inner.invoker.invoke(&text, &loader).await
            }
            .boxed_local()
        });
        self.inner.modules.alias(identifier, entry.clone());
        entry.await
    }
}

#[async_trait(?Send)]
impl ModuleLoad for ArtifactPipeline {
    async fn load_module(&self, identifier: &str) -> Result<Value> {
        self.load(identifier).await
    }
}
