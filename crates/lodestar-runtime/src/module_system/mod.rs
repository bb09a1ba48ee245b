// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! The Lodestar module system
//!
//! Implements the resolution-and-evaluation pipeline:
//!
//! - Path resolution through a package registry (longest-prefix matching)
//! - Memoized single-flight source and byte caches
//! - A capability-probing, strategy-pinning loading dispatcher
//! - Text and pre-resolved module pipelines
//! - The code invoker with its cooperative retry evaluator

mod builtins;
mod dispatcher;
mod invoker;
mod memo;
mod pipeline;
mod resolver;
mod source_cache;

pub use builtins::{create_math, create_strings, install_default_builtins};
pub use dispatcher::{HostCapabilities, Strategy, StrategyDispatcher};
pub use invoker::{CodeInvoker, DependencyRequest, DYNAMIC_IMPORT_ALIAS};
pub use pipeline::{ArtifactPipeline, TextPipeline};
pub use resolver::{PathResolver, DEFAULT_SOURCE_EXTENSION};
pub use source_cache::{ByteCache, SourceCache};

use crate::error::Result;
use async_trait::async_trait;
use lodestar_script::Value;

/// The module-loading contract: identifier in, exported bindings out.
///
/// Implemented by the pipelines and the dispatcher; the code invoker takes
/// any implementor to satisfy nested dependencies.
#[async_trait(?Send)]
pub trait ModuleLoad {
    /// Loads a module by identifier and returns its exported bindings.
    async fn load_module(&self, identifier: &str) -> Result<Value>;
}

/// Synchronous variant of the module-loading contract, for hosts with a
/// blocking native loader.
pub trait SyncModuleLoad {
    /// Loads a module by identifier without suspending.
    fn load_module_sync(&self, identifier: &str) -> Result<Value>;
}
