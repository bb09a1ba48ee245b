// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! # lodestar-runtime
//!
//! A dynamic module-loading runtime built on the Lodestar script engine.
//!
//! Given a logical module identifier, the runtime locates the
//! corresponding source artifact through a package registry, loads and
//! optionally transforms its text, and executes it as a module body with
//! a dependency-injection protocol supporting both synchronous and
//! asynchronous dependency access:
//!
//! - **Path resolver**: longest-prefix package matching by progressive
//!   right-truncation of the identifier
//! - **Source/byte caches**: memoized, single-flight, permanent results
//! - **Strategy dispatcher**: probes native-async → native-sync → custom
//!   loading capabilities once, then pins
//! - **Module pipelines**: text (resolve → load → transform → invoke)
//!   and pre-resolved (resolve → bytes → invoke, with alias folding)
//! - **Code invoker**: the cooperative retry evaluator. A module body may
//!   request a dependency synchronously; if it is not yet available,
//!   evaluation unwinds, the dependency loads asynchronously, and the body
//!   re-executes from the top
//!
//! Scheduling is single-threaded and cooperative; components own their
//! caches and share nothing across threads.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use lodestar_runtime::{PackageRegistry, Runtime, RuntimeOptions};
//!
//! let registry = PackageRegistry::from_manifest(manifest_json)?;
//! let runtime = Runtime::new(RuntimeOptions::new(registry));
//! let bindings = runtime.load_module("lib/foo/bar").await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod module_system;
pub mod registry;
pub mod runtime;
pub mod storage;
pub mod transform;

// Re-exports
pub use error::{Result, RuntimeError};
pub use lodestar_script::Value;
pub use module_system::{
    ArtifactPipeline, ByteCache, CodeInvoker, DependencyRequest, HostCapabilities, ModuleLoad,
    PathResolver, SourceCache, Strategy, StrategyDispatcher, SyncModuleLoad, TextPipeline,
    DYNAMIC_IMPORT_ALIAS,
};
pub use registry::{PackageDescriptor, PackageRegistry};
pub use runtime::{Runtime, RuntimeOptions};
pub use storage::{FsReader, MemoryReader, ResourceReader};
pub use transform::SourceTransform;

/// Version of the lodestar runtime
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
