// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Multi-strategy module-loading dispatcher with capability probing

use crate::error::{Result, RuntimeError};
use crate::module_system::{ModuleLoad, SyncModuleLoad};
use async_trait::async_trait;
use lodestar_script::Value;
use std::cell::Cell;
use std::fmt;
use std::rc::Rc;
use tracing::{debug, trace};

/// How modules are loaded once probing settles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Probing has not happened yet
    Auto,
    /// Host's native asynchronous loader
    NativeAsync,
    /// Host's native synchronous loader
    NativeSync,
    /// Caller-supplied custom loader
    Custom,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Strategy::Auto => "auto",
            Strategy::NativeAsync => "native-async",
            Strategy::NativeSync => "native-sync",
            Strategy::Custom => "custom",
        };
        write!(f, "{name}")
    }
}

/// Loading capabilities injected by the host.
///
/// An absent capability surfaces as [`RuntimeError::CapabilityAbsent`],
/// which is also the class a present loader returns when the mechanism is
/// unsupported in the current host.
#[derive(Default)]
pub struct HostCapabilities {
    /// Native asynchronous loader
    pub native_async: Option<Rc<dyn ModuleLoad>>,
    /// Native synchronous loader
    pub native_sync: Option<Rc<dyn SyncModuleLoad>>,
    /// Custom loader supplied by the embedder
    pub custom: Option<Rc<dyn ModuleLoad>>,
}

impl HostCapabilities {
    /// No capabilities at all; every load fails until some are supplied.
    pub fn none() -> Self {
        Self::default()
    }
}

/// Chooses among the host's loading capabilities, probing once and then
/// pinning.
///
/// While [`Strategy::Auto`], attempts run native-async → native-sync →
/// custom, falling through only on the capability-absent failure class.
/// The first success or non-capability-absent failure pins the dispatcher
/// to the strategy being attempted, permanently; subsequent calls skip
/// probing entirely.
pub struct StrategyDispatcher {
    capabilities: HostCapabilities,
    strategy: Cell<Strategy>,
}

impl StrategyDispatcher {
    /// Creates a dispatcher in the Auto state.
    pub fn new(capabilities: HostCapabilities) -> Self {
        Self {
            capabilities,
            strategy: Cell::new(Strategy::Auto),
        }
    }

    /// The current strategy; [`Strategy::Auto`] until the first load.
    pub fn strategy(&self) -> Strategy {
        self.strategy.get()
    }

    /// Loads a module with the pinned strategy, probing first if still in
    /// Auto.
    pub async fn load(&self, identifier: &str) -> Result<Value> {
        match self.strategy.get() {
            Strategy::Auto => self.probe(identifier).await,
            pinned => self.dispatch(pinned, identifier).await,
        }
    }

    async fn probe(&self, identifier: &str) -> Result<Value> {
        for strategy in [Strategy::NativeAsync, Strategy::NativeSync] {
            match self.dispatch(strategy, identifier).await {
                Err(error) if error.is_capability_absent() => {
                    trace!(%strategy, "capability absent, probing next");
                }
                outcome => {
                    debug!(%strategy, "strategy pinned");
                    self.strategy.set(strategy);
                    return outcome;
                }
            }
        }
        // Last resort; pinned regardless of the outcome, even when no
        // custom loader was supplied.
        debug!(strategy = %Strategy::Custom, "strategy pinned");
        self.strategy.set(Strategy::Custom);
        self.dispatch(Strategy::Custom, identifier).await
    }

    async fn dispatch(&self, strategy: Strategy, identifier: &str) -> Result<Value> {
        match strategy {
            Strategy::NativeAsync => match &self.capabilities.native_async {
                Some(loader) => loader.load_module(identifier).await,
                None => Err(RuntimeError::CapabilityAbsent("native asynchronous loader")),
            },
            Strategy::NativeSync => match &self.capabilities.native_sync {
                Some(loader) => loader.load_module_sync(identifier),
                None => Err(RuntimeError::CapabilityAbsent("native synchronous loader")),
            },
            Strategy::Custom => match &self.capabilities.custom {
                Some(loader) => loader.load_module(identifier).await,
                None => Err(RuntimeError::Configuration(
                    "custom loading strategy selected but no custom loader was supplied".into(),
                )),
            },
            // dispatch is only ever entered with a concrete strategy
            Strategy::Auto => Err(RuntimeError::UnknownStrategy(Strategy::Auto.to_string())),
        }
    }
}

#[async_trait(?Send)]
impl ModuleLoad for StrategyDispatcher {
    async fn load_module(&self, identifier: &str) -> Result<Value> {
        self.load(identifier).await
    }
}
