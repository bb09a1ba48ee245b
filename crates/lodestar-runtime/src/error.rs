// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Error types for the module runtime

use std::path::Path;
use thiserror::Error;

/// Result type for module runtime operations
pub type Result<T> = std::result::Result<T, RuntimeError>;

/// Errors that can occur in the module runtime.
///
/// All variants are `Clone`: a failed load permanently settles its cache
/// entry, and every later requester of the same key receives the same
/// error. Underlying causes are carried as opaque text for the same
/// reason.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuntimeError {
    /// No registry prefix matches the identifier
    #[error("cannot resolve module '{0}'")]
    Resolution(String),

    /// Underlying byte/source retrieval failed; permanent for the cache key
    #[error("failed to load '{identifier}' from '{location}': {cause}")]
    Load {
        /// Identifier the caller originally requested
        identifier: String,
        /// Resolved physical location
        location: String,
        /// Underlying cause, opaque
        cause: String,
    },

    /// A host loading capability is unavailable; during Auto probing this
    /// triggers fallback, after pinning it is a normal failure
    #[error("host capability '{0}' is not available")]
    CapabilityAbsent(&'static str),

    /// The runtime is wired incorrectly (e.g. custom strategy without a
    /// custom loader); fatal, no fallback
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A module body raised an error while evaluating; propagated unchanged
    #[error(transparent)]
    Invocation(#[from] lodestar_script::Error),

    /// Invariant violation in strategy state; unreachable in a correct
    /// dispatcher
    #[error("unknown loading strategy '{0}'")]
    UnknownStrategy(String),
}

impl RuntimeError {
    /// Builds a [`RuntimeError::Load`] with context for a failed retrieval.
    pub fn load(
        identifier: impl Into<String>,
        location: &Path,
        cause: impl std::fmt::Display,
    ) -> Self {
        Self::Load {
            identifier: identifier.into(),
            location: location.display().to_string(),
            cause: cause.to_string(),
        }
    }

    /// True for the distinguished capability-absent failure class.
    pub fn is_capability_absent(&self) -> bool {
        matches!(self, Self::CapabilityAbsent(_))
    }
}
