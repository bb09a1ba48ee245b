// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Pluggable source-to-source transformation

use crate::error::Result;
use async_trait::async_trait;

/// A source transformation applied by the text pipeline between loading
/// and invocation.
///
/// Invoked once per load; the pipeline never retries a transform. The
/// transformation is expected to be free of side effects.
#[async_trait(?Send)]
pub trait SourceTransform {
    /// Transforms module source text. The identifier is the module being
    /// loaded, for diagnostics and identifier-sensitive rewrites.
    async fn transform(&self, source: String, identifier: &str) -> Result<String>;
}
