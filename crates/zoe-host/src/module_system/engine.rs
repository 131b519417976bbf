// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! The scripting engine seam
//!
//! The loader never parses or runs code itself. An [`Engine`] turns module
//! source into an exports value and knows how to call a module's `main`.

use crate::error::LoaderError;
use crate::host::HostHandle;
use crate::module_system::resolver::ModuleId;
use async_trait::async_trait;
use futures::future::LocalBoxFuture;
use thiserror::Error;

/// An engine failure, passed through to callers verbatim.
///
/// When the failure started in the engine's own import loader, `cause`
/// carries the loader error so callers keep its taxonomy.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct EngineError {
    /// Engine-provided description
    pub message: String,
    /// Loader failure behind this error, if any
    pub cause: Option<LoaderError>,
}

impl EngineError {
    /// Create a new engine error
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            cause: None,
        }
    }

    /// An engine error raised by a failed import
    pub fn from_loader(error: LoaderError) -> Self {
        Self {
            message: error.to_string(),
            cause: Some(error),
        }
    }

    /// The loader error behind this failure, or `fallback` applied to the
    /// message
    pub fn into_loader_error(self, fallback: impl FnOnce(String) -> LoaderError) -> LoaderError {
        match self.cause {
            Some(error) => error,
            None => fallback(self.message),
        }
    }
}

impl From<String> for EngineError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl From<&str> for EngineError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

/// Future returned by a module's entry point
pub type EntryFuture<'a> = LocalBoxFuture<'a, Result<(), EngineError>>;

/// Evaluate-source, return-exports capability of a scripting engine
#[async_trait(?Send)]
pub trait Engine: 'static {
    /// A module's exports. Cloning must be cheap: every `load` of a cached
    /// module hands out a clone.
    type Exports: Clone + 'static;

    /// Evaluate a module's source and capture its exports. Top-level await
    /// settles before this returns.
    async fn evaluate(&self, id: &ModuleId, source: &str) -> Result<Self::Exports, EngineError>;

    /// Call the module's exported `main`, if it has one.
    ///
    /// Returns `None` when the exports expose no callable `main`. `host` is
    /// `None` when the entry point must be called with zero arguments.
    fn invoke_main<'a>(
        &'a self,
        id: &ModuleId,
        exports: Self::Exports,
        host: Option<HostHandle<'a>>,
    ) -> Option<EntryFuture<'a>>;
}
