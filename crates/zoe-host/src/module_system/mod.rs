// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Module system
//!
//! - Specifier resolution to canonical URL identifiers
//! - Source retrieval, dispatched by URL scheme
//! - A registry that loads each identifier at most once
//! - The [`Engine`] seam that turns source into exports

mod engine;
mod registry;
pub mod resolver;
mod source;

pub use engine::{Engine, EngineError, EntryFuture};
pub use registry::{ModuleState, Registry};
pub use resolver::{resolve, resolve_file_path, ModuleId};
pub use source::{FileSourceProvider, SchemeProviders, SourceProvider};
