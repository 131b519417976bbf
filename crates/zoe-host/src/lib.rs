// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! # zoe-host
//!
//! Host bridge and module loader for the zoe scripting runtime.
//!
//! This crate sits between a scripting engine and the operating system:
//!
//! - URL-based module resolution (`file:` identifiers, WHATWG joining)
//! - A module registry that fetches and evaluates each module at most once
//! - A callback adapter turning host primitives into futures
//! - The native host surface: timers, directories, child processes, stdout
//! - An entry dispatcher that loads a program and calls its `main`
//!
//! The engine itself is pluggable through [`Engine`].
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use zoe_host::{Config, EntryDispatcher, NativeHost, Registry, SchemeProviders};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> anyhow::Result<()> {
//!     let local = tokio::task::LocalSet::new();
//!     local
//!         .run_until(async {
//!             let args: Vec<String> = std::env::args().collect();
//!             let host = NativeHost::new(args.clone())?;
//!             let registry = Registry::new(SchemeProviders::with_defaults(), MyEngine::new());
//!             let dispatcher = EntryDispatcher::new(registry, Config::load()?);
//!             dispatcher.run(&args, host.cwd(), &host).await?;
//!             Ok(())
//!         })
//!         .await
//! }
//! ```
//!
//! Everything here is single-threaded: state is shared through `Rc` and
//! host tasks run on the current [`tokio::task::LocalSet`].

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod host;
pub mod module_system;
pub mod runtime;

// Re-exports
pub use config::{Config, EntryMode};
pub use error::{ConfigError, HostError, LoaderError, Result};
pub use host::{CuratedHost, HostHandle, NativeHost, OutputBuffer};
pub use module_system::{
    Engine, EngineError, EntryFuture, FileSourceProvider, ModuleId, ModuleState, Registry,
    SchemeProviders, SourceProvider,
};
pub use runtime::{adapt, Callback, EntryDispatcher, HostResult, RunOutcome};

/// Version of the zoe host
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
