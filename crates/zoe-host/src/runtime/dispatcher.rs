// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Program entry: load the target module and call its `main`

use crate::config::{Config, EntryMode};
use crate::error::{LoaderError, Result};
use crate::host::{CuratedHost, HostHandle, NativeHost};
use crate::module_system::{resolver, Engine, ModuleId, Registry};
use tracing::{debug, info, instrument};

/// What a [`EntryDispatcher::run`] call did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// No target was given; usage text was printed
    Usage,
    /// The target module loaded
    Completed {
        /// Identifier of the entry module
        module: ModuleId,
        /// Whether the module exported a `main` that was called
        entry_invoked: bool,
    },
}

/// Drives a single program run
pub struct EntryDispatcher<E: Engine> {
    registry: Registry<E>,
    config: Config,
}

impl<E: Engine> EntryDispatcher<E> {
    /// Create a dispatcher over `registry`
    pub fn new(registry: Registry<E>, config: Config) -> Self {
        Self { registry, config }
    }

    /// The registry modules are loaded through
    pub fn registry(&self) -> &Registry<E> {
        &self.registry
    }

    /// Active configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run the program named by `args[1]`.
    ///
    /// With no target, usage text goes to the host's stdout and nothing is
    /// loaded. Load failures are returned unchanged, as are imports that
    /// fail while `main` runs; any other failure of `main` is reported as
    /// [`LoaderError::EntryFailed`].
    #[instrument(skip_all, fields(mode = %self.config.entry_mode))]
    pub async fn run(&self, args: &[String], cwd: &ModuleId, host: &NativeHost) -> Result<RunOutcome> {
        let Some(target) = args.get(1) else {
            debug!("no entry module given");
            host.write_stdout(&self.config.usage());
            return Ok(RunOutcome::Usage);
        };

        let id = resolver::resolve_file_path(target, cwd)?;
        info!(module = %id, "running entry module");
        let exports = self.registry.load(&id).await?;

        let handle = match self.config.entry_mode {
            EntryMode::Raw => Some(HostHandle::Raw(host)),
            EntryMode::Curated => Some(HostHandle::Curated(CuratedHost::new(
                cwd.clone(),
                args.to_vec(),
            ))),
            EntryMode::Bare => None,
        };

        let Some(entry) = self.registry.engine().invoke_main(&id, exports, handle) else {
            debug!(module = %id, "no main export");
            return Ok(RunOutcome::Completed {
                module: id,
                entry_invoked: false,
            });
        };

        entry.await.map_err(|e| {
            e.into_loader_error(|message| LoaderError::EntryFailed {
                module: id.to_string(),
                message,
            })
        })?;

        debug!(module = %id, "main completed");
        Ok(RunOutcome::Completed {
            module: id,
            entry_invoked: true,
        })
    }
}
