// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! The native host surface
//!
//! [`NativeHost`] is the capability object handed to the loader and, in raw
//! mode, to a module's entry point. Everything a program can do outside the
//! engine goes through it: reading sources, timers, directories, child
//! processes and stdout.
//!
//! Callback-style primitives must be called from within a
//! [`tokio::task::LocalSet`].

pub mod fs;
pub mod process;
pub mod timers;

pub use fs::{DirHandle, Directories};
pub use process::ProcessExit;
pub use timers::{TimerHandle, Timers};

use crate::error::HostError;
use crate::module_system::{resolver, ModuleId};
use crate::runtime::callback::{adapt, Callback, HostResult};
use std::cell::RefCell;
use std::fmt;
use std::io::{self, Write};
use std::rc::Rc;

/// The native host.
///
/// Clones share one stdout sink, timer table and directory table, so an
/// engine can hand clones to script-facing bindings.
#[derive(Clone)]
pub struct NativeHost {
    args: Vec<String>,
    cwd: ModuleId,
    stdout: Rc<RefCell<Box<dyn Write>>>,
    timers: Timers,
    directories: Directories,
}

impl NativeHost {
    /// Create a host rooted at the process working directory
    pub fn new(args: Vec<String>) -> Result<Self, HostError> {
        let dir = fs::current_dir()?;
        let cwd = ModuleId::from_directory_path(&dir)
            .map_err(|_| HostError::NotAFileUrl(dir.display().to_string()))?;
        Ok(Self::with_cwd(args, cwd))
    }

    /// Create a host with an explicit working directory identifier
    pub fn with_cwd(args: Vec<String>, cwd: ModuleId) -> Self {
        Self {
            args,
            cwd,
            stdout: Rc::new(RefCell::new(Box::new(io::stdout()))),
            timers: Timers::new(),
            directories: Directories::new(),
        }
    }

    /// Send stdout writes to `out` instead of the process stdout
    pub fn with_stdout(mut self, out: impl Write + 'static) -> Self {
        self.stdout = Rc::new(RefCell::new(Box::new(out)));
        self
    }

    /// Program arguments, `args()[0]` being the runtime itself
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Working directory identifier, always ending with `/`
    pub fn cwd(&self) -> &ModuleId {
        &self.cwd
    }

    /// Write text to stdout. Write failures are logged and dropped.
    pub fn write_stdout(&self, text: &str) {
        let mut out = self.stdout.borrow_mut();
        if let Err(e) = out.write_all(text.as_bytes()).and_then(|_| out.flush()) {
            tracing::warn!("failed to write to stdout: {}", e);
        }
    }

    /// Read the source text of a `file:` identifier
    pub fn read_source_sync(&self, id: &ModuleId) -> Result<String, HostError> {
        fs::read_text_file_sync(&fs::file_path(id)?)
    }

    /// Resolve a native path against a directory identifier
    pub fn resolve_file_path(&self, path: &str, base: &ModuleId) -> crate::Result<ModuleId> {
        resolver::resolve_file_path(path, base)
    }

    /// Start a timer; `interval_ms == 0` makes it one-shot
    pub fn start_timer(
        &self,
        delay_ms: u64,
        interval_ms: u64,
        on_fire: impl FnMut() + 'static,
    ) -> TimerHandle {
        self.timers.start(delay_ms, interval_ms, on_fire)
    }

    /// Stop a timer; a no-op if it already fired or was stopped
    pub fn stop_timer(&self, handle: TimerHandle) {
        self.timers.stop(handle)
    }

    /// Open a directory for reading
    pub fn open_directory(&self, id: &ModuleId, on_open: Callback<DirHandle>) {
        self.directories.open(id, on_open)
    }

    /// Read up to `max_count` (at least 1) entry names; an empty page means
    /// the end
    pub fn read_directory(&self, handle: DirHandle, max_count: usize, on_read: Callback<Vec<String>>) {
        self.directories.read(handle, max_count, on_read)
    }

    /// Close a directory handle
    pub fn close_directory(&self, handle: DirHandle, on_close: Callback<()>) {
        self.directories.close(handle, on_close)
    }

    /// Spawn a child process, returning its pid
    pub fn spawn_process(
        &self,
        command: &str,
        args: &[String],
        on_exit: Callback<ProcessExit>,
    ) -> Result<u32, HostError> {
        process::spawn_process(command, args, on_exit)
    }

    /// [`open_directory`](Self::open_directory) as a future
    pub async fn open_directory_async(&self, id: &ModuleId) -> HostResult<DirHandle> {
        adapt(|cb| self.open_directory(id, cb)).await
    }

    /// [`read_directory`](Self::read_directory) as a future
    pub async fn read_directory_async(&self, handle: DirHandle, max_count: usize) -> HostResult<Vec<String>> {
        adapt(|cb| self.read_directory(handle, max_count, cb)).await
    }

    /// [`close_directory`](Self::close_directory) as a future
    pub async fn close_directory_async(&self, handle: DirHandle) -> HostResult<()> {
        adapt(|cb| self.close_directory(handle, cb)).await
    }

    /// Suspend for `ms` milliseconds using a one-shot timer
    pub async fn wait(&self, ms: u64) -> HostResult<()> {
        adapt(|mut cb| {
            self.start_timer(ms, 0, move || cb.call(Ok(())));
        })
        .await
    }

    /// The reduced view passed to entry points in curated mode
    pub fn curated(&self) -> CuratedHost {
        CuratedHost::new(self.cwd.clone(), self.args.clone())
    }
}

impl fmt::Debug for NativeHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeHost")
            .field("args", &self.args)
            .field("cwd", &self.cwd)
            .field("timers", &self.timers.active_count())
            .field("directories", &self.directories.open_count())
            .finish()
    }
}

/// `{ cwd, args }` view of the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CuratedHost {
    cwd: ModuleId,
    args: Vec<String>,
}

impl CuratedHost {
    /// Create a curated view
    pub fn new(cwd: ModuleId, args: Vec<String>) -> Self {
        Self { cwd, args }
    }

    /// Working directory identifier
    pub fn cwd(&self) -> &ModuleId {
        &self.cwd
    }

    /// Program arguments
    pub fn args(&self) -> &[String] {
        &self.args
    }
}

/// The argument a module's `main` receives
#[derive(Debug, Clone)]
pub enum HostHandle<'a> {
    /// The full native host
    Raw(&'a NativeHost),
    /// The curated view
    Curated(CuratedHost),
}

impl HostHandle<'_> {
    /// Working directory, available in both forms
    pub fn cwd(&self) -> &ModuleId {
        match self {
            HostHandle::Raw(host) => host.cwd(),
            HostHandle::Curated(view) => view.cwd(),
        }
    }

    /// Program arguments, available in both forms
    pub fn args(&self) -> &[String] {
        match self {
            HostHandle::Raw(host) => host.args(),
            HostHandle::Curated(view) => view.args(),
        }
    }

    /// The native host, when the handle is raw
    pub fn native(&self) -> Option<&NativeHost> {
        match self {
            HostHandle::Raw(host) => Some(host),
            HostHandle::Curated(_) => None,
        }
    }
}

/// In-memory stdout sink; clones share one buffer
#[derive(Debug, Clone, Default)]
pub struct OutputBuffer(Rc<RefCell<Vec<u8>>>);

impl OutputBuffer {
    /// Create an empty buffer
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything written so far, lossily decoded
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.borrow()).into_owned()
    }
}

impl Write for OutputBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
