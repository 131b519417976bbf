// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Filesystem primitives: source reads and directory handles

use crate::error::HostError;
use crate::module_system::{resolver, ModuleId};
use crate::runtime::callback::Callback;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tokio::fs::ReadDir;
use tokio::sync::Mutex;

/// Read a UTF-8 text file
pub fn read_text_file_sync(path: &Path) -> Result<String, HostError> {
    let bytes = std::fs::read(path)?;
    String::from_utf8(bytes).map_err(|e| HostError::Io {
        code: "EILSEQ".to_string(),
        message: format!("{}: {}", path.display(), e),
    })
}

/// The process working directory
pub fn current_dir() -> Result<PathBuf, HostError> {
    Ok(std::env::current_dir()?)
}

/// Native path for a `file:` identifier
pub fn file_path(id: &ModuleId) -> Result<PathBuf, HostError> {
    resolver::to_file_path(id).map_err(|_| HostError::NotAFileUrl(id.to_string()))
}

/// Opaque handle to an open directory stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DirHandle(u64);

impl DirHandle {
    /// Rebuild a handle from its raw value. Unknown values fail later with
    /// `BadHandle`.
    pub fn from_id(id: u64) -> Self {
        Self(id)
    }

    /// Raw handle value
    pub fn id(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for DirHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "dir#{}", self.0)
    }
}

#[derive(Default)]
struct DirTable {
    next_id: u64,
    open: HashMap<DirHandle, Rc<Mutex<ReadDir>>>,
}

/// Table of open directory streams.
///
/// Opening and reading complete through callbacks on tasks spawned onto the
/// current `LocalSet`.
#[derive(Clone, Default)]
pub struct Directories {
    table: Rc<RefCell<DirTable>>,
}

impl Directories {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of open handles
    pub fn open_count(&self) -> usize {
        self.table.borrow().open.len()
    }

    /// Open the directory named by a `file:` identifier
    pub fn open(&self, id: &ModuleId, on_open: Callback<DirHandle>) {
        let path = match file_path(id) {
            Ok(path) => path,
            Err(e) => return on_open.complete(Err(e)),
        };

        let table = Rc::clone(&self.table);
        tokio::task::spawn_local(async move {
            let result = match tokio::fs::read_dir(&path).await {
                Ok(stream) => {
                    let mut table = table.borrow_mut();
                    table.next_id += 1;
                    let handle = DirHandle(table.next_id);
                    table.open.insert(handle, Rc::new(Mutex::new(stream)));
                    tracing::debug!("opened {} as {}", path.display(), handle);
                    Ok(handle)
                }
                Err(e) => Err(HostError::from(e)),
            };
            on_open.complete(result);
        });
    }

    /// Read up to `max_count` entry names. An empty page means the stream is
    /// exhausted, so `max_count` must be at least 1.
    pub fn read(&self, handle: DirHandle, max_count: usize, on_read: Callback<Vec<String>>) {
        if max_count == 0 {
            return on_read.complete(Err(HostError::Io {
                code: "EINVAL".to_string(),
                message: "max_count must be at least 1".to_string(),
            }));
        }
        let stream = self.table.borrow().open.get(&handle).cloned();
        let Some(stream) = stream else {
            return on_read.complete(Err(HostError::BadHandle(handle.to_string())));
        };

        tokio::task::spawn_local(async move {
            let mut stream = stream.lock().await;
            let mut names = Vec::new();
            while names.len() < max_count {
                match stream.next_entry().await {
                    Ok(Some(entry)) => names.push(entry.file_name().to_string_lossy().into_owned()),
                    Ok(None) => break,
                    Err(e) => return on_read.complete(Err(e.into())),
                }
            }
            on_read.complete(Ok(names));
        });
    }

    /// Close a handle. Later reads on it fail with `BadHandle`.
    pub fn close(&self, handle: DirHandle, on_close: Callback<()>) {
        let removed = self.table.borrow_mut().open.remove(&handle);
        match removed {
            Some(_) => {
                tracing::debug!("closed {}", handle);
                on_close.complete(Ok(()));
            }
            None => on_close.complete(Err(HostError::BadHandle(handle.to_string()))),
        }
    }
}
