// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Module registry - one record per canonical identifier
//!
//! A record moves `Pending → Loading → Ready | Failed` and never goes back.
//! The first `load` of an identifier spawns a local task that fetches and
//! evaluates the module; every caller, the first one included, waits on that
//! task's single outcome. Because the work runs in its own task, dropping a
//! caller's future never strands the record mid-load.
//!
//! The registry must be used from within a [`tokio::task::LocalSet`].

use crate::error::{LoaderError, Result};
use crate::module_system::engine::Engine;
use crate::module_system::resolver::{self, ModuleId};
use crate::module_system::source::SourceProvider;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use tokio::sync::oneshot;
use tracing::{debug, instrument, warn};

type Waiter<X> = oneshot::Sender<Result<X>>;

/// Observable lifecycle state of a module record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleState {
    /// Registered, load task not started yet
    Pending,
    /// Source retrieval or evaluation in flight
    Loading,
    /// Exports available
    Ready,
    /// Terminal failure
    Failed,
}

enum Record<X> {
    Pending(Vec<Waiter<X>>),
    Loading(Vec<Waiter<X>>),
    Ready(X),
    Failed(LoaderError),
}

impl<X> Record<X> {
    fn state(&self) -> ModuleState {
        match self {
            Record::Pending(_) => ModuleState::Pending,
            Record::Loading(_) => ModuleState::Loading,
            Record::Ready(_) => ModuleState::Ready,
            Record::Failed(_) => ModuleState::Failed,
        }
    }
}

struct Inner<E: Engine> {
    records: RefCell<HashMap<ModuleId, Record<E::Exports>>>,
    source: Box<dyn SourceProvider>,
    engine: E,
}

/// Maps module identifiers to module records.
///
/// Cloning the registry yields another handle to the same records.
pub struct Registry<E: Engine> {
    inner: Rc<Inner<E>>,
}

impl<E: Engine> Clone for Registry<E> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<E: Engine> Registry<E> {
    /// Create a registry fetching through `source` and evaluating with `engine`
    pub fn new(source: impl SourceProvider + 'static, engine: E) -> Self {
        Self {
            inner: Rc::new(Inner {
                records: RefCell::new(HashMap::new()),
                source: Box::new(source),
                engine,
            }),
        }
    }

    /// The engine modules are evaluated with
    pub fn engine(&self) -> &E {
        &self.inner.engine
    }

    /// Load a module, fetching and evaluating it at most once.
    ///
    /// Cached exports are returned for a `Ready` record and the recorded
    /// error is re-raised for a `Failed` one. Concurrent loads of the same
    /// identifier share a single fetch and observe the same outcome.
    #[instrument(skip_all, fields(module = %id), level = "debug")]
    pub async fn load(&self, id: &ModuleId) -> Result<E::Exports> {
        let (tx, rx) = oneshot::channel();

        {
            let mut records = self.inner.records.borrow_mut();
            match records.get_mut(id) {
                Some(Record::Ready(exports)) => {
                    debug!("cache hit");
                    return Ok(exports.clone());
                }
                Some(Record::Failed(error)) => {
                    debug!("re-raising terminal failure");
                    return Err(error.clone());
                }
                Some(Record::Pending(waiters)) | Some(Record::Loading(waiters)) => {
                    debug!("attaching waiter #{}", waiters.len() + 1);
                    waiters.push(tx);
                }
                None => {
                    debug!("pending");
                    records.insert(id.clone(), Record::Pending(vec![tx]));
                    tokio::task::spawn_local(Self::fetch_and_evaluate(
                        Rc::clone(&self.inner),
                        id.clone(),
                    ));
                }
            }
        }

        rx.await.unwrap_or_else(|_| {
            Err(LoaderError::Evaluation(format!(
                "load of '{}' was aborted before completing",
                id
            )))
        })
    }

    /// Resolve `specifier` against `base` and load the result
    pub async fn load_specifier(&self, specifier: &str, base: &ModuleId) -> Result<E::Exports> {
        let id = resolver::resolve(specifier, base)?;
        self.load(&id).await
    }

    /// Current state of a record, if one exists
    pub fn state(&self, id: &ModuleId) -> Option<ModuleState> {
        self.inner.records.borrow().get(id).map(Record::state)
    }

    /// Drop a terminal record so the next `load` fetches again.
    ///
    /// Returns `false` when there is nothing to drop or the record is still
    /// pending or loading; in-flight loads cannot be cancelled.
    pub fn invalidate(&self, id: &ModuleId) -> bool {
        let mut records = self.inner.records.borrow_mut();
        match records.get(id).map(Record::state) {
            Some(ModuleState::Ready) | Some(ModuleState::Failed) => {
                records.remove(id);
                debug!(module = %id, "invalidated");
                true
            }
            _ => false,
        }
    }

    /// Identifiers of every record
    pub fn ids(&self) -> Vec<ModuleId> {
        self.inner.records.borrow().keys().cloned().collect()
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.inner.records.borrow().len()
    }

    /// Whether the registry holds no records
    pub fn is_empty(&self) -> bool {
        self.inner.records.borrow().is_empty()
    }

    async fn fetch_and_evaluate(inner: Rc<Inner<E>>, id: ModuleId) {
        {
            let mut records = inner.records.borrow_mut();
            if let Some(Record::Pending(waiters)) = records.get_mut(&id) {
                let waiters = std::mem::take(waiters);
                records.insert(id.clone(), Record::Loading(waiters));
                debug!(module = %id, "loading");
            }
        }

        let outcome = match inner.source.fetch(&id).await {
            Ok(source) => inner
                .engine
                .evaluate(&id, &source)
                .await
                .map_err(|e| e.into_loader_error(LoaderError::Evaluation)),
            Err(error) => Err(error),
        };

        let terminal = match &outcome {
            Ok(exports) => Record::Ready(exports.clone()),
            Err(error) => {
                warn!(module = %id, "load failed: {}", error);
                Record::Failed(error.clone())
            }
        };

        let waiters = {
            let mut records = inner.records.borrow_mut();
            match records.insert(id.clone(), terminal) {
                Some(Record::Pending(waiters)) | Some(Record::Loading(waiters)) => waiters,
                _ => Vec::new(),
            }
        };

        debug!(module = %id, waiters = waiters.len(), "settled");
        for waiter in waiters {
            // A waiter whose caller went away is simply skipped.
            let _ = waiter.send(outcome.clone());
        }
    }
}
