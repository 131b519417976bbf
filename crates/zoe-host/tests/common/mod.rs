// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Shared fixtures for the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;
use zoe_host::{Engine, EngineError, EntryFuture, HostHandle, LoaderError, ModuleId, SourceProvider};

/// Evaluated module: the source is kept as-is
#[derive(Debug)]
pub struct TestModule {
    pub id: ModuleId,
    pub source: String,
}

impl TestModule {
    pub fn has_main(&self) -> bool {
        self.source.contains("function main")
    }
}

/// Engine that treats any source containing `throw` as a syntax error and
/// any source containing `function main` as exporting an entry point.
#[derive(Clone, Default)]
pub struct TestEngine {
    pub evaluations: Rc<Cell<usize>>,
    pub entries: Rc<RefCell<Vec<String>>>,
}

#[async_trait(?Send)]
impl Engine for TestEngine {
    type Exports = Rc<TestModule>;

    async fn evaluate(&self, id: &ModuleId, source: &str) -> Result<Rc<TestModule>, EngineError> {
        self.evaluations.set(self.evaluations.get() + 1);
        if source.contains("throw") {
            return Err(EngineError::new(format!("SyntaxError: unexpected token in {}", id)));
        }
        Ok(Rc::new(TestModule {
            id: id.clone(),
            source: source.to_string(),
        }))
    }

    fn invoke_main<'a>(
        &'a self,
        _id: &ModuleId,
        exports: Rc<TestModule>,
        host: Option<HostHandle<'a>>,
    ) -> Option<EntryFuture<'a>> {
        if !exports.has_main() {
            return None;
        }

        let entries = Rc::clone(&self.entries);
        Some(Box::pin(async move {
            let kind = match &host {
                Some(HostHandle::Raw(native)) => {
                    native.write_stdout("main called\n");
                    native.wait(1).await.map_err(|e| EngineError::new(e.to_string()))?;
                    "raw".to_string()
                }
                Some(HostHandle::Curated(view)) => format!("curated {}", view.args().join(" ")),
                None => "bare".to_string(),
            };
            entries.borrow_mut().push(kind);
            Ok(())
        }))
    }
}

/// In-memory modules keyed by identifier
#[derive(Default)]
pub struct MemorySource {
    modules: HashMap<String, String>,
    pub fetches: Cell<usize>,
}

impl MemorySource {
    pub fn with(mut self, id: &str, source: &str) -> Self {
        self.modules.insert(id.to_string(), source.to_string());
        self
    }
}

#[async_trait(?Send)]
impl SourceProvider for MemorySource {
    async fn fetch(&self, id: &ModuleId) -> zoe_host::Result<String> {
        self.fetches.set(self.fetches.get() + 1);
        // Give other loads a chance to attach while this one is in flight.
        tokio::task::yield_now().await;
        self.modules
            .get(id.as_str())
            .cloned()
            .ok_or_else(|| LoaderError::NotFound(id.to_string()))
    }
}

pub fn id(s: &str) -> ModuleId {
    ModuleId::parse(s).unwrap()
}

pub fn strings(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}
