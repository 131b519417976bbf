// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! One-shot and repeating timers
//!
//! Each timer is a task on the current `LocalSet`. Stopping a timer aborts
//! its task, so a stopped timer never fires again.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Unique identifier for a timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerHandle(u64);

impl TimerHandle {
    /// Rebuild a handle from its raw value
    pub fn from_id(id: u64) -> Self {
        Self(id)
    }

    /// Raw handle value
    pub fn id(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TimerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "timer#{}", self.0)
    }
}

#[derive(Default)]
struct TimerTable {
    next_id: u64,
    active: HashMap<TimerHandle, JoinHandle<()>>,
}

impl Drop for TimerTable {
    fn drop(&mut self) {
        for (_, task) in self.active.drain() {
            task.abort();
        }
    }
}

/// The set of running timers
#[derive(Clone, Default)]
pub struct Timers {
    table: Rc<RefCell<TimerTable>>,
}

impl Timers {
    /// Create an empty timer set
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a timer that first fires after `delay_ms`.
    ///
    /// With `interval_ms == 0` the timer fires once; otherwise it keeps
    /// firing every `interval_ms` until stopped.
    pub fn start(
        &self,
        delay_ms: u64,
        interval_ms: u64,
        mut on_fire: impl FnMut() + 'static,
    ) -> TimerHandle {
        let handle = {
            let mut table = self.table.borrow_mut();
            table.next_id += 1;
            TimerHandle(table.next_id)
        };

        let table = Rc::downgrade(&self.table);
        let task = tokio::task::spawn_local(async move {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;

            if interval_ms == 0 {
                if let Some(table) = table.upgrade() {
                    table.borrow_mut().active.remove(&handle);
                }
                tracing::trace!("{} fired", handle);
                on_fire();
                return;
            }

            let interval = Duration::from_millis(interval_ms);
            loop {
                tracing::trace!("{} fired", handle);
                on_fire();
                tokio::time::sleep(interval).await;
            }
        });

        self.table.borrow_mut().active.insert(handle, task);
        tracing::debug!("started {} (delay {}ms, interval {}ms)", handle, delay_ms, interval_ms);
        handle
    }

    /// Stop a timer. Stopping a fired or already stopped timer does nothing.
    pub fn stop(&self, handle: TimerHandle) {
        let task = self.table.borrow_mut().active.remove(&handle);
        if let Some(task) = task {
            task.abort();
            tracing::debug!("stopped {}", handle);
        }
    }

    /// Number of timers that may still fire
    pub fn active_count(&self) -> usize {
        self.table.borrow().active.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use tokio::task::LocalSet;
    use tokio::time::sleep;

    fn counter() -> (Rc<Cell<u32>>, impl FnMut() + 'static) {
        let count = Rc::new(Cell::new(0));
        let hits = Rc::clone(&count);
        (count, move || hits.set(hits.get() + 1))
    }

    #[tokio::test]
    async fn test_one_shot_fires_once() {
        LocalSet::new()
            .run_until(async {
                let timers = Timers::new();
                let (count, on_fire) = counter();
                timers.start(1, 0, on_fire);

                sleep(Duration::from_millis(20)).await;
                assert_eq!(count.get(), 1);
                assert_eq!(timers.active_count(), 0);
            })
            .await;
    }

    #[tokio::test]
    async fn test_stop_is_idempotent() {
        LocalSet::new()
            .run_until(async {
                let timers = Timers::new();
                let (count, on_fire) = counter();
                let handle = timers.start(1, 0, on_fire);
                timers.stop(handle);
                timers.stop(handle);

                sleep(Duration::from_millis(10)).await;
                assert_eq!(count.get(), 0);
            })
            .await;
    }

    #[tokio::test]
    async fn test_dropping_timers_aborts_tasks() {
        LocalSet::new()
            .run_until(async {
                let (count, on_fire) = counter();
                {
                    let timers = Timers::new();
                    timers.start(1, 1, on_fire);
                }
                sleep(Duration::from_millis(10)).await;
                assert_eq!(count.get(), 0);
            })
            .await;
    }
}
