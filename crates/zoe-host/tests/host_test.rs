// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Native host primitive integration tests: timers, directories, processes

mod common;

use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;
use tempfile::tempdir;
use tokio::task::LocalSet;
use tokio::time::{sleep, Instant};
use zoe_host::module_system::resolve;
use zoe_host::{adapt, HostError, ModuleId, NativeHost, OutputBuffer};

fn host_in(dir: &std::path::Path) -> NativeHost {
    let cwd = ModuleId::from_directory_path(dir).unwrap();
    NativeHost::with_cwd(common::strings(&["zoe"]), cwd).with_stdout(OutputBuffer::new())
}

fn counter() -> (Rc<Cell<u32>>, impl FnMut() + 'static) {
    let count = Rc::new(Cell::new(0));
    let hits = Rc::clone(&count);
    (count, move || hits.set(hits.get() + 1))
}

#[tokio::test]
async fn test_one_shot_timer_fires_once() {
    LocalSet::new()
        .run_until(async {
            let dir = tempdir().unwrap();
            let host = host_in(dir.path());
            let (count, on_fire) = counter();

            let start = Instant::now();
            host.start_timer(5, 0, on_fire);
            host.wait(20).await.unwrap();
            assert!(start.elapsed() >= Duration::from_millis(5));
            assert_eq!(count.get(), 1);
        })
        .await;
}

#[tokio::test]
async fn test_stopped_timer_never_fires() {
    LocalSet::new()
        .run_until(async {
            let dir = tempdir().unwrap();
            let host = host_in(dir.path());
            let (count, on_fire) = counter();

            let timer = host.start_timer(1, 0, on_fire);
            host.stop_timer(timer);
            host.wait(5).await.unwrap();
            assert_eq!(count.get(), 0);

            // Stopping again, or stopping a timer that already fired, is a no-op.
            host.stop_timer(timer);
        })
        .await;
}

#[tokio::test]
async fn test_repeating_timer_stops_counting() {
    LocalSet::new()
        .run_until(async {
            let dir = tempdir().unwrap();
            let host = Rc::new(host_in(dir.path()));
            let (count, on_fire) = counter();

            let timer = host.start_timer(0, 1, on_fire);
            let stopper = Rc::clone(&host);
            host.start_timer(10, 0, move || stopper.stop_timer(timer));

            host.wait(20).await.unwrap();
            let after_stop = count.get();
            assert!(after_stop > 1, "repeating timer fired {} times", after_stop);

            sleep(Duration::from_millis(10)).await;
            assert_eq!(count.get(), after_stop);
        })
        .await;
}

#[tokio::test]
async fn test_directory_round_trip() {
    LocalSet::new()
        .run_until(async {
            let dir = tempdir().unwrap();
            for name in ["main.js", "util.js", "data.json"] {
                std::fs::write(dir.path().join(name), "").unwrap();
            }
            let host = host_in(dir.path());
            let here = resolve(".", host.cwd()).unwrap();

            let handle = host.open_directory_async(&here).await.unwrap();
            let mut entries = host.read_directory_async(handle, 100).await.unwrap();
            host.close_directory_async(handle).await.unwrap();

            entries.sort();
            assert_eq!(entries, ["data.json", "main.js", "util.js"]);

            let after_close = host.read_directory_async(handle, 100).await;
            assert!(matches!(after_close, Err(HostError::BadHandle(_))));
        })
        .await;
}

#[tokio::test]
async fn test_open_directory_requires_file_url() {
    LocalSet::new()
        .run_until(async {
            let dir = tempdir().unwrap();
            let host = host_in(dir.path());
            let remote = ModuleId::parse("https://server/dir/").unwrap();

            let result = adapt(|cb| host.open_directory(&remote, cb)).await;
            assert!(matches!(result, Err(HostError::NotAFileUrl(_))));
        })
        .await;
}

#[cfg(unix)]
#[tokio::test]
async fn test_spawn_returns_pid_and_reports_exit() {
    LocalSet::new()
        .run_until(async {
            let dir = tempdir().unwrap();
            let host = host_in(dir.path());

            let mut pid = 0;
            let exit = adapt(|cb| {
                pid = host.spawn_process("true", &[], cb).unwrap();
            })
            .await
            .unwrap();

            assert!(pid > 0);
            assert!(exit.success);
            assert_eq!(exit.code, Some(0));
        })
        .await;
}

#[cfg(unix)]
#[tokio::test]
async fn test_spawn_failure_is_synchronous() {
    LocalSet::new()
        .run_until(async {
            let dir = tempdir().unwrap();
            let host = host_in(dir.path());

            let result = adapt(|cb| {
                let spawned = host.spawn_process("zoe-no-such-program", &[], cb);
                assert!(matches!(spawned, Err(HostError::Spawn { .. })));
            })
            .await;

            // The exit callback was dropped unused.
            assert_eq!(result, Err(HostError::CallbackDropped));
        })
        .await;
}
