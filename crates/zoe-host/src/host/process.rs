// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Child process spawning

use crate::error::HostError;
use crate::runtime::callback::Callback;
use tokio::process::Command;

/// How a child process ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessExit {
    /// Exit code, `None` when the process was killed by a signal
    pub code: Option<i32>,
    /// Whether the process exited successfully
    pub success: bool,
}

/// Spawn `command` with `args` and report its exit through `on_exit`.
///
/// `args` does not include the program name. The child inherits the
/// standard streams. Returns the child's process id; a failure to start is
/// returned here and `on_exit` is never called.
pub fn spawn_process(
    command: &str,
    args: &[String],
    on_exit: Callback<ProcessExit>,
) -> Result<u32, HostError> {
    let spawn_error = |message: String| HostError::Spawn {
        command: command.to_string(),
        message,
    };

    let mut child = Command::new(command)
        .args(args)
        .spawn()
        .map_err(|e| spawn_error(e.to_string()))?;

    let pid = child
        .id()
        .ok_or_else(|| spawn_error("child exited before its id was read".to_string()))?;
    tracing::debug!("spawned '{}' as pid {}", command, pid);

    tokio::task::spawn_local(async move {
        let result = child
            .wait()
            .await
            .map(|status| ProcessExit {
                code: status.code(),
                success: status.success(),
            })
            .map_err(HostError::from);

        if let Ok(exit) = &result {
            tracing::debug!("pid {} exited with {:?}", pid, exit.code);
        }
        on_exit.complete(result);
    });

    Ok(pid)
}
