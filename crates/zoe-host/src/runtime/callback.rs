// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Callback-to-future adaptation for host primitives
//!
//! Host primitives report completion through a [`Callback`]. [`adapt`] turns
//! any such primitive into a future that resolves once, with the first
//! result the primitive reports.
//!
//! Host primitives must call their callback exactly once. Extra calls are
//! ignored; a callback dropped without being called fails the adapted future
//! with [`HostError::CallbackDropped`].

use crate::error::HostError;
use std::fmt;
use tokio::sync::oneshot;

/// Result delivered to a host callback
pub type HostResult<T> = std::result::Result<T, HostError>;

/// Completion callback handed to a host primitive
pub struct Callback<T> {
    func: Option<Box<dyn FnOnce(HostResult<T>)>>,
}

impl<T> Callback<T> {
    /// Wrap a completion function
    pub fn new(func: impl FnOnce(HostResult<T>) + 'static) -> Self {
        Self {
            func: Some(Box::new(func)),
        }
    }

    /// Deliver a result. Only the first call has any effect.
    pub fn call(&mut self, result: HostResult<T>) {
        match self.func.take() {
            Some(func) => func(result),
            None => tracing::trace!("host callback called more than once; ignoring"),
        }
    }

    /// Deliver a result, consuming the callback
    pub fn complete(mut self, result: HostResult<T>) {
        self.call(result);
    }

    /// Whether the callback has already been used
    pub fn is_spent(&self) -> bool {
        self.func.is_none()
    }
}

impl<T> fmt::Debug for Callback<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callback")
            .field("spent", &self.is_spent())
            .finish()
    }
}

/// Run a callback-style host primitive and wait for its single result.
///
/// ```rust,ignore
/// let dir = adapt(|cb| host.open_directory(&id, cb)).await?;
/// ```
///
/// No timeout is applied; wrap the returned future in
/// `tokio::time::timeout` when bounded waiting is needed.
pub async fn adapt<T, F>(host_fn: F) -> HostResult<T>
where
    T: 'static,
    F: FnOnce(Callback<T>),
{
    let (tx, rx) = oneshot::channel();
    host_fn(Callback::new(move |result| {
        let _ = tx.send(result);
    }));
    rx.await.unwrap_or(Err(HostError::CallbackDropped))
}
