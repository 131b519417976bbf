// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! QuickJS-backed engine for the `zoe` binary
//!
//! Entry modules are evaluated through the host registry. Imports inside
//! them are resolved with the same URL rules and fetched through the
//! registry's source providers, so a remote import fails with the same
//! `UnsupportedScheme` error a remote entry module would.
//!
//! `main` and everything it starts run on the async QuickJS runtime, driven
//! by the caller's `LocalSet`. In raw mode the object passed to `main`
//! exposes the native host; its callback primitives take a Node-style
//! `(err, result)` callback.

use anyhow::Context as _;
use rquickjs::convert::Coerced;
use rquickjs::loader::{Loader, Resolver};
use rquickjs::promise::MaybePromise;
use rquickjs::{
    async_with, AsyncContext, AsyncRuntime, CatchResultExt, CaughtError, Ctx, Exception, Function, IntoJs,
    Module, Object, Persistent, Value,
};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt::Display;
use std::rc::Rc;
use tokio::sync::{mpsc, oneshot};
use zoe_host::host::{DirHandle, ProcessExit, TimerHandle};
use zoe_host::module_system::resolve;
use zoe_host::{
    Callback, Engine, EngineError, EntryFuture, HostError, HostHandle, LoaderError, ModuleId, NativeHost,
    SourceProvider,
};

/// Handle to a module evaluated by [`QuickJsEngine`]
#[derive(Debug, Clone)]
pub struct JsModule {
    id: Rc<ModuleId>,
}

/// Last import the loader failed on, with the resolved name it was asked for
type ImportFailure = Rc<RefCell<Option<(String, LoaderError)>>>;

/// The QuickJS engine
pub struct QuickJsEngine {
    // Declared first so saved functions are released before the context.
    mains: RefCell<HashMap<ModuleId, Persistent<Function<'static>>>>,
    import_failure: ImportFailure,
    context: AsyncContext,
    runtime: AsyncRuntime,
}

impl QuickJsEngine {
    /// Create a runtime whose imports are fetched through `source`
    pub async fn new(source: Rc<dyn SourceProvider>) -> anyhow::Result<Self> {
        let runtime = AsyncRuntime::new().context("Unable to initialize the QuickJS runtime")?;
        let context = AsyncContext::full(&runtime)
            .await
            .context("Unable to create a JS context")?;

        let import_failure = ImportFailure::default();
        let loader = ImportLoader {
            source,
            failure: Rc::clone(&import_failure),
        };
        runtime.set_loader(loader.clone(), loader).await;

        Ok(Self {
            mains: RefCell::new(HashMap::new()),
            import_failure,
            context,
            runtime,
        })
    }

    /// Map a caught exception to an engine error, keeping the loader error
    /// when the exception came from a failed import
    fn engine_error(&self, error: CaughtError<'_>) -> EngineError {
        let message = error.to_string();
        match self.import_failure.borrow_mut().take() {
            Some((name, failure)) if message.contains(&name) => EngineError::from_loader(failure),
            _ => EngineError::new(message),
        }
    }
}

impl Drop for QuickJsEngine {
    fn drop(&mut self) {
        // Persistent values must not outlive the runtime.
        self.mains.borrow_mut().clear();
    }
}

#[async_trait::async_trait(?Send)]
impl Engine for QuickJsEngine {
    type Exports = JsModule;

    async fn evaluate(&self, id: &ModuleId, source: &str) -> Result<JsModule, EngineError> {
        let engine = self;
        engine.import_failure.borrow_mut().take();
        let name = id.to_string();
        let source = source.to_string();

        let main = async_with!(engine.context => |ctx| {
            let evaluated = async {
                let module = Module::declare(ctx.clone(), name, source)?;
                let (module, promise) = module.eval()?;
                promise.into_future::<()>().await?;

                let main: Value = module.get("main")?;
                Ok::<_, rquickjs::Error>(main.into_function().map(|func| Persistent::save(&ctx, func)))
            }
            .await;
            evaluated.catch(&ctx).map_err(|e| engine.engine_error(e))
        })
        .await?;

        if let Some(main) = main {
            self.mains.borrow_mut().insert(id.clone(), main);
        }
        Ok(JsModule {
            id: Rc::new(id.clone()),
        })
    }

    fn invoke_main<'a>(
        &'a self,
        _id: &ModuleId,
        exports: JsModule,
        host: Option<HostHandle<'a>>,
    ) -> Option<EntryFuture<'a>> {
        let main = self.mains.borrow().get(exports.id.as_ref()).cloned()?;

        Some(Box::pin(async move {
            self.import_failure.borrow_mut().take();

            async_with!(self.context => |ctx| {
                let called = async {
                    let func = main.restore(&ctx)?;
                    let returned: MaybePromise = match &host {
                        Some(handle) => func.call((host_object(&ctx, handle)?,))?,
                        None => func.call(())?,
                    };
                    returned.into_future::<Value>().await?;
                    Ok::<_, rquickjs::Error>(())
                }
                .await;
                called.catch(&ctx).map_err(|e| self.engine_error(e))
            })
            .await?;

            // Timers, directory reads and child processes started by `main`
            // keep the program alive until they settle.
            self.runtime.idle().await;
            Ok(())
        }))
    }
}

/// Build the object passed to `main`.
///
/// Both forms carry `cwd` and `args`; the raw form adds the native host.
fn host_object<'js>(ctx: &Ctx<'js>, handle: &HostHandle<'_>) -> rquickjs::Result<Object<'js>> {
    let obj = Object::new(ctx.clone())?;
    obj.set("cwd", handle.cwd().as_str())?;
    obj.set("args", handle.args().to_vec())?;

    if let Some(native) = handle.native() {
        bind_native(ctx, &obj, native)?;
    }
    Ok(obj)
}

fn bind_native<'js>(ctx: &Ctx<'js>, obj: &Object<'js>, native: &NativeHost) -> rquickjs::Result<()> {
    let host = native.clone();
    obj.set(
        "stdout",
        Function::new(ctx.clone(), move |text: Coerced<String>| host.write_stdout(&text.0))?,
    )?;

    obj.set(
        "resolveURL",
        Function::new(ctx.clone(), |ctx: Ctx<'js>, specifier: String, base: String| {
            ModuleId::parse(&base)
                .and_then(|base| resolve(&specifier, &base))
                .map(|id| id.to_string())
                .map_err(|e| throw(&ctx, e))
        })?,
    )?;

    let host = native.clone();
    obj.set(
        "resolveFilePath",
        Function::new(ctx.clone(), move |ctx: Ctx<'js>, path: String, base: String| {
            ModuleId::parse(&base)
                .and_then(|base| host.resolve_file_path(&path, &base))
                .map(|id| id.to_string())
                .map_err(|e| throw(&ctx, e))
        })?,
    )?;

    let host = native.clone();
    obj.set(
        "readSourceSync",
        Function::new(ctx.clone(), move |ctx: Ctx<'js>, url: String| {
            let id = ModuleId::parse(&url).map_err(|e| throw(&ctx, e))?;
            host.read_source_sync(&id).map_err(|e| throw(&ctx, e))
        })?,
    )?;

    let host = native.clone();
    obj.set(
        "startTimer",
        Function::new(
            ctx.clone(),
            move |ctx: Ctx<'js>, delay: f64, interval: f64, callback: Function<'js>| {
                let (tx, mut rx) = mpsc::unbounded_channel();
                let handle = host.start_timer(delay as u64, interval as u64, move || {
                    let _ = tx.send(());
                });

                // Ends once the timer fired for the last time or was stopped,
                // both of which drop `tx`.
                let task_ctx = ctx.clone();
                ctx.spawn(async move {
                    while rx.recv().await.is_some() {
                        if let Err(e) = callback.call::<_, Value>(()).catch(&task_ctx) {
                            tracing::warn!("timer callback threw: {}", e);
                        }
                    }
                });
                handle.id() as f64
            },
        )?,
    )?;

    let host = native.clone();
    obj.set(
        "stopTimer",
        Function::new(ctx.clone(), move |handle: f64| {
            host.stop_timer(TimerHandle::from_id(handle as u64))
        })?,
    )?;

    let host = native.clone();
    obj.set(
        "openDirectory",
        Function::new(
            ctx.clone(),
            move |ctx: Ctx<'js>, url: String, callback: Function<'js>| -> rquickjs::Result<()> {
                let id = ModuleId::parse(&url).map_err(|e| throw(&ctx, e))?;
                let on_open = js_callback(&ctx, callback, |ctx, dir: DirHandle| {
                    (dir.id() as f64).into_js(ctx)
                });
                host.open_directory(&id, on_open);
                Ok(())
            },
        )?,
    )?;

    let host = native.clone();
    obj.set(
        "readDirectory",
        Function::new(
            ctx.clone(),
            move |ctx: Ctx<'js>, dir: f64, max_count: f64, callback: Function<'js>| {
                let on_read = js_callback(&ctx, callback, |ctx, names: Vec<String>| names.into_js(ctx));
                host.read_directory(DirHandle::from_id(dir as u64), max_count as usize, on_read);
            },
        )?,
    )?;

    let host = native.clone();
    obj.set(
        "closeDirectory",
        Function::new(ctx.clone(), move |ctx: Ctx<'js>, dir: f64, callback: Function<'js>| {
            let on_close = js_callback(&ctx, callback, |ctx, ()| Ok(Value::new_undefined(ctx.clone())));
            host.close_directory(DirHandle::from_id(dir as u64), on_close);
        })?,
    )?;

    let host = native.clone();
    obj.set(
        "spawnProcess",
        Function::new(
            ctx.clone(),
            move |ctx: Ctx<'js>, command: String, args: Vec<String>, callback: Function<'js>| {
                let on_exit = js_callback(&ctx, callback, |ctx, exit: ProcessExit| {
                    let result = Object::new(ctx.clone())?;
                    result.set("code", exit.code)?;
                    result.set("success", exit.success)?;
                    Ok(result.into_value())
                });
                host.spawn_process(&command, &args, on_exit)
                    .map_err(|e| throw(&ctx, e))
            },
        )?,
    )?;

    Ok(())
}

/// A host callback that calls `callback(err, result)` on the JS side.
///
/// The result travels through a oneshot to a future spawned on the context,
/// so the JS function only ever runs while the runtime is locked. A host
/// callback dropped uncalled never reaches JS.
fn js_callback<'js, T, F>(ctx: &Ctx<'js>, callback: Function<'js>, convert: F) -> Callback<T>
where
    T: 'static,
    F: FnOnce(&Ctx<'js>, T) -> rquickjs::Result<Value<'js>> + 'js,
{
    let (tx, rx) = oneshot::channel();
    let task_ctx = ctx.clone();
    ctx.spawn(async move {
        let Ok(result) = rx.await else {
            tracing::debug!("host callback dropped before completion");
            return;
        };

        let args = match result {
            Ok(value) => convert(&task_ctx, value).map(|value| (Value::new_null(task_ctx.clone()), value)),
            Err(error) => host_error(&task_ctx, &error).map(|error| (error, Value::new_undefined(task_ctx.clone()))),
        };
        let called = args.and_then(|args| callback.call::<_, Value>(args));
        if let Err(e) = called.catch(&task_ctx) {
            tracing::warn!("host callback threw: {}", e);
        }
    });

    Callback::new(move |result| {
        let _ = tx.send(result);
    })
}

/// JS `Error` for a host failure; OS errors carry their code as `err.code`
fn host_error<'js>(ctx: &Ctx<'js>, error: &HostError) -> rquickjs::Result<Value<'js>> {
    let exception = Exception::from_message(ctx.clone(), &error.to_string())?.into_object();
    if let HostError::Io { code, .. } = error {
        exception.set("code", code.as_str())?;
    }
    Ok(exception.into_value())
}

fn throw(ctx: &Ctx<'_>, error: impl Display) -> rquickjs::Error {
    Exception::throw_message(ctx, &error.to_string())
}

/// Resolves imports with the host's URL rules and fetches them through the
/// registry's source providers
#[derive(Clone)]
struct ImportLoader {
    source: Rc<dyn SourceProvider>,
    failure: ImportFailure,
}

impl ImportLoader {
    fn fail(&self, name: &str, error: LoaderError) -> String {
        let message = error.to_string();
        *self.failure.borrow_mut() = Some((name.to_string(), error));
        message
    }
}

impl Resolver for ImportLoader {
    fn resolve(&mut self, _ctx: &Ctx<'_>, base: &str, name: &str) -> rquickjs::Result<String> {
        ModuleId::parse(base)
            .and_then(|base_id| resolve(name, &base_id))
            .map(|id| id.to_string())
            .map_err(|e| rquickjs::Error::new_resolving_message(base, name, self.fail(name, e)))
    }
}

impl Loader for ImportLoader {
    fn load<'js>(&mut self, ctx: &Ctx<'js>, name: &str) -> rquickjs::Result<Module<'js>> {
        let source = ModuleId::parse(name)
            .and_then(|id| self.source.fetch_sync(&id))
            .map_err(|e| rquickjs::Error::new_loading_message(name, self.fail(name, e)))?;
        tracing::debug!("loaded import {}", name);
        Module::declare(ctx.clone(), name, source)
    }
}
