// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! zoe CLI - run a JavaScript module and call its `main`

mod engine;

use clap::Parser;
use engine::QuickJsEngine;
use owo_colors::OwoColorize;
use std::process::ExitCode;
use std::rc::Rc;
use tokio::task::LocalSet;
use tracing_subscriber::EnvFilter;
use zoe_host::{Config, EntryDispatcher, EntryMode, NativeHost, Registry, SchemeProviders, VERSION};

#[derive(Parser)]
#[command(
    name = "zoe",
    about = "A small JavaScript host",
    version = VERSION,
    author = "Pegasus Heavy Industries"
)]
struct Cli {
    /// JavaScript module to run
    script: Option<String>,

    /// What the module's `main` receives
    #[arg(long, value_name = "raw|curated|bare")]
    entry_mode: Option<EntryMode>,

    /// Enable verbose logging
    #[arg(long)]
    verbose: bool,

    /// Arguments passed to the module
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<String>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "zoe=debug,zoe_host=debug"
    } else {
        "zoe=warn,zoe_host=warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    let local = LocalSet::new();
    match local.run_until(run(cli)).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}: {:#}", "Error".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = Config::load()?;
    if let Some(mode) = cli.entry_mode {
        config.entry_mode = mode;
    }

    let argv0 = std::env::args().next().unwrap_or_else(|| config.runtime_name.clone());
    let args: Vec<String> = std::iter::once(argv0)
        .chain(cli.script)
        .chain(cli.args)
        .collect();

    let host = NativeHost::new(args.clone())?;
    // Entry modules and the imports inside them share one set of providers.
    let providers = Rc::new(SchemeProviders::with_defaults());
    let engine = QuickJsEngine::new(providers.clone()).await?;
    let registry = Registry::new(providers, engine);
    let dispatcher = EntryDispatcher::new(registry, config);

    let outcome = dispatcher.run(&args, host.cwd(), &host).await?;
    tracing::debug!("run finished: {:?}", outcome);
    Ok(())
}
