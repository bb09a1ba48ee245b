// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Lodestar CLI - dynamic module-loading runtime for the Lodestar script
//! language

mod repl;

use clap::Parser;
use lodestar_runtime::{FsReader, PackageRegistry, Runtime, RuntimeOptions, VERSION};
use owo_colors::OwoColorize;
use std::path::PathBuf;
use std::rc::Rc;

#[derive(Parser)]
#[command(
    name = "lodestar",
    about = "Dynamic module-loading runtime powered by the Lodestar script engine",
    version = VERSION,
    author = "Pegasus Heavy Industries"
)]
struct Cli {
    /// Module identifier to load; its exported bindings are printed
    identifier: Option<String>,

    /// Evaluate script source from the command line
    #[arg(short = 'e', long = "eval")]
    eval: Option<String>,

    /// Start interactive REPL
    #[arg(short = 'i', long = "interactive", alias = "repl")]
    interactive: bool,

    /// Registry manifest mapping identifier prefixes to packages
    #[arg(long, default_value = "lodestar.json")]
    registry: PathBuf,

    /// Directory module locations are read from
    #[arg(long, default_value = ".")]
    root: PathBuf,

    /// Enable verbose logging
    #[arg(long)]
    verbose: bool,
}

/// The runtime's scheduling model is single-threaded and cooperative, so
/// everything runs on a current-thread tokio runtime.
#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    if cli.verbose {
        tracing_subscriber::fmt()
            .with_env_filter("lodestar=debug,lodestar_runtime=debug,lodestar_script=debug")
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter("lodestar_runtime=warn")
            .init();
    }

    if let Some(source) = &cli.eval {
        return eval_inline(source);
    }

    if !cli.interactive {
        if let Some(identifier) = cli.identifier.clone() {
            return run_module(&cli, &identifier).await;
        }
    }

    // Interactive session, either requested or the no-argument default
    let runtime = build_runtime(&cli)?;
    repl::Repl::new(runtime)?.run().await
}

/// Evaluates `-e/--eval` source in a bare engine.
fn eval_inline(source: &str) -> anyhow::Result<()> {
    let mut engine = lodestar_script::Engine::new();
    match engine.eval(source) {
        Ok(value) => {
            if !value.is_undefined() {
                println!("{value}");
            }
            Ok(())
        }
        Err(error) => {
            eprintln!("{}: {}", "Error".red().bold(), error);
            std::process::exit(1);
        }
    }
}

/// Loads one module through the runtime and prints its bindings.
async fn run_module(cli: &Cli, identifier: &str) -> anyhow::Result<()> {
    let runtime = build_runtime(cli)?;
    match runtime.load_module(identifier).await {
        Ok(bindings) => {
            println!("{bindings}");
            Ok(())
        }
        Err(error) => {
            eprintln!("{}: {}", "Error".red().bold(), error);
            std::process::exit(1);
        }
    }
}

/// Assembles a runtime from the CLI's registry manifest and root.
fn build_runtime(cli: &Cli) -> anyhow::Result<Runtime> {
    let registry = match std::fs::read_to_string(&cli.registry) {
        Ok(json) => PackageRegistry::from_manifest(&json)?,
        Err(_) => {
            eprintln!(
                "{}: registry manifest '{}' not found, starting with an empty registry",
                "Warning".yellow().bold(),
                cli.registry.display()
            );
            PackageRegistry::new()
        }
    };

    let options = RuntimeOptions::new(registry)
        .with_storage(Rc::new(FsReader::new(&cli.root)));
    Ok(Runtime::new(options))
}
