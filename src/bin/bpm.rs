// src/bin/bpm.rs

use anyhow::Result;
use bpm::{
    cli::Cli,
    core::{config_loader, resolver},
    system::{
        console::{self, OutputSink, StdoutSink},
        executor::{ExecutionError, Orchestrator},
        interrupt,
    },
};
use clap::Parser;
use std::sync::Arc;

/// Sets up logging, runs the request and maps the outcome to an exit code.
fn main() {
    env_logger::init();

    if let Err(e) = run_cli(Cli::parse()) {
        // The interrupt notice and teardown lines have already been printed.
        if matches!(e.downcast_ref::<ExecutionError>(), Some(ExecutionError::Interrupted)) {
            std::process::exit(1);
        }
        eprintln!("{}", console::error_line(&format!("{e:#}")));
        std::process::exit(1);
    }
}

#[tokio::main]
async fn run_cli(cli: Cli) -> Result<()> {
    log::debug!("CLI args parsed: {:?}", cli);

    let sink = Arc::new(StdoutSink);
    let loaded = config_loader::load(cli.config.as_deref())?;
    sink.info(&format!("Using '{}'", loaded.path.display()));

    let invocation = resolver::resolve(&loaded.registry, &cli.request())?;
    if let Some(warning) = invocation.partial_args_warning() {
        sink.warn(&warning);
    }

    let token = interrupt::new_token();
    interrupt::listen_for_interrupt(Arc::clone(&token));

    let summary = Orchestrator::new(sink).run(&invocation, &token).await?;
    log::debug!(
        "{} action(s) finished, all succeeded: {}",
        summary.results.len(),
        summary.all_succeeded()
    );
    Ok(())
}
