//! diskpulse CLI entry point

use anyhow::{Context, Result};
use clap::Parser;
use diskpulse::config::cli::Cli;
use diskpulse::config::toml::{merge_cli_with_config, parse_toml_file};
use diskpulse::config::validator::prepare_config;
use diskpulse::context::RunContext;
use diskpulse::coordinator::Coordinator;
use diskpulse::device::file::FileOpener;
use diskpulse::output::{json, text};
use diskpulse::TestConfig;
use std::sync::Arc;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match run() {
        Ok(true) => std::process::exit(0),
        Ok(false) => std::process::exit(1),
        Err(e) => {
            log::error!("{:#}", e);
            std::process::exit(1);
        }
    }
}

/// Returns whether the test passed
fn run() -> Result<bool> {
    println!("diskpulse v{}", env!("CARGO_PKG_VERSION"));

    let cli = Cli::parse();
    let config = build_config(&cli)?;

    let ctx = Arc::new(RunContext::new(config.flags.kill_all));
    let handler_ctx = Arc::clone(&ctx);
    ctrlc::set_handler(move || {
        log::warn!("Interrupted, finishing in-flight operations");
        handler_ctx.request_stop();
    })
    .context("Failed to install Ctrl-C handler")?;

    let json_output = config.json_output.clone();
    let mut coordinator = Coordinator::new(config, ctx, Arc::new(FileOpener));
    let summary = coordinator.run()?;

    text::print_summary(&summary);
    if let Some(path) = json_output {
        json::write_json_output(&path, &summary, true)?;
        log::info!("JSON summary written to {}", path.display());
    }

    Ok(summary.passed)
}

fn build_config(cli: &Cli) -> Result<TestConfig> {
    let base = match &cli.config {
        Some(path) => parse_toml_file(path)?,
        None => TestConfig {
            threads: num_cpus::get(),
            ..Default::default()
        },
    };

    let mut config = merge_cli_with_config(cli, base)?;
    config.invocation = std::env::args().collect::<Vec<_>>().join(" ");

    prepare_config(config).context("Configuration validation failed")
}
