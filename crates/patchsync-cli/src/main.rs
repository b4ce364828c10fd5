//! 🚀 patchsync-cli — the front door: parse flags, wire up logging, run it.
//!
//! 📦 This binary crate is the thin CLI wrapper around `patchsync`: parse
//! the flags, init tracing, resolve and validate the config, synchronize,
//! print a summary table. All the actual work happens in the library.

use anyhow::{Context, Result};
use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use patchsync::config::Cli;
use patchsync::orchestrator::{Orchestrator, OrchestratorConfig};
use patchsync::progress;

/// 🚀 main() — parse, validate, synchronize, report, exit.
fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = Cli::parse()
        .into_config()
        .context("invalid configuration, refusing to touch the filesystem")?;

    let orchestrator = Orchestrator::new(
        config.source_dir,
        config.sink_dir,
        config.publish_url,
        OrchestratorConfig {
            max_batch_size: config.max_files_compressed,
            write_separate_manifest: config.write_separate_manifest,
            move_resources: config.move_resources,
            builder_class: config.builder_class,
        },
    );

    let result = orchestrator.run();

    match result {
        Ok(summary) => {
            println!("{}", progress::render_summary(&summary));
            Ok(())
        }
        Err(err) => {
            error!("synchronization failed: {err}");
            let mut source = std::error::Error::source(&err);
            while let Some(cause) = source {
                error!("caused by: {cause}");
                source = cause.source();
            }
            std::process::exit(1);
        }
    }
}
