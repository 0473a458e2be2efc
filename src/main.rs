use std::io;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use canopy::{Flags, MnistSource, TensorForestBuilder, TrainConfig, train_and_eval};

fn main() -> Result<()> {
    let flags = Flags::parse();

    tracing_subscriber::fmt()
        .with_env_filter(flags.log_filter())
        .with_writer(std::io::stderr)
        .init();

    // Configure Rayon thread pool
    if let Some(threads) = flags.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("failed to configure thread pool")?;
        info!(threads, "thread pool configured");
    }

    let config = TrainConfig::from(flags);
    let mut out = io::stdout().lock();
    train_and_eval(&config, &MnistSource::default(), &TensorForestBuilder, &mut out)?;
    Ok(())
}
