//! 'main' for the timestamp chain node

use anyhow::{Context, Result};
use clap::Parser;
use config::{Config, Environment, File};
use std::sync::Arc;
use tracing::{error, info};

use timestampvm_module_chain_vm::{BlockData, ChainContext, DATA_LEN};

#[derive(Debug, clap::Parser)]
#[command(name = "timestamp-node")]
#[command(about = "Bootstraps a timestamp chain and appends blocks to it")]
struct Args {
    #[arg(long, value_name = "PATH", default_values_t = vec!["timestamp-node.toml".to_string()])]
    config: Vec<String>,

    /// Number of blocks to build, verify and accept
    #[arg(long, default_value = "10")]
    blocks: u64,
}

/// Payload for the `n`th block of this run: `n` big-endian, zero padded.
fn payload(n: u64) -> BlockData {
    let mut data = [0u8; DATA_LEN];
    data[..8].copy_from_slice(&n.to_be_bytes());
    data
}

fn main() -> Result<()> {
    // Get arguments and config
    let args = Args::parse();
    tracing_subscriber::fmt().with_env_filter("info,fjall=warn").init();
    let mut builder = Config::builder();
    for file in &args.config {
        builder = builder.add_source(File::with_name(file).required(false));
    }
    let config = Arc::new(
        builder
            .add_source(Environment::with_prefix("TIMESTAMPVM"))
            .build()
            .context("could not load configuration")?,
    );

    info!("Timestamp chain node");
    let ctx = ChainContext::from_config(config)?;
    let genesis = ctx.initialize_genesis(payload(0))?;
    info!("Genesis {} ({})", genesis.id(), genesis.status());

    for n in 1..=args.blocks {
        let mut block = ctx.build_block(payload(n))?;
        if let Err(e) = block.verify(&ctx) {
            error!("Built block {} failed verification: {e}", block.id());
            return Err(e.into());
        }
        block.accept(&ctx)?;
    }

    if let Some(id) = ctx.last_accepted()? {
        info!("Last accepted block {id}");
    }

    // Bye!
    info!("Exiting");
    Ok(())
}
