//! tx-speedup - replace a stuck pending transaction with a higher-fee copy
//!
//! Fetches the pending transaction from the node, checks the new gas price
//! against the original, re-signs the same nonce and payload with EIP-155 and
//! broadcasts the result.

use anyhow::Result;
use clap::{CommandFactory, Parser};
use tracing::{error, info};

mod chain;
mod config;
mod error;
mod pipeline;
mod tx;

use config::{Cli, Settings};
use pipeline::ReplacementPipeline;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    init_logging();

    let Some(settings) = Settings::resolve(&cli)? else {
        Cli::command().print_help()?;
        println!();
        return Ok(());
    };

    info!("Starting tx-speedup v{}", env!("CARGO_PKG_VERSION"));
    info!(
        "Replacing {:?} at {} gwei (rule: {})",
        settings.tx_hash, settings.gas_price_gwei, settings.replacement_rule
    );

    let pipeline = ReplacementPipeline::from_settings(&settings)?;

    match pipeline.run(&settings.request()).await {
        Ok(outcome) => {
            match outcome.broadcast_hash {
                Some(hash) => info!(
                    "Replaced {:?} with {:?} on chain {}",
                    outcome.original_hash, hash, outcome.chain_id
                ),
                None => {
                    info!(
                        "Signed replacement {:?} for {:?}, not broadcast",
                        outcome.replacement_hash, outcome.original_hash
                    );
                    println!("{}", outcome.raw_hex);
                }
            }
            info!(
                "Gas price {} wei, gas limit {}",
                outcome.gas_price, outcome.gas_limit
            );
            Ok(())
        }
        Err(e) => {
            if e.is_node_rejection() {
                error!("Node refused the replacement: {}", e);
            } else {
                error!("Replacement failed: {}", e);
            }
            std::process::exit(1);
        }
    }
}

fn init_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tx_speedup=debug,hyper=warn,reqwest=warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .init();
}
