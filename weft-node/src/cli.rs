use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use weft_crypto::anchor::TransactionAnchor;
use weft_types::primitives::{Amount, Timestamp};
use weft_types::transaction::Transaction;

use crate::config::NodeConfig;
use crate::error::NodeError;
use crate::node::Node;

#[derive(Parser)]
#[command(
    name = "weft",
    about = "Weft blockweave node: Proof-of-Access admission with erasure-coded propagation",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run a local block-production simulation
    Run {
        /// Path to config file
        #[arg(short, long, default_value = "weft.toml")]
        config: String,
        /// Use built-in defaults instead of reading a config file
        #[arg(long)]
        dev: bool,
        /// Override the number of blocks to propose
        #[arg(long)]
        blocks: Option<u64>,
        /// Override the RNG seed
        #[arg(long)]
        seed: Option<u64>,
        /// Override chunks dropped per segment
        #[arg(long)]
        loss: Option<usize>,
        /// Override the log level (RUST_LOG still wins)
        #[arg(long)]
        log_level: Option<String>,
        /// Print the final report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Write a default configuration file
    Init {
        /// Output directory
        #[arg(short, long, default_value = ".")]
        dir: String,
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Print the anchor of a transaction at a timestamp
    Anchor {
        sender: String,
        receiver: String,
        /// Amount in base units
        amount: Amount,
        /// Unix timestamp in seconds
        #[arg(short, long)]
        timestamp: Timestamp,
        /// Hex-encoded payload
        #[arg(short, long, default_value = "")]
        payload: String,
    },
}

pub async fn run(cli: Cli) -> Result<(), NodeError> {
    match cli.command {
        Command::Run {
            config,
            dev,
            blocks,
            seed,
            loss,
            log_level,
            json,
        } => {
            let mut config = if dev {
                NodeConfig::default()
            } else {
                NodeConfig::load(&config)?
            };

            // Apply CLI overrides.
            if let Some(blocks) = blocks {
                config.simulation.blocks = blocks;
            }
            if let Some(seed) = seed {
                config.simulation.seed = seed;
            }
            if let Some(loss) = loss {
                config.simulation.loss_per_segment = loss;
            }
            if let Some(level) = log_level {
                config.logging.level = level;
            }
            init_tracing(&config.logging.level);

            tracing::info!(
                blocks = config.simulation.blocks,
                seed = config.simulation.seed,
                segments = config.erasure.data_segments,
                redundancy = config.erasure.redundancy,
                "starting simulation"
            );
            let mut node = Node::new(config).await?;
            let report = node.run().await?;
            node.shutdown().await;

            if json {
                let out = serde_json::to_string_pretty(&report).map_err(|e| {
                    NodeError::InvalidArgument {
                        reason: format!("failed to render report: {}", e),
                    }
                })?;
                println!("{}", out);
            } else {
                println!(
                    "rounds: {}  admitted: {}  rejected: {}  undecodable: {}",
                    report.rounds, report.admitted, report.rejected, report.undecodable
                );
                println!(
                    "transactions confirmed: {}  dropped: {}  pending: {}",
                    report.transactions_confirmed, report.transactions_dropped, report.pending
                );
                if let Some(status) = &report.status {
                    println!(
                        "chain length: {}  utxos: {}  capacity: {:.2} MB",
                        status.chain_len, status.utxos, status.capacity_mb
                    );
                    if let Some(root) = &status.utxo_root {
                        println!("utxo root: {}", root);
                    }
                }
            }
            Ok(())
        }
        Command::Init { dir, force } => {
            init_tracing("info");
            let path = NodeConfig::init(&dir, force)?;
            println!("Wrote {}", path.display());
            Ok(())
        }
        Command::Anchor {
            sender,
            receiver,
            amount,
            timestamp,
            payload,
        } => {
            let payload = hex::decode(&payload).map_err(|e| NodeError::InvalidArgument {
                reason: format!("payload is not valid hex: {}", e),
            })?;
            let tx = Transaction::new(sender, receiver, amount, payload);
            println!("{}", TransactionAnchor::create(&tx, timestamp));
            Ok(())
        }
    }
}

/// Install the global subscriber. `RUST_LOG` takes precedence over `level`.
fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
