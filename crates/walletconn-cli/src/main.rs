//! walletconn CLI - exercise the connection manager from a terminal
//!
//! # Quick Start
//!
//! ```bash
//! # Normalize wallet-reported chain ids
//! walletconn normalize 0x89 Ox1 137 abc
//!
//! # Activate an in-memory wallet, switch chains, then disconnect
//! walletconn session --chain-id 0x1 --supported 1,137 --switch-chain 0x89 --switch-chain 4
//! ```
//!
//! Settings are also read from the environment (and a `.env` file):
//! `WALLETCONN_SUPPORTED_CHAINS`, `WALLETCONN_THROW_ERRORS`, `RUST_LOG`.

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod session;

use walletconn_types::{normalize_chain_id, RawChainId};

/// walletconn CLI - wallet connection lifecycle playground
#[derive(Parser)]
#[command(name = "walletconn")]
#[command(version)]
#[command(about = "Drive a wallet connection session against an in-memory connector", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Normalize chain ids the way the connection manager does
    Normalize {
        /// Raw chain ids (decimal, 0x-hex, or Ox-hex)
        #[arg(required = true)]
        values: Vec<String>,
    },

    /// Run a scripted session: activate, apply wallet changes, deactivate
    Session(session::SessionArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Normalize { values } => {
            normalize(&values);
            Ok(())
        }
        Commands::Session(args) => session::run(args).await,
    }
}

fn normalize(values: &[String]) {
    for value in values {
        match normalize_chain_id(&RawChainId::Text(value.clone())) {
            Ok(chain_id) => println!("{:<12} {:>12}  {}", value, chain_id, chain_id.to_hex()),
            Err(e) => println!("{:<12} error: {}", value, e),
        }
    }
}
