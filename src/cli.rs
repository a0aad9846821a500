//! Command line interface.
//!
//! Subcommands run against the scripted engine: `chains`, `estimate`, and
//! `demo`, which replays a whole transfer scenario.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::config::BridgeConfig;
use crate::session::TransferForm;

/// Cross-chain USDC transfer console.
#[derive(Debug, Parser)]
#[command(name = "usdc-bridge", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Path to the configuration file (defaults to ./bridge.toml).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug diagnostics.
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Lists the chains the engine supports.
    Chains,

    /// Quotes a transfer and prints the fee breakdown.
    Estimate {
        #[command(flatten)]
        route: RouteArgs,
    },

    /// Replays a scripted transfer and shows its progress.
    Demo {
        #[arg(long, value_enum, default_value_t = Scenario::Happy)]
        scenario: Scenario,

        #[command(flatten)]
        route: RouteArgs,
    },
}

/// Canned engine behaviour for `demo`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Scenario {
    /// Every step succeeds.
    Happy,
    /// The user rejects the approval.
    ApprovalFailure,
    /// Mint fails with a retryable error and the retry succeeds.
    MintRetry,
    /// Mint fails with a non-recoverable error.
    MintFatal,
    /// The user dismisses the prompt to switch to the destination network.
    SwitchRejected,
    /// The engine cannot reach the source chain.
    EngineOffline,
}

#[derive(Debug, Clone, Args)]
pub struct RouteArgs {
    /// Source chain (engine identifier).
    #[arg(long)]
    pub from: Option<String>,

    /// Destination chain (engine identifier).
    #[arg(long)]
    pub to: Option<String>,

    /// USDC amount.
    #[arg(long, default_value = "1")]
    pub amount: String,

    /// Recipient on the destination chain; defaults to the connected wallet.
    #[arg(long)]
    pub recipient: Option<String>,
}

impl RouteArgs {
    pub fn into_form(self, config: &BridgeConfig) -> TransferForm {
        TransferForm {
            from_chain: self.from.unwrap_or_else(|| config.default_from_chain.clone()),
            to_chain: self.to.unwrap_or_else(|| config.default_to_chain.clone()),
            amount: self.amount,
            recipient: self.recipient,
        }
    }
}
