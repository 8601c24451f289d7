//! CLI interface for crypto-tracker
//!
//! Provides subcommands for:
//! - `watch`: Stream live price/change figures for a set of pairs
//! - `symbols`: List tradable pairs from the exchange directory
//! - `config`: Show the effective configuration

mod symbols;
mod watch;

pub use symbols::SymbolsArgs;
pub use watch::WatchArgs;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "crypto-tracker")]
#[command(about = "Live cryptocurrency price tracker fed by the Binance push stream")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Stream live prices
    Watch(WatchArgs),
    /// List tradable pairs
    Symbols(SymbolsArgs),
    /// Show configuration
    Config,
}
