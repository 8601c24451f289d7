//! Watch command implementation

use crate::config::Config;
use crate::dispatch::PriceUpdate;
use crate::market::{Direction, PriceState, SymbolPair};
use crate::pipeline::Pipeline;
use clap::Args;
use std::sync::Arc;
use tokio::sync::mpsc;

#[derive(Args, Debug)]
pub struct WatchArgs {
    /// Symbols to track (e.g. BTCUSDT); defaults to `watch.symbols`
    pub symbols: Vec<String>,

    /// Print one JSON object per update instead of a table row
    #[arg(long)]
    pub json: bool,
}

impl WatchArgs {
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let (tx, mut rx) = mpsc::unbounded_channel::<Vec<PriceUpdate>>();
        let pipeline = Pipeline::new(config, Arc::new(tx))?;

        let requested = if self.symbols.is_empty() {
            config.watch.symbols.clone()
        } else {
            self.symbols.clone()
        };
        if requested.is_empty() {
            anyhow::bail!("no symbols to watch");
        }

        let pairs = resolve_pairs(&pipeline, &requested).await;
        if pairs.is_empty() {
            anyhow::bail!("none of the requested symbols are tradable");
        }

        pipeline.track_many(pairs).await;
        pipeline.start();

        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Interrupted");
                    break;
                }
                batch = rx.recv() => {
                    let Some(batch) = batch else { break };
                    for update in &batch {
                        if self.json {
                            println!("{}", serde_json::to_string(update)?);
                        } else {
                            println!("{}", render(update));
                        }
                    }
                }
            }
        }

        pipeline.shutdown().await;
        Ok(())
    }
}

/// Look the requested symbols up in the exchange catalog. Unknown symbols
/// are skipped; if the catalog itself is unreachable the symbols are used
/// as given.
async fn resolve_pairs(pipeline: &Pipeline, requested: &[String]) -> Vec<SymbolPair> {
    let catalog = match pipeline.load_catalog().await {
        Ok(catalog) => catalog,
        Err(e) => {
            tracing::warn!(error = %e, "Catalog unavailable, using symbols as given");
            return requested.iter().map(SymbolPair::from_symbol).collect();
        }
    };

    requested
        .iter()
        .filter_map(|symbol| {
            let symbol = symbol.to_uppercase();
            let found = catalog.iter().find(|pair| pair.symbol == symbol).cloned();
            if found.is_none() {
                tracing::warn!(symbol = %symbol, "Not a tradable pair, skipping");
            }
            found
        })
        .collect()
}

fn render(update: &PriceUpdate) -> String {
    let state = PriceState {
        price: update.price,
        change: update.change,
        change_percent: update.change_percent,
        baseline: None,
    };
    let arrow = match update.direction() {
        Direction::Up => "▲",
        Direction::Down => "▼",
        Direction::Flat => "•",
    };
    format!(
        "#{:<4} {:<12} {:>18} {} {:>14} {:>9}",
        update.row.0,
        update.symbol,
        state.price_display(),
        arrow,
        state.change_display(),
        state.percent_display(),
    )
}
