//! Symbols command implementation

use crate::config::Config;
use crate::market::{ExchangeInfoClient, SymbolCatalog, SymbolPair};
use clap::Args;

#[derive(Args, Debug)]
pub struct SymbolsArgs {
    /// Only list pairs quoted in this asset (e.g. USDT)
    #[arg(short, long)]
    pub quote: Option<String>,

    /// Maximum number of pairs to print
    #[arg(short, long)]
    pub limit: Option<usize>,
}

impl SymbolsArgs {
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let catalog = ExchangeInfoClient::with_config(config.endpoints.exchange_info())?;
        let pairs = catalog.fetch_pairs().await?;
        let total = pairs.len();

        let selected = self.select(pairs);
        for pair in &selected {
            println!("{:<14} {:>8} / {:<8}", pair.symbol, pair.base_asset, pair.quote_asset);
        }

        tracing::info!(total, shown = selected.len(), "Listed tradable pairs");
        Ok(())
    }

    fn select(&self, pairs: Vec<SymbolPair>) -> Vec<SymbolPair> {
        let quote = self.quote.as_deref().map(str::to_uppercase);
        pairs
            .into_iter()
            .filter(|pair| quote.as_deref().map_or(true, |q| pair.quote_asset == q))
            .take(self.limit.unwrap_or(usize::MAX))
            .collect()
    }
}
