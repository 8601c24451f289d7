//! Market-data pipeline
//!
//! Wires the catalog, baseline fetcher, stream connection, ingress buffer
//! and dispatcher together and owns their lifecycle:
//!
//! ```text
//! catalog -> symbols -> baseline fetcher -> baselines --+
//!                                                       v
//! stream connection -> ingress buffer -> update dispatcher -> sink
//! ```

use crate::baseline::{BaselineFetcher, BaselineSource, BaselineStore, FetchReport, TradingDayClient};
use crate::config::Config;
use crate::dispatch::{UpdateDispatcher, UpdateSink};
use crate::error::FeedError;
use crate::feed::IngressBuffer;
use crate::market::{ExchangeInfoClient, RowId, SymbolCatalog, SymbolPair, TrackedPair, TrackedPairs};
use crate::ws::{StreamConnection, SubscriptionRegistry};
use parking_lot::Mutex;
use reqwest::Client;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// One running tracker instance: one HTTP client, one socket
pub struct Pipeline {
    rows: TrackedPairs,
    baselines: BaselineStore,
    catalog: Arc<dyn SymbolCatalog>,
    fetcher: BaselineFetcher,
    buffer: Arc<IngressBuffer>,
    connection: StreamConnection,
    dispatcher: Arc<UpdateDispatcher>,
    /// Serializes row membership changes with the matching (un)subscribe
    membership: Mutex<()>,
    cancel: CancellationToken,
}

impl Pipeline {
    /// Build a pipeline against the configured exchange endpoints
    pub fn new(config: &Config, sink: Arc<dyn UpdateSink>) -> Result<Self, FeedError> {
        let http = Client::builder()
            .timeout(config.endpoints.request_timeout())
            .build()?;

        let catalog = ExchangeInfoClient::with_client(config.endpoints.exchange_info(), http.clone());
        let source = TradingDayClient::with_client(config.endpoints.trading_day(), http);

        Ok(Self::with_sources(
            config,
            Arc::new(catalog),
            Arc::new(source),
            sink,
        ))
    }

    /// Build a pipeline with explicit catalog and baseline sources
    pub fn with_sources(
        config: &Config,
        catalog: Arc<dyn SymbolCatalog>,
        source: Arc<dyn BaselineSource>,
        sink: Arc<dyn UpdateSink>,
    ) -> Self {
        let cancel = CancellationToken::new();
        let rows = TrackedPairs::new();
        let baselines = BaselineStore::new();
        let buffer = Arc::new(IngressBuffer::new(config.dispatch.buffer_capacity));

        let fetcher = BaselineFetcher::new(
            source,
            baselines.clone(),
            config.baseline.policy(),
            cancel.child_token(),
        );

        let dispatcher = Arc::new(UpdateDispatcher::new(
            config.dispatch.dispatcher(),
            buffer.clone(),
            baselines.clone(),
            rows.clone(),
            sink,
            cancel.child_token(),
        ));

        let connection = StreamConnection::new(
            config.stream.ws_config(&config.endpoints.stream_url),
            Arc::new(SubscriptionRegistry::new()),
            buffer.clone(),
        );
        let on_open = dispatcher.clone();
        connection.on_open(move || {
            if on_open.ensure_running() {
                tracing::debug!("Dispatcher started on connect");
            }
        });

        Self {
            rows,
            baselines,
            catalog,
            fetcher,
            buffer,
            connection,
            dispatcher,
            membership: Mutex::new(()),
            cancel,
        }
    }

    pub fn rows(&self) -> &TrackedPairs {
        &self.rows
    }

    pub fn baselines(&self) -> &BaselineStore {
        &self.baselines
    }

    pub fn buffer(&self) -> &Arc<IngressBuffer> {
        &self.buffer
    }

    pub fn connection(&self) -> &StreamConnection {
        &self.connection
    }

    pub fn dispatcher(&self) -> &Arc<UpdateDispatcher> {
        &self.dispatcher
    }

    /// Fetch every tradable pair from the exchange directory
    pub async fn load_catalog(&self) -> Result<Vec<SymbolPair>, FeedError> {
        self.catalog.fetch_pairs().await
    }

    /// Track one pair: add a row, subscribe its symbol and fetch its
    /// baseline
    pub async fn track(&self, pair: SymbolPair) -> RowId {
        let symbol = pair.symbol.clone();
        let id = {
            let _guard = self.membership.lock();
            let id = self.rows.add(pair);
            self.connection.subscribe_one(&symbol);
            id
        };

        // Failures are logged by the fetcher; the row simply waits for a
        // later refresh
        let _ = self.fetcher.fetch_one(&symbol).await;

        tracing::info!(row = id.0, symbol = %symbol, "Tracking pair");
        id
    }

    /// Track several pairs with one control frame and one baseline request
    pub async fn track_many(&self, pairs: Vec<SymbolPair>) -> Vec<RowId> {
        let symbols: Vec<String> = pairs.iter().map(|p| p.symbol.clone()).collect();
        let ids: Vec<RowId> = {
            let _guard = self.membership.lock();
            let ids = pairs.into_iter().map(|pair| self.rows.add(pair)).collect();
            self.connection.subscribe(&symbols);
            ids
        };

        let _ = self.fetcher.fetch(&symbols).await;

        tracing::info!(rows = ids.len(), "Tracking pairs");
        ids
    }

    /// Stop tracking a row. The symbol is unsubscribed once no other row
    /// references it.
    pub fn untrack(&self, id: RowId) -> Option<TrackedPair> {
        let removed = {
            let _guard = self.membership.lock();
            let removed = self.rows.remove(id)?;
            if !self.rows.contains_symbol(removed.symbol()) {
                self.connection.unsubscribe_one(removed.symbol());
            }
            removed
        };
        tracing::info!(row = id.0, symbol = %removed.symbol(), "Untracked pair");
        Some(removed)
    }

    /// Refetch baselines for every tracked symbol
    pub async fn refresh_baselines(&self) -> Result<FetchReport, FeedError> {
        self.fetcher.fetch(self.rows.symbols()).await
    }

    /// Open the stream. Tracked rows already hold their baselines and
    /// subscriptions; the registry is replayed on open and the dispatcher
    /// starts once the connection is up.
    pub fn start(&self) {
        if !self.connection.connect() {
            tracing::warn!(state = %self.connection.state(), "Stream already active");
        }
    }

    /// Stop everything.
    ///
    /// Cancellation is asserted first so no retry or dispatcher tick fires
    /// during teardown; the socket is then closed manually before the
    /// dispatcher task is joined.
    pub async fn shutdown(&self) {
        tracing::info!("Shutting down pipeline");
        self.cancel.cancel();
        self.connection.close().await;
        self.dispatcher.stop().await;
        self.buffer.clear();
    }
}
