//! Stream connection with fixed-delay reconnection
//!
//! The socket is owned by a single background task. Other components reach
//! it only through this handle: control frames go through a channel, inbound
//! ticks go straight into the ingress buffer and are never processed on the
//! receive path.

use super::state::{CloseOutcome, ConnectionMachine};
use super::subscription::{ControlFrame, SubscriptionRegistry};
use super::types::{ConnectionState, WsConfig};
use crate::error::FeedError;
use crate::feed::{parse_frame, IngressBuffer};
use crate::telemetry::{self, CounterMetric, GaugeMetric};
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tokio_util::sync::CancellationToken;

/// Callback run each time the connection opens, after the subscription replay
pub type OpenHook = Arc<dyn Fn() + Send + Sync>;

/// Handle to the push-feed connection
pub struct StreamConnection {
    inner: Arc<Inner>,
}

struct Inner {
    config: WsConfig,
    registry: Arc<SubscriptionRegistry>,
    buffer: Arc<IngressBuffer>,
    machine: Mutex<ConnectionMachine>,
    state_tx: watch::Sender<ConnectionState>,
    frame_tx: mpsc::UnboundedSender<String>,
    frame_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<String>>,
    on_open: Mutex<Option<OpenHook>>,
    shutdown: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl StreamConnection {
    pub fn new(
        config: WsConfig,
        registry: Arc<SubscriptionRegistry>,
        buffer: Arc<IngressBuffer>,
    ) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        let (frame_tx, frame_rx) = mpsc::unbounded_channel();
        let machine = ConnectionMachine::new(config.max_reconnect_attempts);

        Self {
            inner: Arc::new(Inner {
                config,
                registry,
                buffer,
                machine: Mutex::new(machine),
                state_tx,
                frame_tx,
                frame_rx: tokio::sync::Mutex::new(frame_rx),
                on_open: Mutex::new(None),
                shutdown: CancellationToken::new(),
                task: Mutex::new(None),
            }),
        }
    }

    /// Register the callback run on every successful open
    pub fn on_open(&self, hook: impl Fn() + Send + Sync + 'static) {
        *self.inner.on_open.lock() = Some(Arc::new(hook));
    }

    pub fn url(&self) -> &str {
        &self.inner.config.url
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.machine.lock().state()
    }

    /// Watch state transitions
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state_tx.subscribe()
    }

    /// Reconnect attempts since the last successful open
    pub fn reconnect_attempts(&self) -> u32 {
        self.inner.machine.lock().reconnect_attempts()
    }

    pub fn registry(&self) -> &Arc<SubscriptionRegistry> {
        &self.inner.registry
    }

    /// Whether the connection task is alive (connected, connecting or
    /// waiting to reconnect)
    pub fn is_running(&self) -> bool {
        self.inner
            .task
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Start connecting.
    ///
    /// A no-op returning false unless the connection is disconnected, so at
    /// most one socket is ever live. Also serves as the external retrigger
    /// after automatic reconnects were exhausted.
    pub fn connect(&self) -> bool {
        let started = self.inner.transition(|machine| {
            if !machine.begin_connect() {
                return false;
            }
            machine.retrigger();
            true
        });
        if !started {
            tracing::debug!(state = %self.state(), "Connect ignored");
            return false;
        }

        let inner = self.inner.clone();
        let handle = tokio::spawn(async move {
            inner.run().await;
        });
        *self.inner.task.lock() = Some(handle);
        true
    }

    /// Subscribe symbols; sends one frame for the newly added ones.
    ///
    /// Returns whether a frame went out. While disconnected the set is only
    /// recorded and will be replayed on the next open.
    pub fn subscribe<I, S>(&self, symbols: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.inner.control(|registry| registry.add_many(symbols))
    }

    pub fn subscribe_one(&self, symbol: &str) -> bool {
        self.subscribe([symbol])
    }

    /// Unsubscribe symbols; sends one frame for those that were present
    pub fn unsubscribe<I, S>(&self, symbols: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.inner.control(|registry| registry.remove_many(symbols))
    }

    pub fn unsubscribe_one(&self, symbol: &str) -> bool {
        self.unsubscribe([symbol])
    }

    /// Close the connection and wait for the socket task to finish.
    ///
    /// The manual-close flag is set before the socket is torn down so the
    /// close is never mistaken for a lost connection.
    pub async fn close(&self) {
        let was_active = self.inner.transition(|machine| machine.request_close());
        self.inner.shutdown.cancel();

        let handle = self.inner.task.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Stream task panicked");
            }
        }

        tracing::info!(was_active, "Stream connection closed");
    }
}

impl Drop for StreamConnection {
    fn drop(&mut self) {
        self.inner.shutdown.cancel();
    }
}

impl Inner {
    /// Apply a state-machine transition and publish the resulting state
    fn transition<T>(&self, f: impl FnOnce(&mut ConnectionMachine) -> T) -> T {
        let mut machine = self.machine.lock();
        let out = f(&mut machine);
        let state = machine.state();
        drop(machine);

        self.publish(state);
        out
    }

    fn publish(&self, state: ConnectionState) {
        self.state_tx.send_replace(state);
        telemetry::set_gauge(GaugeMetric::ConnectionState, state.as_gauge());
    }

    /// Mutate the registry and queue the resulting frame.
    ///
    /// Runs under the machine lock, the same lock the open step holds while
    /// it drains stale frames and snapshots the registry, so every change
    /// lands either in the replay or in a frame queued after it.
    fn control(&self, change: impl FnOnce(&SubscriptionRegistry) -> Option<ControlFrame>) -> bool {
        let machine = self.machine.lock();
        let Some(frame) = change(&self.registry) else {
            return false;
        };

        if machine.state() != ConnectionState::Connected {
            tracing::debug!(
                method = ?frame.method,
                params = ?frame.params,
                "Not connected, frame deferred to replay"
            );
            return false;
        }

        let json = match frame.to_json() {
            Ok(json) => json,
            Err(e) => {
                tracing::error!(error = %e, "Failed to encode control frame");
                return false;
            }
        };

        if self.frame_tx.send(json).is_err() {
            tracing::error!("Stream task gone, control frame dropped");
            return false;
        }
        drop(machine);

        tracing::info!(method = ?frame.method, params = ?frame.params, "Control frame queued");
        true
    }

    fn receive(&self, text: &str) {
        match parse_frame(text) {
            Some(tick) => {
                telemetry::increment(CounterMetric::TicksReceived);
                self.buffer.push(tick);
            }
            None => {
                telemetry::increment(CounterMetric::IgnoredFrames);
                tracing::trace!(
                    preview = %text.chars().take(100).collect::<String>(),
                    "Ignoring non-data frame"
                );
            }
        }
    }

    /// Connection loop: one session per iteration, fixed delay between
    /// unexpected closes, until closed manually or out of attempts.
    async fn run(self: Arc<Self>) {
        // Held for the task's lifetime; a retriggered task waits here until
        // the previous one has exited.
        let mut frames = self.frame_rx.lock().await;

        loop {
            match self.session(&mut frames).await {
                Ok(()) => tracing::info!("WebSocket session ended"),
                Err(e) => tracing::warn!(error = %e, "WebSocket session failed"),
            }

            match self.transition(|machine| machine.on_close()) {
                CloseOutcome::Manual => break,
                CloseOutcome::Exhausted => {
                    tracing::error!(
                        error = %FeedError::RetryExhausted(self.config.max_reconnect_attempts),
                        "Giving up reconnecting"
                    );
                    break;
                }
                CloseOutcome::Reconnect { attempt } => {
                    telemetry::increment(CounterMetric::ReconnectAttempts);
                    tracing::warn!(
                        attempt,
                        delay_ms = self.config.reconnect_delay.as_millis() as u64,
                        "WebSocket reconnecting"
                    );

                    tokio::select! {
                        _ = self.shutdown.cancelled() => break,
                        _ = sleep(self.config.reconnect_delay) => {}
                    }

                    if !self.transition(|machine| machine.begin_connect()) {
                        break;
                    }
                }
            }
        }
    }

    /// Connecting -> Connected, discarding frames queued before this open
    /// and snapshotting the registry in the same critical section.
    ///
    /// Returns `None` when the socket must be dropped, otherwise the replay
    /// frame (if anything is subscribed).
    fn open(&self, frames: &mut mpsc::UnboundedReceiver<String>) -> Option<Option<ControlFrame>> {
        let mut machine = self.machine.lock();
        let opened = machine.on_open();
        let replay = if opened {
            while frames.try_recv().is_ok() {}
            self.registry.resubscribe_frame()
        } else {
            None
        };
        let state = machine.state();
        drop(machine);

        self.publish(state);
        opened.then_some(replay)
    }

    /// Connect, replay subscriptions and pump messages until the socket
    /// closes or shutdown is requested.
    async fn session(
        &self,
        frames: &mut mpsc::UnboundedReceiver<String>,
    ) -> Result<(), FeedError> {
        tracing::info!(url = %self.config.url, "Connecting to WebSocket");

        let (ws_stream, _response) = tokio::select! {
            _ = self.shutdown.cancelled() => return Ok(()),
            result = connect_async(self.config.url.as_str()) => result?,
        };

        let (mut write, mut read) = ws_stream.split();

        let Some(replay) = self.open(frames) else {
            tracing::info!("Close requested while connecting, dropping socket");
            let _ = write.send(Message::Close(None)).await;
            return Ok(());
        };

        tracing::info!("WebSocket connected");

        if let Some(frame) = replay {
            write.send(Message::Text(frame.to_json()?)).await?;
            tracing::info!(streams = frame.params.len(), "Replayed subscriptions");
        }

        let hook = self.on_open.lock().clone();
        if let Some(hook) = hook {
            hook();
        }

        let mut ping_interval = tokio::time::interval(self.config.ping_interval);
        ping_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        ping_interval.tick().await;
        let mut waiting_for_pong = false;

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    let _ = write.send(Message::Close(None)).await;
                    return Ok(());
                }

                msg = read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => self.receive(&text),
                        Some(Ok(Message::Ping(data))) => {
                            write.send(Message::Pong(data)).await?;
                        }
                        Some(Ok(Message::Pong(_))) => {
                            waiting_for_pong = false;
                        }
                        Some(Ok(Message::Close(frame))) => {
                            tracing::info!(?frame, "Received close frame");
                            return Ok(());
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => return Err(e.into()),
                        None => {
                            return Err(FeedError::ConnectionLost("stream ended unexpectedly".into()));
                        }
                    }
                }

                frame = frames.recv() => {
                    if let Some(text) = frame {
                        write.send(Message::Text(text)).await?;
                    }
                }

                _ = ping_interval.tick() => {
                    if waiting_for_pong {
                        return Err(FeedError::ConnectionLost("pong timeout".into()));
                    }
                    write.send(Message::Ping(Vec::new())).await?;
                    waiting_for_pong = true;
                }
            }
        }
    }
}
