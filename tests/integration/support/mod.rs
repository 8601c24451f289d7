//! Local push-feed server for integration tests

#![allow(dead_code)]

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_tungstenite::{accept_async, tungstenite::Message};

#[derive(Debug, Clone)]
enum Command {
    Send(String),
    Drop,
}

/// WebSocket server that records inbound control frames and pushes
/// scripted data frames to every connected client
pub struct MockFeed {
    addr: SocketAddr,
    accepts: Arc<AtomicUsize>,
    received: Arc<Mutex<Vec<String>>>,
    commands: broadcast::Sender<Command>,
    task: JoinHandle<()>,
}

impl MockFeed {
    /// Start a server that completes the WebSocket handshake
    pub async fn start() -> Self {
        Self::spawn(true).await
    }

    /// Start a server that accepts TCP connections and drops them at once,
    /// so every connect attempt fails
    pub async fn start_rejecting() -> Self {
        Self::spawn(false).await
    }

    async fn spawn(handshake: bool) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let accepts = Arc::new(AtomicUsize::new(0));
        let received = Arc::new(Mutex::new(Vec::new()));
        let (commands, _) = broadcast::channel(64);

        let task = {
            let accepts = accepts.clone();
            let received = received.clone();
            let commands = commands.clone();
            tokio::spawn(async move {
                loop {
                    let Ok((stream, _)) = listener.accept().await else {
                        break;
                    };
                    accepts.fetch_add(1, Ordering::SeqCst);
                    if !handshake {
                        drop(stream);
                        continue;
                    }

                    let rx = commands.subscribe();
                    let received = received.clone();
                    tokio::spawn(async move {
                        if let Ok(ws) = accept_async(stream).await {
                            serve(ws, rx, received).await;
                        }
                    });
                }
            })
        };

        Self {
            addr,
            accepts,
            received,
            commands,
            task,
        }
    }

    pub fn url(&self) -> String {
        format!("ws://{}/stream", self.addr)
    }

    pub fn accepts(&self) -> usize {
        self.accepts.load(Ordering::SeqCst)
    }

    /// Text frames received from clients so far
    pub fn frames(&self) -> Vec<String> {
        self.received.lock().clone()
    }

    /// Received frames parsed as JSON
    pub fn json_frames(&self) -> Vec<serde_json::Value> {
        self.frames()
            .iter()
            .map(|f| serde_json::from_str(f).unwrap())
            .collect()
    }

    /// Push a text frame to every connected client
    pub fn send(&self, text: impl Into<String>) {
        let _ = self.commands.send(Command::Send(text.into()));
    }

    /// Push a mini-ticker data frame
    pub fn send_ticker(&self, symbol: &str, close: &str) {
        self.send(format!(
            r#"{{"stream":"{}@miniTicker","data":{{"e":"24hrMiniTicker","s":"{}","c":"{}"}}}}"#,
            symbol.to_lowercase(),
            symbol,
            close
        ));
    }

    /// Drop every live connection without a close handshake
    pub fn drop_connections(&self) {
        let _ = self.commands.send(Command::Drop);
    }

    /// Wait until at least `n` frames have been received
    pub async fn wait_for_frames(&self, n: usize) -> Vec<String> {
        wait_until(|| self.received.lock().len() >= n).await;
        self.frames()
    }

    /// Wait until at least `n` connections have been accepted
    pub async fn wait_for_accepts(&self, n: usize) {
        wait_until(|| self.accepts() >= n).await;
    }
}

impl Drop for MockFeed {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn serve<S>(
    ws: tokio_tungstenite::WebSocketStream<S>,
    mut commands: broadcast::Receiver<Command>,
    received: Arc<Mutex<Vec<String>>>,
) where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
    let (mut write, mut read) = ws.split();
    loop {
        tokio::select! {
            msg = read.next() => match msg {
                Some(Ok(Message::Text(text))) => received.lock().push(text),
                Some(Ok(Message::Ping(data))) => {
                    let _ = write.send(Message::Pong(data)).await;
                }
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => return,
                Some(Ok(_)) => {}
            },
            cmd = commands.recv() => match cmd {
                Ok(Command::Send(text)) => {
                    if write.send(Message::Text(text)).await.is_err() {
                        return;
                    }
                }
                Ok(Command::Drop) | Err(_) => return,
            },
        }
    }
}

/// Poll `condition` every 10ms, panicking after 5 seconds
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not met within 5s");
}
