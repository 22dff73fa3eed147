//! The local WebSocket compatibility fallback: one JSON object per text
//! frame, reconnecting with exponential backoff from 200ms (§6). The host
//! only starts listening on the socket once woken by a "did connect"
//! native message, so `connect` sends that over stdout before dialing.

use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, warn};

use super::Transport;
use crate::error::Error;

const INITIAL_BACKOFF: Duration = Duration::from_millis(200);
const MAX_BACKOFF: Duration = Duration::from_secs(5);

pub struct WebSocketTransport {
    stream: Mutex<WebSocketStream<MaybeTlsStream<TcpStream>>>,
}

/// Writes a single native-messaging-framed "did connect" notification to
/// stdout, the same wire format `NativeMessagingTransport` uses, to wake
/// the host before it will accept a WebSocket connection.
async fn wake_host() -> Result<(), Error> {
    let payload = serde_json::to_vec(&serde_json::json!({ "type": "did_connect" }))?;
    let len = u32::try_from(payload.len())
        .map_err(|_| Error::Transport("wake message too large to frame".to_string()))?;

    let mut stdout = tokio::io::stdout();
    stdout.write_all(&len.to_le_bytes()).await?;
    stdout.write_all(&payload).await?;
    stdout.flush().await?;
    Ok(())
}

impl WebSocketTransport {
    /// Wakes the host over the native-messaging port, then connects to
    /// `ws://addr`, retrying with doubling backoff until the connection
    /// succeeds. Never gives up.
    pub async fn connect(addr: &str) -> Self {
        if let Err(e) = wake_host().await {
            warn!(error = %e, "failed to send did-connect wake message");
        }

        let url = format!("ws://{addr}");
        let mut backoff = INITIAL_BACKOFF;

        loop {
            match connect_async(&url).await {
                Ok((stream, _response)) => {
                    debug!(addr, "websocket transport connected");
                    return Self {
                        stream: Mutex::new(stream),
                    };
                }
                Err(e) => {
                    warn!(
                        addr,
                        error = %e,
                        backoff_ms = backoff.as_millis() as u64,
                        "websocket connect failed, retrying"
                    );
                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(MAX_BACKOFF);
                }
            }
        }
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn send(&self, message: Value) -> Result<(), Error> {
        let text = serde_json::to_string(&message)?;
        self.stream.lock().await.send(Message::Text(text)).await?;
        Ok(())
    }

    async fn recv(&self) -> Result<Option<Value>, Error> {
        loop {
            match self.stream.lock().await.next().await {
                None => return Ok(None),
                Some(Ok(Message::Text(text))) => return Ok(Some(serde_json::from_str(&text)?)),
                Some(Ok(Message::Close(_))) => return Ok(None),
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(e.into()),
            }
        }
    }
}
