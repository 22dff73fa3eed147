//! The standard transport: a framed byte stream on stdin/stdout matching
//! the native-messaging wire format (a 4-byte little-endian length prefix
//! followed by a JSON payload), in both directions (§6).

use async_trait::async_trait;
use serde_json::Value;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader, Stdin, Stdout};
use tokio::sync::Mutex;

use super::Transport;
use crate::error::Error;

pub struct NativeMessagingTransport {
    stdin: Mutex<BufReader<Stdin>>,
    stdout: Mutex<Stdout>,
}

impl NativeMessagingTransport {
    pub fn new() -> Self {
        Self {
            stdin: Mutex::new(BufReader::new(tokio::io::stdin())),
            stdout: Mutex::new(tokio::io::stdout()),
        }
    }
}

impl Default for NativeMessagingTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for NativeMessagingTransport {
    async fn send(&self, message: Value) -> Result<(), Error> {
        let payload = serde_json::to_vec(&message)?;
        let len = u32::try_from(payload.len())
            .map_err(|_| Error::Transport("outgoing message too large to frame".to_string()))?;

        let mut stdout = self.stdout.lock().await;
        stdout.write_all(&len.to_le_bytes()).await?;
        stdout.write_all(&payload).await?;
        stdout.flush().await?;
        Ok(())
    }

    async fn recv(&self) -> Result<Option<Value>, Error> {
        let mut stdin = self.stdin.lock().await;

        let mut len_buf = [0u8; 4];
        match stdin.read_exact(&mut len_buf).await {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(e.into()),
        }

        let len = u32::from_le_bytes(len_buf) as usize;
        let mut payload = vec![0u8; len];
        stdin.read_exact(&mut payload).await?;

        Ok(Some(serde_json::from_slice(&payload)?))
    }
}
