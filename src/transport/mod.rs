//! Byte-stream-agnostic message sink/source the dispatcher loop runs
//! against (§6): a `Transport` is anything that can send and receive JSON
//! values, whatever wire framing it uses underneath.

pub mod native;
pub mod websocket;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Error;

/// Implemented by both the native-messaging port and the local WebSocket
/// fallback, so the dispatcher loop is written once against this trait.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, message: Value) -> Result<(), Error>;

    /// Returns the next inbound message, or `None` once the transport has
    /// closed. Never reorders or coalesces messages.
    async fn recv(&self) -> Result<Option<Value>, Error>;
}
