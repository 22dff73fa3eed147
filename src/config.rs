use std::time::Duration;

use clap::{Parser, ValueEnum};
use tracing::Level;

/// Which byte-stream transport to bridge the route table onto.
#[derive(Clone, Copy, Debug, ValueEnum, PartialEq, Eq)]
pub enum TransportKind {
    /// Framed native-messaging port on stdin/stdout.
    Native,
    /// Local WebSocket compatibility fallback.
    Websocket,
}

/// Command-line configuration for the engine binary.
///
/// None of this affects the semantics described for the route table or
/// dispatcher; it only selects which transport is bridged in and how
/// aggressively requests time out.
#[derive(Parser, Clone, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// A global log level to use when printing logs.
    /// It's also possible to set `RUST_LOG` according to
    /// `tracing_subscriber::filter::EnvFilter`, which will always have
    /// priority.
    #[arg(long, env = "TABFS_LOG", default_value_t = Level::INFO)]
    pub log_level: Level,

    /// Which transport to bridge requests in on.
    #[arg(long, value_enum, default_value_t = TransportKind::Native)]
    pub transport: TransportKind,

    /// Address the WebSocket compatibility transport connects to.
    #[arg(long, default_value = "127.0.0.1:9991")]
    pub ws_addr: String,

    /// Per-request timeout, in milliseconds, before the dispatcher gives up
    /// and replies with ETIMEDOUT.
    #[arg(long, default_value_t = 1000)]
    pub request_timeout_ms: u64,
}

impl Args {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}
