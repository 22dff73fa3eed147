use std::sync::Arc;

use clap::Parser;
use tracing::{info, warn};

use tabfs_engine::browser::fixture::FixtureBrowser;
use tabfs_engine::browser::BrowserCapabilities;
use tabfs_engine::config::{Args, TransportKind};
use tabfs_engine::dispatcher::Dispatcher;
use tabfs_engine::logging;
use tabfs_engine::protocol::{Request, Response};
use tabfs_engine::routes::{self, CatalogState};
use tabfs_engine::transport::native::NativeMessagingTransport;
use tabfs_engine::transport::websocket::WebSocketTransport;
use tabfs_engine::transport::Transport;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    logging::init(args.log_level)?;

    let browser: Arc<dyn BrowserCapabilities> = Arc::new(FixtureBrowser::new());
    let state = CatalogState::new(browser);
    let routes = routes::build_table(state);
    let dispatcher = Dispatcher::new(routes, args.request_timeout());

    let transport: Arc<dyn Transport> = match args.transport {
        TransportKind::Native => Arc::new(NativeMessagingTransport::new()),
        TransportKind::Websocket => Arc::new(WebSocketTransport::connect(&args.ws_addr).await),
    };

    info!(transport = ?args.transport, "tabfs-engine ready");
    run(dispatcher, transport).await;
    Ok(())
}

/// Pumps requests off `transport`, dispatches each one concurrently, and
/// sends its reply back once ready. A malformed inbound message is logged
/// and dropped rather than tearing down the whole loop.
async fn run(dispatcher: Dispatcher, transport: Arc<dyn Transport>) {
    loop {
        let message = match transport.recv().await {
            Ok(Some(message)) => message,
            Ok(None) => {
                info!("transport closed, shutting down");
                return;
            }
            Err(e) => {
                warn!(error = %e, "transport read failed, shutting down");
                return;
            }
        };

        let request: Request = match serde_json::from_value(message) {
            Ok(request) => request,
            Err(e) => {
                warn!(error = %e, "dropping malformed request");
                continue;
            }
        };

        let transport = transport.clone();
        dispatcher.dispatch(request, move |response: Response| {
            tokio::spawn(async move {
                if let Err(e) = transport.send(response.to_json()).await {
                    warn!(error = %e, "failed to send response");
                }
            });
        });
    }
}
