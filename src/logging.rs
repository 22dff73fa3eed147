use tracing::Level;
use tracing_subscriber::{util::SubscriberInitExt, EnvFilter};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Init(#[from] tracing_subscriber::util::TryInitError),
}

/// Sets up a stderr `tracing` subscriber at the given default level.
/// `RUST_LOG`, if set, always takes priority over `level`.
pub fn init(level: Level) -> Result<(), Error> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(level.into())
                .from_env()
                .expect("invalid RUST_LOG"),
        )
        .compact()
        .finish();

    subscriber.try_init()?;
    Ok(())
}
