pub mod browser;
pub mod config;
pub mod contents;
pub mod dispatcher;
pub mod error;
pub mod handle_registry;
pub mod logging;
pub mod pattern;
pub mod protocol;
pub mod route;
pub mod routes;
pub mod sanitize;
pub mod transport;
