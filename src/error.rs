use thiserror::Error;

/// Errors a route handler can raise. The dispatcher maps every variant down
/// to the POSIX errno it sends back on the wire (see [`Error::errno`]).
#[derive(Debug, Error)]
pub enum Error {
    /// No route in the table matched the request path.
    #[error("no such file or directory: {0}")]
    NoSuchEntry(String),

    /// A wildcard segment, or a specific sub-resource, doesn't resolve to
    /// anything live in the browser (unknown tab id, unknown input id, ...).
    #[error("unknown identifier: {0}")]
    UnknownIdentifier(String),

    /// The operation is structurally not supported on this path (AppleDouble
    /// companions, writes into a computed result file).
    #[error("operation not supported: {0}")]
    Unsupported(String),

    /// The path exists only to satisfy shell expectations and can't be acted
    /// on directly.
    #[error("operation not permitted: {0}")]
    NotPermitted(String),

    /// A request was cancelled because its handler didn't reply in time.
    /// Raised only by the dispatcher itself, never by a route handler.
    #[error("request timed out")]
    Timeout,

    /// Catch-all for failures talking to a browser capability. Route
    /// handlers that don't have a more specific translation should map their
    /// failures here.
    #[error("browser API error: {0}")]
    BrowserApi(String),

    /// The request body (or a write's payload) wasn't valid base64/UTF-8.
    #[error("invalid request body: {0}")]
    InvalidBody(String),

    /// A transport-level I/O failure (native-messaging stdin/stdout).
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// A transport-level protocol failure (WebSocket handshake/frame
    /// errors).
    #[error("transport error: {0}")]
    Transport(String),
}

/// The wire's `ENOTSUP` is fixed at 45 by the protocol contract (§7),
/// independent of the build target's own libc. On Linux, `libc::ENOTSUP`
/// is an alias for `EOPNOTSUPP` (95) rather than the distinct BSD/macOS
/// value the host process expects, so this can't be `libc::ENOTSUP`.
const WIRE_ENOTSUP: i32 = 45;

impl Error {
    /// The errno this error is reported to the transport as. Matches the
    /// taxonomy carried by the dispatcher:
    /// EPERM=1, ENOENT=2, EINTR=4, EIO=5, ENOTSUP=45, ETIMEDOUT=110.
    pub fn errno(&self) -> i32 {
        match self {
            Error::NoSuchEntry(_) | Error::UnknownIdentifier(_) => libc::ENOENT,
            Error::Unsupported(_) => WIRE_ENOTSUP,
            Error::NotPermitted(_) => libc::EPERM,
            Error::Timeout => libc::ETIMEDOUT,
            Error::BrowserApi(_) | Error::InvalidBody(_) => libc::EIO,
            Error::Io(_) | Error::Transport(_) => libc::EIO,
        }
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for Error {
    fn from(value: tokio_tungstenite::tungstenite::Error) -> Self {
        Error::Transport(value.to_string())
    }
}

impl From<base64::DecodeError> for Error {
    fn from(value: base64::DecodeError) -> Self {
        Error::InvalidBody(value.to_string())
    }
}

impl From<std::string::FromUtf8Error> for Error {
    fn from(value: std::string::FromUtf8Error) -> Self {
        Error::InvalidBody(value.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(value: serde_json::Error) -> Self {
        Error::InvalidBody(value.to_string())
    }
}
