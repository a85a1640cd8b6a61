use thiserror::Error;

/// Crate-wide error taxonomy. Variants mirror the propagation rules: tool and
/// filter failures are normally converted into messages before they ever reach
/// here, so seeing `Tool`/`FilterRejection` surface to a caller means the
/// conversion site chose to bail instead of recovering.
#[derive(Debug, Error)]
pub enum Error {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("http error: {0}")]
    Http(String),

    #[error("provider error ({provider}): {message}")]
    Provider { provider: String, message: String },

    #[error("parser error: {0}")]
    Parser(String),

    #[error("tool error: {0}")]
    Tool(String),

    #[error("filter rejection: {0}")]
    FilterRejection(String),

    #[error("backpressure drop: subscriber buffer full for session {session_id}")]
    BackpressureDrop { session_id: String },

    #[error("cancellation requested")]
    Cancellation,

    #[error("validation error: {0}")]
    Validation(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("fatal: {0}")]
    Fatal(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// True for errors the pipeline is expected to recover from by emitting
    /// an in-band `Error` message rather than tearing down the run.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Error::Fatal(_) | Error::Cancellation)
    }
}
