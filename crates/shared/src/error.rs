use thiserror::Error;

/// Failures outside a single request: startup, provider discovery and
/// the listener.
#[derive(Error, Debug)]
pub enum CommonError {
    #[error("unknown error")]
    Unknown(#[from] anyhow::Error),
    #[error("invalid request: {msg}")]
    InvalidRequest {
        msg: String,
        #[source]
        source: Option<anyhow::Error>,
    },
    #[error("invalid response: {msg}")]
    InvalidResponse {
        msg: String,
        #[source]
        source: Option<anyhow::Error>,
    },
    #[error("io error")]
    IoError {
        #[from]
        #[source]
        source: std::io::Error,
    },
}
