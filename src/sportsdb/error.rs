use reqwest::StatusCode;
use thiserror::Error;

/// Failure fetching from the upstream sports-data provider.
///
/// Callers treat these as soft: an ingest cycle logs the error and keeps the
/// previously stored data.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to upstream failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("upstream returned {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("failed to decode upstream response: {0}")]
    Decode(#[source] reqwest::Error),
}

impl FetchError {
    /// Whether a retry could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            Self::Status { status, .. } => {
                status.is_server_error() || *status == StatusCode::TOO_MANY_REQUESTS
            }
            Self::Decode(_) => false,
        }
    }
}
