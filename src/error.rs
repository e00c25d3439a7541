//! Spectre client errors

use thiserror::Error;

/// Errors that can occur when talking to a Spectre Command Center
#[derive(Debug, Error)]
pub enum SpectreError {
    /// HTTP request/response error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The API returned a non-success status; the body is passed through unmodified
    #[error("API error: {status} - {body}")]
    Api {
        status: reqwest::StatusCode,
        body: String,
    },

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// A record could not be parsed as a CIDR
    #[error("Invalid CIDR: {0}")]
    Cidr(#[from] ipnetwork::IpNetworkError),

    /// Operation on a zone or collector that is not attached to a server
    #[error("{0} requires a handle obtained from a Server")]
    NoServer(&'static str),

    /// Caller-supplied payload of the wrong shape (e.g. a non-object device record)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Response body did not have the expected shape
    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),
}
