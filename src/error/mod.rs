//! Error module for the resynchub hub.
//!
//! Every failure class the hub can answer a request with is a variant
//! here, together with its HTTP status code. Subscription-store I/O
//! problems are deliberately missing from the client-facing set: the
//! hub logs them and degrades to an empty subscriber map instead of
//! failing the request.

use axum::http::StatusCode;
use thiserror::Error;

/// Main error type for the hub.
#[derive(Error, Debug)]
pub enum HubError {
    /// Malformed or missing required field, unsupported mode.
    #[error("{0}")]
    BadRequest(String),

    #[error("Method Not Allowed.")]
    MethodNotAllowed,

    /// A non-empty trust list does not contain the published topic.
    #[error("Topic is not registered with the hub.")]
    UntrustedTopic,

    /// Publish content-type is neither form-urlencoded nor an accepted
    /// ResourceSync mimetype.
    #[error("content-type header not recognised.")]
    NotAcceptable,

    #[error("Payload exceeds the maximum size of {0} bytes.")]
    PayloadTooLarge(usize),

    /// Challenge mismatch or any error during the verification
    /// round-trip.
    #[error("Subscription verification failed")]
    VerificationFailed,

    /// Legacy PuSH feed fetch failed; reported to the publisher.
    #[error("Error retrieving resource url: {0}")]
    UpstreamFetch(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}

impl HubError {
    /// The HTTP status code this error is answered with.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::UntrustedTopic => StatusCode::FORBIDDEN,
            Self::NotAcceptable => StatusCode::NOT_ACCEPTABLE,
            Self::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            Self::VerificationFailed => StatusCode::CONFLICT,
            Self::UpstreamFetch(_) => StatusCode::BAD_REQUEST,
            Self::Io(_) | Self::Serialization(_) | Self::Config(_) | Self::Http(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

/// Result type alias for hub operations.
pub type Result<T> = std::result::Result<T, HubError>;
