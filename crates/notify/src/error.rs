//! Error types for the notification pipeline.
//!
//! Each component owns a narrow error enum. [`CycleError`] is what a single
//! poll cycle surfaces to its trigger, which logs it and waits for the next
//! firing.

use thiserror::Error;

/// Failures fetching the unread-notification set.
#[derive(Debug, Error)]
pub enum SourceError {
    /// HTTP request failed before a response was read
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The API answered with a non-success status
    #[error("API returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    /// Response body was not the expected JSON shape
    #[error("Malformed response: {0}")]
    Malformed(#[from] serde_json::Error),

    /// The GraphQL layer reported errors
    #[error("GraphQL errors: {}", .0.join(", "))]
    GraphQl(Vec<String>),

    /// `data.notifications` was absent or null
    #[error("Response carried no notifications")]
    MissingData,

    /// The bearer secret could not be retrieved
    #[error("Secret unavailable: {0}")]
    Secret(String),
}

/// Failures reading or writing the persisted alert state.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying I/O failed
    #[error("Store I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// Persisted contents could not be decoded or encoded
    #[error("Store serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Other backend failure
    #[error("{0}")]
    Other(String),
}

/// Failures assembling or handing off an email.
#[derive(Debug, Error)]
pub enum TransportError {
    /// An address could not be parsed
    #[error("Invalid address {address}: {reason}")]
    Address { address: String, reason: String },

    /// The message could not be built
    #[error("Failed to build message: {0}")]
    Build(String),

    /// The outbound mail capability rejected or failed the handoff
    #[error("Mail delivery failed: {0}")]
    Delivery(String),
}

/// A failed pipeline cycle.
///
/// None of these are fatal: the stored fingerprint is only advanced after a
/// successful send, so the next cycle re-evaluates from whatever persisted.
#[derive(Debug, Error)]
pub enum CycleError {
    #[error("Notification source unavailable: {0}")]
    SourceUnavailable(#[from] SourceError),

    #[error("Alert state store failure: {0}")]
    StoreFailure(#[from] StoreError),

    #[error("Email transport failure: {0}")]
    TransportFailure(#[from] TransportError),
}

impl CycleError {
    /// Short label used as a structured log field.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::SourceUnavailable(_) => "source_unavailable",
            Self::StoreFailure(_) => "store_failure",
            Self::TransportFailure(_) => "transport_failure",
        }
    }
}
