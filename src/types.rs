//! Common error and result types for fasp-bridge.

/// Crate-wide result alias
pub type Result<T> = std::result::Result<T, FaspError>;

/// Top-level error type for bridge operations
#[derive(Debug, thiserror::Error)]
pub enum FaspError {
    /// Rejected synchronously at creation time, never persisted
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Provider not found: {0}")]
    ProviderNotFound(String),

    #[error("Backfill request not found: {0}")]
    BackfillRequestNotFound(String),

    /// No signed call may be attempted against an unconfirmed provider
    #[error("Provider not confirmed: {0}")]
    ProviderNotConfirmed(String),

    #[error("Invalid key material: {0}")]
    InvalidKey(String),

    #[error("Invalid backfill cursor: {0}")]
    InvalidCursor(String),

    /// Network-level failure talking to a provider
    #[error(transparent)]
    Request(#[from] ProviderRequestError),

    #[error("Job queue closed")]
    QueueClosed,
}

/// Typed error for signed provider requests. Callers decide whether a
/// variant is retryable.
#[derive(Debug, thiserror::Error)]
pub enum ProviderRequestError {
    /// Connection failure, timeout, DNS, TLS
    #[error("Network error: {0}")]
    Network(String),

    /// Provider returned a non-2xx status
    #[error("Unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    /// Response body was not valid JSON
    #[error("Malformed JSON from provider: {0}")]
    MalformedJson(String),

    /// Response Content-Digest did not match the body
    #[error("Response content digest mismatch")]
    DigestMismatch,

    /// Response signature failed verification against the provider key
    #[error("Response signature invalid: {0}")]
    InvalidSignature(String),
}

impl ProviderRequestError {
    /// Whether the scheduler may retry the triggering task.
    /// 5xx and transport errors are transient; 4xx is a permanent protocol error.
    pub fn is_retryable(&self) -> bool {
        match self {
            ProviderRequestError::Network(_) => true,
            ProviderRequestError::Status { status, .. } => *status >= 500,
            ProviderRequestError::MalformedJson(_) => true,
            ProviderRequestError::DigestMismatch => true,
            ProviderRequestError::InvalidSignature(_) => false,
        }
    }
}
