//! API error taxonomy.

/// Errors from the analytics backend's REST surface.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Backend responded with a non-success status.
    #[error("HTTP error: {status} - {message}")]
    Http {
        /// HTTP status code.
        status: u16,
        /// Response body, when one was readable.
        message: String,
    },

    /// Base URL could not be parsed.
    #[error("Invalid base URL: {0}")]
    InvalidUrl(String),

    /// Response body did not match the expected shape.
    #[error("Decode error: {0}")]
    Decode(String),

    /// Transport-level failure, including bounded-timeout expiry.
    #[error("HTTP client error: {0}")]
    Transport(#[from] reqwest::Error),
}

impl ApiError {
    /// Whether the next scheduled attempt may succeed.
    ///
    /// Transient failures are retried on the next poll interval and
    /// never clear existing state; terminal ones are logged and also
    /// leave state untouched.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http { status, .. } => matches!(status, 408 | 425 | 429 | 500..=599),
            Self::Transport(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            Self::InvalidUrl(_) | Self::Decode(_) => false,
        }
    }
}

/// Result type for API operations.
pub type ApiResult<T> = Result<T, ApiError>;
