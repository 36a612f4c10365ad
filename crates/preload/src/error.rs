use citadel_security::SecurityError;
use thiserror::Error;

/// Why a channel was cancelled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CancelReason {
    /// The owner no longer wants the load (navigation finished or aborted, redirect vetoed)
    Aborted,
    /// The load became pointless, e.g. the resource is already cached
    BindingAborted,
}

impl std::fmt::Display for CancelReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CancelReason::Aborted => write!(f, "aborted"),
            CancelReason::BindingAborted => write!(f, "binding aborted"),
        }
    }
}

/// PreloadError represents the errors that can occur while opening or running a preload channel
#[derive(Error, Debug)]
pub enum PreloadError {
    /// The target cannot be fetched over HTTP
    #[error("Not an HTTP channel: {0}")]
    NotHttpChannel(String),

    /// HTTPS enforcement error - attempt to use HTTP when HTTPS is enforced
    #[error("HTTPS enforcement error: {0}")]
    HttpsEnforcementError(String),

    /// The channel id is unknown to the channel service
    #[error("Unknown channel: {0}")]
    UnknownChannel(u64),

    /// The channel was cancelled
    #[error("Channel cancelled: {0}")]
    Cancelled(CancelReason),

    /// HTTP request errors
    #[error("HTTP request error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Redirect chain too long
    #[error("Too many redirects ({0})")]
    TooManyRedirects(usize),

    /// Security policy errors
    #[error("Security error: {0}")]
    SecurityError(#[from] SecurityError),

    /// No async runtime is available to drive channels
    #[error("Runtime unavailable: {0}")]
    RuntimeUnavailable(String),

    /// Connection or transfer errors
    #[error("Connection error: {0}")]
    ConnectionError(String),
}

impl PreloadError {
    /// Returns true if the error is the result of a cancellation rather than a failure
    pub fn is_cancellation(&self) -> bool {
        matches!(self, PreloadError::Cancelled(_))
    }

    /// Returns true if the error means the channel could never have been opened
    pub fn is_open_failure(&self) -> bool {
        matches!(
            self,
            PreloadError::NotHttpChannel(_)
                | PreloadError::HttpsEnforcementError(_)
                | PreloadError::RuntimeUnavailable(_)
        )
    }
}
