//! Authentication error types.
//!
//! Every failure on the token path maps onto one [`AuthError`] variant. The
//! HTTP layer turns the variant into a status code using [`AuthError::code`]
//! and never exposes the inner detail string to clients.

use huddle_storage::StorageError;
use thiserror::Error;

/// Authentication and entitlement errors.
///
/// # Non-exhaustive
///
/// This enum is marked `#[non_exhaustive]`. Downstream match expressions
/// must include a wildcard arm (`_ =>`).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AuthError {
    /// No token was presented in the header or the session cookie.
    #[error("Missing token")]
    MissingToken,

    /// Malformed token, bad signature, unknown key, or forbidden algorithm.
    #[error("Invalid token: {0}")]
    InvalidToken(String),

    /// Token expiry is in the past (beyond the clock tolerance).
    #[error("Token expired")]
    TokenExpired,

    /// Issuer or audience does not match the expected value.
    #[error("Claim mismatch: {0}")]
    ClaimMismatch(String),

    /// The token is valid but the subscriber is not entitled.
    #[error("Subscription inactive")]
    SubscriptionInactive,

    /// A backing store failed or timed out. Never downgraded to "allow".
    ///
    /// Wraps the original [`StorageError`] to preserve the source chain for
    /// structured logging.
    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(
        /// The underlying storage error.
        #[source]
        StorageError,
    ),

    /// No active signing key and no bootstrap secret configured.
    #[error("No signing key available")]
    NoSigningKey,

    /// Configuration failed validation.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl AuthError {
    /// Creates an [`AuthError::InvalidToken`] with the given detail.
    #[must_use]
    pub fn invalid_token(detail: impl Into<String>) -> Self {
        Self::InvalidToken(detail.into())
    }

    /// Creates an [`AuthError::ClaimMismatch`] with the given detail.
    #[must_use]
    pub fn claim_mismatch(detail: impl Into<String>) -> Self {
        Self::ClaimMismatch(detail.into())
    }

    /// Creates an [`AuthError::InvalidConfig`] with the given detail.
    #[must_use]
    pub fn invalid_config(detail: impl Into<String>) -> Self {
        Self::InvalidConfig(detail.into())
    }

    /// Stable machine-readable code, safe to return to clients.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingToken => "MISSING_TOKEN",
            Self::InvalidToken(_) => "INVALID_TOKEN",
            Self::TokenExpired => "TOKEN_EXPIRED",
            Self::ClaimMismatch(_) => "CLAIM_MISMATCH",
            Self::SubscriptionInactive => "SUBSCRIPTION_INACTIVE",
            Self::UpstreamUnavailable(_) | Self::NoSigningKey => "UPSTREAM_UNAVAILABLE",
            Self::InvalidConfig(_) => "INVALID_CONFIG",
        }
    }

    /// Returns `true` if the caller should present (or obtain) a different
    /// token rather than retry the same one.
    #[must_use]
    pub fn is_credential_error(&self) -> bool {
        matches!(
            self,
            Self::MissingToken | Self::InvalidToken(_) | Self::TokenExpired | Self::ClaimMismatch(_)
        )
    }

    /// Returns `true` if retrying the same request later may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::UpstreamUnavailable(err) => err.is_transient(),
            _ => false,
        }
    }
}

impl From<jsonwebtoken::errors::Error> for AuthError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;

        match err.kind() {
            ErrorKind::InvalidToken => AuthError::invalid_token("Invalid JWT structure"),
            ErrorKind::InvalidSignature => AuthError::invalid_token("Invalid signature"),
            ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            ErrorKind::InvalidAudience => AuthError::claim_mismatch("audience"),
            ErrorKind::InvalidIssuer => AuthError::claim_mismatch("issuer"),
            ErrorKind::InvalidAlgorithm => AuthError::invalid_token("Algorithm not supported"),
            _ => AuthError::invalid_token(format!("JWT error: {err}")),
        }
    }
}

impl From<StorageError> for AuthError {
    fn from(err: StorageError) -> Self {
        AuthError::UpstreamUnavailable(err)
    }
}

/// Result type alias for authentication operations.
pub type Result<T> = std::result::Result<T, AuthError>;
