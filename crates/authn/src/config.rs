//! Configuration for token issuance, validation and key rotation.
//!
//! [`AuthConfig`] deserializes from the gateway's config file (durations in
//! humantime form such as `15m` or `90d`) or is assembled in code with the
//! validating builder.

use std::time::Duration;

use huddle_storage::auth::DEFAULT_KEY_HISTORY_LIMIT;
use serde::{Deserialize, Serialize};

use crate::error::{AuthError, Result};

/// Default `iss` claim.
pub const DEFAULT_ISSUER: &str = "huddle-auth";

/// Default `aud` claim.
pub const DEFAULT_AUDIENCE: &str = "huddle-mcp";

/// Default session token lifetime.
pub const DEFAULT_TOKEN_LIFETIME: Duration = Duration::from_secs(15 * 60);

/// Default allowed clock skew when checking expiry.
pub const DEFAULT_CLOCK_TOLERANCE: Duration = Duration::ZERO;

/// Default age at which the active signing key is rotated.
pub const DEFAULT_ROTATION_INTERVAL: Duration = Duration::from_secs(90 * 24 * 60 * 60);

/// Default window during which a retired key still verifies tokens.
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(24 * 60 * 60);

/// Default age after which a subscription record is treated as absent.
pub const DEFAULT_SUBSCRIPTION_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Default upper bound on a single store call.
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(3);

/// Default session cookie name.
pub const DEFAULT_COOKIE_NAME: &str = "huddle_session";

/// Token, key rotation and entitlement settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuthConfig {
    #[serde(default = "default_issuer")]
    pub(crate) issuer: String,

    #[serde(default = "default_audience")]
    pub(crate) audience: String,

    #[serde(with = "humantime_serde", default = "default_token_lifetime")]
    pub(crate) token_lifetime: Duration,

    #[serde(with = "humantime_serde", default = "default_clock_tolerance")]
    pub(crate) clock_tolerance: Duration,

    #[serde(with = "humantime_serde", default = "default_rotation_interval")]
    pub(crate) rotation_interval: Duration,

    #[serde(with = "humantime_serde", default = "default_grace_period")]
    pub(crate) grace_period: Duration,

    #[serde(default = "default_key_history_limit")]
    pub(crate) key_history_limit: usize,

    #[serde(with = "humantime_serde", default = "default_subscription_ttl")]
    pub(crate) subscription_ttl: Duration,

    #[serde(with = "humantime_serde", default = "default_store_timeout")]
    pub(crate) store_timeout: Duration,

    #[serde(default = "default_cookie_name")]
    pub(crate) cookie_name: String,
}

fn default_issuer() -> String {
    DEFAULT_ISSUER.to_owned()
}

fn default_audience() -> String {
    DEFAULT_AUDIENCE.to_owned()
}

fn default_token_lifetime() -> Duration {
    DEFAULT_TOKEN_LIFETIME
}

fn default_clock_tolerance() -> Duration {
    DEFAULT_CLOCK_TOLERANCE
}

fn default_rotation_interval() -> Duration {
    DEFAULT_ROTATION_INTERVAL
}

fn default_grace_period() -> Duration {
    DEFAULT_GRACE_PERIOD
}

fn default_key_history_limit() -> usize {
    DEFAULT_KEY_HISTORY_LIMIT
}

fn default_subscription_ttl() -> Duration {
    DEFAULT_SUBSCRIPTION_TTL
}

fn default_store_timeout() -> Duration {
    DEFAULT_STORE_TIMEOUT
}

fn default_cookie_name() -> String {
    DEFAULT_COOKIE_NAME.to_owned()
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            issuer: default_issuer(),
            audience: default_audience(),
            token_lifetime: DEFAULT_TOKEN_LIFETIME,
            clock_tolerance: DEFAULT_CLOCK_TOLERANCE,
            rotation_interval: DEFAULT_ROTATION_INTERVAL,
            grace_period: DEFAULT_GRACE_PERIOD,
            key_history_limit: DEFAULT_KEY_HISTORY_LIMIT,
            subscription_ttl: DEFAULT_SUBSCRIPTION_TTL,
            store_timeout: DEFAULT_STORE_TIMEOUT,
            cookie_name: default_cookie_name(),
        }
    }
}

#[bon::bon]
impl AuthConfig {
    /// Builds a validated configuration. Unset fields take the defaults above.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidConfig`] if the result fails
    /// [`validate`](Self::validate).
    #[builder]
    pub fn new(
        #[builder(into, default = default_issuer())] issuer: String,
        #[builder(into, default = default_audience())] audience: String,
        #[builder(default = DEFAULT_TOKEN_LIFETIME)] token_lifetime: Duration,
        #[builder(default = DEFAULT_CLOCK_TOLERANCE)] clock_tolerance: Duration,
        #[builder(default = DEFAULT_ROTATION_INTERVAL)] rotation_interval: Duration,
        #[builder(default = DEFAULT_GRACE_PERIOD)] grace_period: Duration,
        #[builder(default = DEFAULT_KEY_HISTORY_LIMIT)] key_history_limit: usize,
        #[builder(default = DEFAULT_SUBSCRIPTION_TTL)] subscription_ttl: Duration,
        #[builder(default = DEFAULT_STORE_TIMEOUT)] store_timeout: Duration,
        #[builder(into, default = default_cookie_name())] cookie_name: String,
    ) -> Result<Self> {
        let config = Self {
            issuer,
            audience,
            token_lifetime,
            clock_tolerance,
            rotation_interval,
            grace_period,
            key_history_limit,
            subscription_ttl,
            store_timeout,
            cookie_name,
        };
        config.validate()?;
        Ok(config)
    }

    /// Checks cross-field constraints. Call this after deserializing.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidConfig`] describing the first violation.
    pub fn validate(&self) -> Result<()> {
        if self.issuer.trim().is_empty() {
            return Err(AuthError::invalid_config("issuer cannot be empty"));
        }
        if self.audience.trim().is_empty() {
            return Err(AuthError::invalid_config("audience cannot be empty"));
        }
        if self.token_lifetime.is_zero() {
            return Err(AuthError::invalid_config("token_lifetime must be positive"));
        }
        if self.rotation_interval.is_zero() {
            return Err(AuthError::invalid_config("rotation_interval must be positive"));
        }
        if self.grace_period >= self.rotation_interval {
            return Err(AuthError::invalid_config(
                "grace_period must be shorter than rotation_interval",
            ));
        }
        if self.key_history_limit < 2 {
            return Err(AuthError::invalid_config(
                "key_history_limit must keep at least one retired key",
            ));
        }
        if self.subscription_ttl.is_zero() {
            return Err(AuthError::invalid_config("subscription_ttl must be positive"));
        }
        if self.store_timeout.is_zero() {
            return Err(AuthError::invalid_config("store_timeout must be positive"));
        }
        if self.cookie_name.is_empty()
            || !self.cookie_name.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
        {
            return Err(AuthError::invalid_config(
                "cookie_name must be non-empty and contain only [A-Za-z0-9_-]",
            ));
        }
        Ok(())
    }

    /// Expected `iss` claim.
    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Expected `aud` claim.
    #[must_use]
    pub fn audience(&self) -> &str {
        &self.audience
    }

    /// Lifetime of a freshly minted token.
    #[must_use]
    pub fn token_lifetime(&self) -> Duration {
        self.token_lifetime
    }

    /// Allowed clock skew when checking expiry.
    #[must_use]
    pub fn clock_tolerance(&self) -> Duration {
        self.clock_tolerance
    }

    /// Key age at which rotation is due.
    #[must_use]
    pub fn rotation_interval(&self) -> Duration {
        self.rotation_interval
    }

    /// How long a retired key keeps verifying.
    #[must_use]
    pub fn grace_period(&self) -> Duration {
        self.grace_period
    }

    /// Number of key generations the store retains.
    #[must_use]
    pub fn key_history_limit(&self) -> usize {
        self.key_history_limit
    }

    /// Age after which a subscription record counts as absent.
    #[must_use]
    pub fn subscription_ttl(&self) -> Duration {
        self.subscription_ttl
    }

    /// Upper bound on a single store call.
    #[must_use]
    pub fn store_timeout(&self) -> Duration {
        self.store_timeout
    }

    /// Session cookie name.
    #[must_use]
    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }
}

/// Converts a std duration to a chrono one, saturating on overflow.
pub(crate) fn to_chrono(duration: Duration) -> chrono::Duration {
    chrono::Duration::from_std(duration).unwrap_or(chrono::Duration::MAX)
}
