//! Gateway configuration.
//!
//! Values come from `HUDDLE_*` environment variables. If a YAML file is
//! given (`--config` or `HUDDLE_CONFIG`), any field it sets overrides the
//! environment. The token settings live under the file's `auth` key, use the
//! [`AuthConfig`] field names, and are merged field by field: an `auth`
//! block that sets only `token_lifetime` keeps `HUDDLE_ISSUER`.
//!
//! ```yaml
//! bind_addr: "0.0.0.0:9000"
//! rotation_check_interval: 30m
//! webhook_tolerance: 5m
//! auth:
//!   issuer: huddle-auth
//!   audience: huddle-mcp
//!   token_lifetime: 15m
//!   grace_period: 24h
//! ```

use std::{fmt, fs, net::SocketAddr, time::Duration};

use anyhow::{Context, Result, bail};
use huddle_authn::{AuthConfig, webhook::DEFAULT_WEBHOOK_TOLERANCE};
use huddle_storage::Zeroizing;
use serde::Deserialize;

/// Default listen address.
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";

/// Default interval between rotation checks.
pub const DEFAULT_ROTATION_CHECK_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Header carrying the shared secret for internal token minting.
pub const INTERNAL_TOKEN_HEADER: &str = "x-internal-token";

/// Gateway settings.
#[derive(Clone, bon::Builder)]
pub struct GatewayConfig {
    /// Address the HTTP server binds to.
    #[builder(default = default_bind_addr())]
    pub bind_addr: SocketAddr,

    /// How often the scheduler asks whether a rotation is due.
    #[builder(default = DEFAULT_ROTATION_CHECK_INTERVAL)]
    pub rotation_check_interval: Duration,

    /// Endpoint secret shared with the payment provider.
    #[builder(into)]
    pub webhook_secret: Zeroizing<String>,

    /// Maximum age of a webhook delivery.
    #[builder(default = DEFAULT_WEBHOOK_TOLERANCE)]
    pub webhook_tolerance: Duration,

    /// Shared secret required in `X-Internal-Token` to mint tokens.
    #[builder(into)]
    pub internal_token: Zeroizing<String>,

    /// Base64url secret used to sign while the key store is empty.
    #[builder(into)]
    pub bootstrap_secret: Option<Zeroizing<String>>,

    /// Token, rotation and entitlement settings.
    #[builder(default)]
    pub auth: AuthConfig,
}

impl fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("bind_addr", &self.bind_addr)
            .field("rotation_check_interval", &self.rotation_check_interval)
            .field("webhook_secret", &"[REDACTED]")
            .field("webhook_tolerance", &self.webhook_tolerance)
            .field("internal_token", &"[REDACTED]")
            .field("bootstrap_secret", &self.bootstrap_secret.as_ref().map(|_| "[REDACTED]"))
            .field("auth", &self.auth)
            .finish()
    }
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct GatewayConfigOverride {
    bind_addr: Option<String>,
    #[serde(default, with = "humantime_serde")]
    rotation_check_interval: Option<Duration>,
    webhook_secret: Option<String>,
    #[serde(default, with = "humantime_serde")]
    webhook_tolerance: Option<Duration>,
    internal_token: Option<String>,
    bootstrap_secret: Option<String>,
    auth: Option<AuthConfigOverride>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct AuthConfigOverride {
    issuer: Option<String>,
    audience: Option<String>,
    #[serde(default, with = "humantime_serde")]
    token_lifetime: Option<Duration>,
    #[serde(default, with = "humantime_serde")]
    clock_tolerance: Option<Duration>,
    #[serde(default, with = "humantime_serde")]
    rotation_interval: Option<Duration>,
    #[serde(default, with = "humantime_serde")]
    grace_period: Option<Duration>,
    key_history_limit: Option<usize>,
    #[serde(default, with = "humantime_serde")]
    subscription_ttl: Option<Duration>,
    #[serde(default, with = "humantime_serde")]
    store_timeout: Option<Duration>,
    cookie_name: Option<String>,
}

impl AuthConfigOverride {
    /// `base` with every field set here replaced, validated as a whole.
    fn apply(self, base: &AuthConfig) -> Result<AuthConfig> {
        AuthConfig::builder()
            .issuer(self.issuer.unwrap_or_else(|| base.issuer().to_owned()))
            .audience(self.audience.unwrap_or_else(|| base.audience().to_owned()))
            .token_lifetime(self.token_lifetime.unwrap_or(base.token_lifetime()))
            .clock_tolerance(self.clock_tolerance.unwrap_or(base.clock_tolerance()))
            .rotation_interval(self.rotation_interval.unwrap_or(base.rotation_interval()))
            .grace_period(self.grace_period.unwrap_or(base.grace_period()))
            .key_history_limit(self.key_history_limit.unwrap_or(base.key_history_limit()))
            .subscription_ttl(self.subscription_ttl.unwrap_or(base.subscription_ttl()))
            .store_timeout(self.store_timeout.unwrap_or(base.store_timeout()))
            .cookie_name(self.cookie_name.unwrap_or_else(|| base.cookie_name().to_owned()))
            .build()
            .with_context(|| "validate auth config")
    }
}

impl GatewayConfig {
    /// Loads from `lookup`, then applies the YAML file at `path` if given.
    ///
    /// # Errors
    ///
    /// As [`from_lookup_and_yaml`](Self::from_lookup_and_yaml), plus file
    /// read errors.
    pub fn load(lookup: impl Fn(&str) -> Option<String>, path: Option<&str>) -> Result<Self> {
        match path {
            Some(path) => {
                let contents = fs::read_to_string(path)
                    .with_context(|| format!("read HUDDLE_CONFIG: {path}"))?;
                Self::from_lookup_and_yaml(lookup, &contents)
            },
            None => Self::from_lookup(lookup),
        }
    }

    /// Builds the configuration from `lookup`, which maps a variable name to
    /// its value.
    ///
    /// # Errors
    ///
    /// Fails if a required variable is unset or any value does not parse.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let config = Self::env_layer(&lookup)?;
        config.check()?;
        Ok(config)
    }

    /// [`from_lookup`](Self::from_lookup) with `yaml` applied on top.
    ///
    /// Required secrets may come from either layer.
    ///
    /// # Errors
    ///
    /// As [`from_lookup`](Self::from_lookup), plus YAML parse errors and an
    /// invalid merged [`AuthConfig`].
    pub fn from_lookup_and_yaml(
        lookup: impl Fn(&str) -> Option<String>,
        yaml: &str,
    ) -> Result<Self> {
        let mut config = Self::env_layer(&lookup)?;
        let override_cfg: GatewayConfigOverride =
            serde_yaml::from_str(yaml).with_context(|| "parse gateway config yaml")?;

        if let Some(value) = override_cfg.bind_addr {
            config.bind_addr = value.parse().with_context(|| "parse bind_addr")?;
        }
        if let Some(value) = override_cfg.rotation_check_interval {
            config.rotation_check_interval = value;
        }
        if let Some(value) = override_cfg.webhook_secret {
            config.webhook_secret = Zeroizing::new(value);
        }
        if let Some(value) = override_cfg.webhook_tolerance {
            config.webhook_tolerance = value;
        }
        if let Some(value) = override_cfg.internal_token {
            config.internal_token = Zeroizing::new(value);
        }
        if let Some(value) = override_cfg.bootstrap_secret {
            config.bootstrap_secret = Some(Zeroizing::new(value));
        }
        if let Some(auth) = override_cfg.auth {
            config.auth = auth.apply(&config.auth)?;
        }

        config.check()?;
        Ok(config)
    }

    /// Environment values with defaults. Missing secrets are left empty for
    /// [`check`](Self::check) to report once every layer has been applied.
    fn env_layer(lookup: &impl Fn(&str) -> Option<String>) -> Result<Self> {
        let bind_addr = lookup("HUDDLE_BIND")
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_owned())
            .parse()
            .with_context(|| "parse HUDDLE_BIND")?;
        let rotation_check_interval = parse_duration(
            lookup,
            "HUDDLE_ROTATION_CHECK_INTERVAL",
            DEFAULT_ROTATION_CHECK_INTERVAL,
        )?;
        let webhook_tolerance =
            parse_duration(lookup, "HUDDLE_WEBHOOK_TOLERANCE", DEFAULT_WEBHOOK_TOLERANCE)?;

        let defaults = AuthConfig::default();
        let auth = AuthConfig::builder()
            .issuer(lookup("HUDDLE_ISSUER").unwrap_or_else(|| defaults.issuer().to_owned()))
            .audience(lookup("HUDDLE_AUDIENCE").unwrap_or_else(|| defaults.audience().to_owned()))
            .token_lifetime(parse_duration(
                lookup,
                "HUDDLE_TOKEN_LIFETIME",
                defaults.token_lifetime(),
            )?)
            .rotation_interval(parse_duration(
                lookup,
                "HUDDLE_ROTATION_INTERVAL",
                defaults.rotation_interval(),
            )?)
            .grace_period(parse_duration(lookup, "HUDDLE_GRACE_PERIOD", defaults.grace_period())?)
            .build()
            .with_context(|| "validate auth config from environment")?;

        Ok(Self {
            bind_addr,
            rotation_check_interval,
            webhook_secret: Zeroizing::new(lookup("HUDDLE_WEBHOOK_SECRET").unwrap_or_default()),
            webhook_tolerance,
            internal_token: Zeroizing::new(lookup("HUDDLE_INTERNAL_TOKEN").unwrap_or_default()),
            bootstrap_secret: lookup("HUDDLE_BOOTSTRAP_SECRET")
                .filter(|value| !value.is_empty())
                .map(Zeroizing::new),
            auth,
        })
    }

    fn check(&self) -> Result<()> {
        if self.webhook_secret.is_empty() {
            bail!("HUDDLE_WEBHOOK_SECRET must be set");
        }
        if self.internal_token.is_empty() {
            bail!("HUDDLE_INTERNAL_TOKEN must be set");
        }
        if self.rotation_check_interval.is_zero() {
            bail!("rotation_check_interval must be positive");
        }
        if self.webhook_tolerance.is_zero() {
            bail!("webhook_tolerance must be positive");
        }
        Ok(())
    }
}

fn parse_duration(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    default: Duration,
) -> Result<Duration> {
    match lookup(name) {
        Some(value) => humantime_serde::re::humantime::parse_duration(&value)
            .with_context(|| format!("parse {name}")),
        None => Ok(default),
    }
}
