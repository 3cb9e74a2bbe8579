//! Session token minting.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use huddle_storage::SubscriberId;

use crate::{
    config::{AuthConfig, to_chrono},
    error::{AuthError, Result},
    jwt::{Plan, TokenClaims, sign_token, verify_token},
    rotation::KeyRotationManager,
};

/// Mints short-lived session tokens under the active signing key.
///
/// The issuer never checks entitlement itself; callers gate minting on
/// [`SubscriptionCache::has_entitlement`](crate::SubscriptionCache::has_entitlement).
#[derive(Debug, Clone)]
pub struct TokenIssuer {
    keys: Arc<KeyRotationManager>,
}

impl TokenIssuer {
    /// Creates an issuer signing with keys from `keys`.
    pub fn new(keys: Arc<KeyRotationManager>) -> Self {
        Self { keys }
    }

    fn config(&self) -> &AuthConfig {
        self.keys.config()
    }

    /// Lifetime of every token this issuer mints.
    #[must_use]
    pub fn token_lifetime(&self) -> std::time::Duration {
        self.config().token_lifetime()
    }

    /// Mints a token for `subscriber_id` with `iat = now` and
    /// `exp = now + token_lifetime`.
    ///
    /// # Errors
    ///
    /// - [`AuthError::InvalidToken`] if the subscriber id or email is empty
    /// - [`AuthError::NoSigningKey`] if no signing key exists yet
    /// - [`AuthError::UpstreamUnavailable`] if the key store fails
    #[tracing::instrument(skip(self, email), fields(subscriber = %subscriber_id))]
    pub async fn mint(
        &self,
        subscriber_id: &SubscriberId,
        email: &str,
        plan: Plan,
        now: DateTime<Utc>,
    ) -> Result<String> {
        if subscriber_id.as_str().is_empty() {
            return Err(AuthError::invalid_token("subscriber id is empty"));
        }
        if email.is_empty() {
            return Err(AuthError::invalid_token("email is empty"));
        }

        let key = self.keys.signing_key().await?;
        let iat = now.timestamp();
        let claims = TokenClaims {
            iss: self.config().issuer().to_owned(),
            aud: self.config().audience().to_owned(),
            sub: subscriber_id.as_str().to_owned(),
            email: email.to_owned(),
            plan,
            iat,
            exp: iat.saturating_add(to_chrono(self.token_lifetime()).num_seconds()),
        };
        let token = sign_token(&claims, &key)?;

        tracing::info!(
            audit.action = "token.mint",
            audit.resource = %subscriber_id,
            audit.result = "success",
            kid = %key.id,
            plan = %plan,
            "Session token minted"
        );
        Ok(token)
    }

    /// Verifies `existing` in full and mints a replacement for the same
    /// subject, email and plan.
    ///
    /// A refreshed token is signed with the current active key even if
    /// `existing` was signed by a key in its grace period.
    ///
    /// # Errors
    ///
    /// Any verification error (see
    /// [`TokenValidator::verify_signature_and_claims`](crate::TokenValidator::verify_signature_and_claims)),
    /// plus the errors of [`mint`](Self::mint).
    pub async fn refresh(&self, existing: &str, now: DateTime<Utc>) -> Result<String> {
        if existing.is_empty() {
            return Err(AuthError::MissingToken);
        }
        let candidates = self.keys.get_verification_keys(now).await?;
        let claims = verify_token(existing, &candidates, self.config(), now)?;
        self.mint(&claims.subscriber_id(), &claims.email, claims.plan, now).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use chrono::Duration as ChronoDuration;
    use huddle_storage::auth::MemorySigningKeyStore;

    use super::*;
    use crate::jwt::decode_jwt_header;

    fn t0() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    async fn issuer() -> (TokenIssuer, Arc<KeyRotationManager>) {
        let manager = Arc::new(KeyRotationManager::new(
            Arc::new(MemorySigningKeyStore::new()),
            AuthConfig::default(),
        ));
        manager.rotate(t0()).await.unwrap();
        (TokenIssuer::new(Arc::clone(&manager)), manager)
    }

    async fn verify(manager: &KeyRotationManager, token: &str, now: DateTime<Utc>) -> TokenClaims {
        let keys = manager.get_verification_keys(now).await.unwrap();
        verify_token(token, &keys, manager.config(), now).unwrap()
    }

    #[tokio::test]
    async fn test_mint_claims() {
        let (issuer, manager) = issuer().await;
        let token =
            issuer.mint(&"cus_123".into(), "fan@example.com", Plan::Premium, t0()).await.unwrap();

        let claims = verify(&manager, &token, t0()).await;
        assert_eq!(claims.sub, "cus_123");
        assert_eq!(claims.email, "fan@example.com");
        assert_eq!(claims.plan, Plan::Premium);
        assert_eq!(claims.iss, "huddle-auth");
        assert_eq!(claims.aud, "huddle-mcp");
        assert_eq!(claims.exp - claims.iat, 900);

        let kid = decode_jwt_header(&token).unwrap().kid.unwrap();
        assert_eq!(kid, manager.signing_key().await.unwrap().id);
    }

    #[tokio::test]
    async fn test_mint_without_key_fails() {
        let manager = Arc::new(KeyRotationManager::new(
            Arc::new(MemorySigningKeyStore::new()),
            AuthConfig::default(),
        ));
        let issuer = TokenIssuer::new(manager);
        let result = issuer.mint(&"cus_1".into(), "a@b.c", Plan::Pro, t0()).await;
        assert!(matches!(result, Err(AuthError::NoSigningKey)));
    }

    #[tokio::test]
    async fn test_mint_rejects_empty_fields() {
        let (issuer, _) = issuer().await;
        assert!(issuer.mint(&"".into(), "a@b.c", Plan::Pro, t0()).await.is_err());
        assert!(issuer.mint(&"cus_1".into(), "", Plan::Pro, t0()).await.is_err());
    }

    #[tokio::test]
    async fn test_refresh_extends_expiry_and_keeps_subject() {
        let (issuer, manager) = issuer().await;
        let original = issuer.mint(&"cus_1".into(), "a@b.c", Plan::Pro, t0()).await.unwrap();

        let later = t0() + ChronoDuration::minutes(10);
        let refreshed = issuer.refresh(&original, later).await.unwrap();
        let claims = verify(&manager, &refreshed, later).await;
        assert_eq!(claims.sub, "cus_1");
        assert_eq!(claims.plan, Plan::Pro);
        assert_eq!(claims.iat, later.timestamp());
    }

    #[tokio::test]
    async fn test_refresh_rejects_expired() {
        let (issuer, _) = issuer().await;
        let original = issuer.mint(&"cus_1".into(), "a@b.c", Plan::Pro, t0()).await.unwrap();
        let result = issuer.refresh(&original, t0() + ChronoDuration::minutes(16)).await;
        assert!(matches!(result, Err(AuthError::TokenExpired)));
    }

    #[tokio::test]
    async fn test_refresh_resigns_with_new_key() {
        let config = AuthConfig::builder()
            .token_lifetime(std::time::Duration::from_secs(7 * 86_400))
            .build()
            .unwrap();
        let manager = Arc::new(KeyRotationManager::new(
            Arc::new(MemorySigningKeyStore::new()),
            config,
        ));
        manager.rotate(t0()).await.unwrap();
        let issuer = TokenIssuer::new(Arc::clone(&manager));

        let original = issuer.mint(&"cus_1".into(), "a@b.c", Plan::Pro, t0()).await.unwrap();
        let rotated_at = t0() + ChronoDuration::days(1);
        let new_key = manager.rotate(rotated_at).await.unwrap();

        let refreshed = issuer.refresh(&original, rotated_at).await.unwrap();
        assert_eq!(decode_jwt_header(&refreshed).unwrap().kid.as_deref(), Some(new_key.id.as_str()));
    }

    #[tokio::test]
    async fn test_refresh_empty_token() {
        let (issuer, _) = issuer().await;
        assert!(matches!(issuer.refresh("", t0()).await, Err(AuthError::MissingToken)));
    }
}
