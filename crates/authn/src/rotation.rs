//! Signing key rotation and grace-period policy.
//!
//! [`KeyRotationManager`] owns the rotation cadence: it decides when the
//! active key is due for replacement, generates the replacement, and decides
//! which retired keys still verify tokens. The durable state lives in a
//! [`SigningKeyStore`]; the manager holds none of its own.
//!
//! # Key lifecycle
//!
//! ```text
//!  rotate(t0)          rotate(t1)                 t1 + grace
//!      │                   │                           │
//!      ▼                   ▼                           ▼
//!  A: Active ──────────► Retired ─── verifies ───────► rejected
//!                      B: Active ──────────────────────────────►
//! ```
//!
//! [`RotationScheduler`] drives [`KeyRotationManager::rotate_if_due`] from a
//! background task. Rotation is never triggered from the request path.

use std::{
    future::Future,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Utc};
use fail::fail_point;
use huddle_storage::{
    StorageError, StorageResult, Zeroizing,
    auth::{SigningKey, SigningKeyStore},
};
use rand_core::{OsRng, RngCore};
use tokio::{task::JoinHandle, time::MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use uuid::{NoContext, Timestamp, Uuid};

use crate::{
    config::{AuthConfig, to_chrono},
    error::{AuthError, Result},
};

/// Number of random bytes in a generated signing secret.
pub const GENERATED_SECRET_BYTES: usize = 32;

/// A manually provisioned pre-shared secret used before the first rotation.
///
/// Exposed as a synthetic [`SigningKey`] with id
/// [`BOOTSTRAP_KEY_ID`](Self::BOOTSTRAP_KEY_ID). The manager signs with it
/// only while the store holds no active key. Once the first stored key
/// exists, the bootstrap key counts as retired at that key's creation and
/// verifies tokens for one grace period.
#[derive(Debug, Clone)]
pub struct BootstrapKeyProvider {
    key: SigningKey,
}

impl BootstrapKeyProvider {
    /// Key id carried in tokens signed with the bootstrap secret.
    pub const BOOTSTRAP_KEY_ID: &'static str = "bootstrap";

    /// Wraps a base64url-encoded secret.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidConfig`] if the secret does not decode to
    /// at least 32 bytes.
    pub fn new(secret: Zeroizing<String>, created_at: DateTime<Utc>) -> Result<Self> {
        let key = SigningKey::builder()
            .id(Self::BOOTSTRAP_KEY_ID)
            .secret(secret)
            .created_at(created_at)
            .build();
        key.secret_bytes()
            .map_err(|e| AuthError::invalid_config(format!("bootstrap secret: {e}")))?;
        Ok(Self { key })
    }

    /// The synthetic signing key.
    #[must_use]
    pub fn key(&self) -> &SigningKey {
        &self.key
    }
}

/// Decides when to rotate, generates keys, and enforces the grace period.
pub struct KeyRotationManager {
    store: Arc<dyn SigningKeyStore>,
    bootstrap: Option<BootstrapKeyProvider>,
    config: AuthConfig,
}

impl std::fmt::Debug for KeyRotationManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyRotationManager")
            .field("bootstrap", &self.bootstrap.is_some())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl KeyRotationManager {
    /// Creates a manager over `store`.
    pub fn new(store: Arc<dyn SigningKeyStore>, config: AuthConfig) -> Self {
        Self { store, bootstrap: None, config }
    }

    /// Adds a bootstrap secret that signs while the store has no active key.
    #[must_use]
    pub fn with_bootstrap(mut self, provider: BootstrapKeyProvider) -> Self {
        self.bootstrap = Some(provider);
        self
    }

    /// The configuration this manager enforces.
    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// Runs a store call under the configured timeout.
    async fn bounded<T>(
        &self,
        operation: &'static str,
        call: impl Future<Output = StorageResult<T>>,
    ) -> Result<T> {
        match tokio::time::timeout(self.config.store_timeout(), call).await {
            Ok(result) => Ok(result?),
            Err(_) => {
                tracing::warn!(operation, timeout = ?self.config.store_timeout(), "Key store call timed out");
                Err(AuthError::UpstreamUnavailable(StorageError::timeout()))
            },
        }
    }

    async fn active_key(&self) -> Result<Option<SigningKey>> {
        self.bounded("get_active_key", self.store.get_active_key()).await
    }

    /// Returns `true` if there is no active key, or the active key is at
    /// least `rotation_interval` old.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::UpstreamUnavailable`] if the store fails.
    #[tracing::instrument(skip(self))]
    pub async fn should_rotate(&self, now: DateTime<Utc>) -> Result<bool> {
        Ok(match self.active_key().await? {
            None => true,
            Some(active) => now - active.created_at >= to_chrono(self.config.rotation_interval()),
        })
    }

    /// Generates a new key and atomically makes it the active key, retiring
    /// the previous one as of `now`.
    ///
    /// This is unconditional; use [`rotate_if_due`](Self::rotate_if_due)
    /// from schedulers.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::UpstreamUnavailable`] if the store fails, in which
    /// case the previous key stays active.
    #[tracing::instrument(skip(self))]
    pub async fn rotate(&self, now: DateTime<Utc>) -> Result<SigningKey> {
        let previous = self.active_key().await?;
        let new_key = generate_key(now);

        fail_point!("rotation-before-store-write", |_| {
            Err(AuthError::UpstreamUnavailable(StorageError::internal(
                "injected failure before rotation write",
            )))
        });

        let grace_cutoff = now
            .checked_sub_signed(to_chrono(self.config.grace_period()))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        if let Err(err) = self
            .bounded("replace_active_key", self.store.replace_active_key(&new_key, now, grace_cutoff))
            .await
        {
            tracing::warn!(
                audit.action = "signing_key.rotate",
                audit.resource = %new_key.id,
                audit.result = "failure",
                error = %err,
                "Signing key rotation failed"
            );
            return Err(err);
        }

        tracing::info!(
            audit.action = "signing_key.rotate",
            audit.resource = %new_key.id,
            audit.result = "success",
            previous_kid = previous.as_ref().map(|k| k.id.as_str()).unwrap_or("none"),
            "Signing key rotated"
        );
        Ok(new_key)
    }

    /// Rotates if [`should_rotate`](Self::should_rotate) says so.
    ///
    /// Returns the new key, or `None` if the active key is not yet due.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::UpstreamUnavailable`] if the store fails.
    pub async fn rotate_if_due(&self, now: DateTime<Utc>) -> Result<Option<SigningKey>> {
        if !self.should_rotate(now).await? {
            return Ok(None);
        }
        self.rotate(now).await.map(Some)
    }

    /// Returns `true` if `key_id` names the active key or a retired key
    /// still inside its grace period at `now`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::UpstreamUnavailable`] if the store fails.
    #[tracing::instrument(skip(self))]
    pub async fn is_key_acceptable_for_verification(
        &self,
        key_id: &str,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        Ok(self.get_verification_keys(now).await?.iter().any(|key| key.id == key_id))
    }

    /// The keys a validator must try: the active key plus every retired key
    /// still in its grace period, newest first.
    ///
    /// The bootstrap key (if configured) is appended while the store has no
    /// active key, and for one grace period after the oldest stored key was
    /// created. In the latter case it is reported as retired at that moment.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::UpstreamUnavailable`] if the store fails.
    #[tracing::instrument(skip(self))]
    pub async fn get_verification_keys(&self, now: DateTime<Utc>) -> Result<Vec<SigningKey>> {
        let history = self.bounded("get_key_history", self.store.get_key_history()).await?;
        let has_active = history.iter().any(SigningKey::is_active);
        let grace = to_chrono(self.config.grace_period());
        // History is newest first; the last entry replaced the bootstrap key.
        let handover = history.last().map(|key| key.created_at);

        let mut keys: Vec<SigningKey> = history
            .into_iter()
            .filter(|key| key.is_active() || key.retired_for(now).is_some_and(|age| age < grace))
            .collect();

        if let Some(bootstrap) = &self.bootstrap {
            match handover {
                Some(handover) if has_active => {
                    if now.signed_duration_since(handover) < grace {
                        let mut key = bootstrap.key().clone();
                        key.retire(handover);
                        keys.push(key);
                    }
                },
                _ => keys.push(bootstrap.key().clone()),
            }
        }
        Ok(keys)
    }

    /// The key new tokens are signed with.
    ///
    /// # Errors
    ///
    /// - [`AuthError::UpstreamUnavailable`] if the store fails
    /// - [`AuthError::NoSigningKey`] if the store is empty and no bootstrap
    ///   secret is configured
    pub async fn signing_key(&self) -> Result<SigningKey> {
        if let Some(active) = self.active_key().await? {
            return Ok(active);
        }
        match &self.bootstrap {
            Some(bootstrap) => {
                tracing::warn!(
                    kid = BootstrapKeyProvider::BOOTSTRAP_KEY_ID,
                    "No active signing key in store, signing with bootstrap secret"
                );
                Ok(bootstrap.key().clone())
            },
            None => Err(AuthError::NoSigningKey),
        }
    }
}

/// Generates a fresh active key created at `now`.
///
/// The id embeds a UUIDv7 derived from `now`, so ids sort by creation time.
fn generate_key(now: DateTime<Utc>) -> SigningKey {
    let mut bytes = Zeroizing::new([0u8; GENERATED_SECRET_BYTES]);
    OsRng.fill_bytes(&mut bytes[..]);
    let secret = Zeroizing::new(URL_SAFE_NO_PAD.encode(&bytes[..]));

    let seconds = u64::try_from(now.timestamp()).unwrap_or_default();
    let uuid = Uuid::new_v7(Timestamp::from_unix(NoContext, seconds, now.timestamp_subsec_nanos()));

    SigningKey::builder().id(format!("key-{uuid}")).secret(secret).created_at(now).build()
}

#[derive(Debug, Default)]
struct SchedulerStats {
    checks: AtomicU64,
    rotations: AtomicU64,
    failures: AtomicU64,
}

/// Background task that calls [`KeyRotationManager::rotate_if_due`] on a
/// fixed interval.
///
/// A failed check is logged and retried on the next tick; validation keeps
/// using whatever key set the store last held. The task stops on
/// [`shutdown`](Self::shutdown) or when the scheduler is dropped.
#[derive(Debug)]
pub struct RotationScheduler {
    cancel_token: CancellationToken,
    handle: Option<JoinHandle<()>>,
    stats: Arc<SchedulerStats>,
}

impl RotationScheduler {
    /// Spawns the scheduler. The first check runs immediately, so an empty
    /// store gets its first key at startup.
    ///
    /// # Panics
    ///
    /// Must be called within a Tokio runtime context.
    #[must_use]
    pub fn spawn(manager: Arc<KeyRotationManager>, check_interval: Duration) -> Self {
        let cancel_token = CancellationToken::new();
        let stats = Arc::new(SchedulerStats::default());

        let token = cancel_token.clone();
        let task_stats = Arc::clone(&stats);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(check_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = token.cancelled() => {
                        tracing::info!("key rotation scheduler shutting down");
                        break;
                    }
                    _ = ticker.tick() => {
                        Self::run_check(&manager, &task_stats).await;
                    }
                }
            }
        });

        Self { cancel_token, handle: Some(handle), stats }
    }

    async fn run_check(manager: &KeyRotationManager, stats: &SchedulerStats) {
        match manager.rotate_if_due(Utc::now()).await {
            Ok(Some(key)) => {
                stats.rotations.fetch_add(1, Ordering::Relaxed);
                tracing::info!(kid = %key.id, "scheduled key rotation completed");
            },
            Ok(None) => tracing::debug!("active signing key not yet due for rotation"),
            Err(err) => {
                stats.failures.fetch_add(1, Ordering::Relaxed);
                tracing::error!(
                    error = %err,
                    retryable = err.is_retryable(),
                    "scheduled key rotation check failed"
                );
            },
        }
        stats.checks.fetch_add(1, Ordering::Relaxed);
    }

    /// Stops the task and waits for it to exit.
    pub async fn shutdown(mut self) {
        self.cancel_token.cancel();
        if let Some(handle) = self.handle.take()
            && let Err(err) = handle.await
        {
            tracing::warn!(error = %err, "key rotation scheduler task ended abnormally");
        }
    }

    /// Token that stops the task when cancelled.
    #[must_use]
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel_token
    }

    /// Number of finished checks, successful or not.
    #[must_use]
    pub fn completed_checks(&self) -> u64 {
        self.stats.checks.load(Ordering::Relaxed)
    }

    /// Number of checks that rotated the key.
    #[must_use]
    pub fn rotations(&self) -> u64 {
        self.stats.rotations.load(Ordering::Relaxed)
    }

    /// Number of checks that failed.
    #[must_use]
    pub fn failures(&self) -> u64 {
        self.stats.failures.load(Ordering::Relaxed)
    }
}

impl Drop for RotationScheduler {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use chrono::Duration as ChronoDuration;
    use huddle_storage::{
        auth::{KeyStatus, MemorySigningKeyStore},
        testutil::{FaultInjectingStore, FaultMode, TEST_SECRET},
    };
    use rstest::rstest;

    use super::*;

    fn t0() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    fn manager() -> (KeyRotationManager, MemorySigningKeyStore) {
        let store = MemorySigningKeyStore::new();
        (KeyRotationManager::new(Arc::new(store.clone()), AuthConfig::default()), store)
    }

    fn bootstrap() -> BootstrapKeyProvider {
        BootstrapKeyProvider::new(Zeroizing::new(TEST_SECRET.to_owned()), t0()).unwrap()
    }

    #[test]
    fn test_generated_key_shape() {
        let key = generate_key(t0());
        assert!(key.id.starts_with("key-"));
        assert!(key.is_active());
        assert_eq!(key.secret_bytes().unwrap().len(), GENERATED_SECRET_BYTES);
        assert_ne!(generate_key(t0()).id, key.id);
        assert_ne!(generate_key(t0()).secret, key.secret);
    }

    #[test]
    fn test_generated_ids_sort_by_creation_time() {
        let older = generate_key(t0());
        let newer = generate_key(t0() + ChronoDuration::seconds(1));
        assert!(older.id < newer.id);
    }

    #[tokio::test]
    async fn test_should_rotate_empty_store() {
        let (manager, _) = manager();
        assert!(manager.should_rotate(t0()).await.unwrap());
    }

    #[rstest]
    #[case::fresh(ChronoDuration::days(1), false)]
    #[case::just_before(ChronoDuration::days(90) - ChronoDuration::seconds(1), false)]
    #[case::exactly_due(ChronoDuration::days(90), true)]
    #[case::overdue(ChronoDuration::days(120), true)]
    #[tokio::test]
    async fn test_should_rotate_by_age(#[case] age: ChronoDuration, #[case] due: bool) {
        let (manager, _) = manager();
        manager.rotate(t0()).await.unwrap();
        assert_eq!(manager.should_rotate(t0() + age).await.unwrap(), due);
    }

    #[tokio::test]
    async fn test_rotate_retires_previous() {
        let (manager, store) = manager();
        let first = manager.rotate(t0()).await.unwrap();
        let later = t0() + ChronoDuration::days(90);
        let second = manager.rotate(later).await.unwrap();

        let history = store.get_key_history().await.unwrap();
        assert_eq!(history[0].id, second.id);
        assert_eq!(history[1].id, first.id);
        assert_eq!(history[1].status, KeyStatus::Retired);
        assert_eq!(history[1].retired_at, Some(later));
    }

    #[tokio::test]
    async fn test_rotate_if_due() {
        let (manager, _) = manager();
        let first = manager.rotate_if_due(t0()).await.unwrap();
        assert!(first.is_some());
        assert!(manager.rotate_if_due(t0() + ChronoDuration::days(1)).await.unwrap().is_none());
        assert!(manager.rotate_if_due(t0() + ChronoDuration::days(90)).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_grace_window() {
        let (manager, _) = manager();
        let old = manager.rotate(t0()).await.unwrap();
        let retired_at = t0() + ChronoDuration::days(90);
        let new = manager.rotate(retired_at).await.unwrap();

        let inside = retired_at + ChronoDuration::hours(23);
        assert!(manager.is_key_acceptable_for_verification(&old.id, inside).await.unwrap());
        let keys = manager.get_verification_keys(inside).await.unwrap();
        assert_eq!(keys.iter().map(|k| k.id.as_str()).collect::<Vec<_>>(), [&new.id, &old.id]);

        let boundary = retired_at + ChronoDuration::hours(24);
        assert!(!manager.is_key_acceptable_for_verification(&old.id, boundary).await.unwrap());
        assert!(manager.is_key_acceptable_for_verification(&new.id, boundary).await.unwrap());
        assert_eq!(manager.get_verification_keys(boundary).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_key_not_acceptable() {
        let (manager, _) = manager();
        manager.rotate(t0()).await.unwrap();
        assert!(!manager.is_key_acceptable_for_verification("key-unknown", t0()).await.unwrap());
    }

    #[tokio::test]
    async fn test_signing_key_without_bootstrap() {
        let (manager, _) = manager();
        assert!(matches!(manager.signing_key().await, Err(AuthError::NoSigningKey)));
    }

    #[tokio::test]
    async fn test_bootstrap_signs_until_first_rotation_then_verifies_through_grace() {
        let (manager, _) = manager();
        let manager = manager.with_bootstrap(bootstrap());

        assert_eq!(manager.signing_key().await.unwrap().id, "bootstrap");
        assert!(manager.is_key_acceptable_for_verification("bootstrap", t0()).await.unwrap());

        let handover = t0() + ChronoDuration::hours(1);
        let key = manager.rotate(handover).await.unwrap();
        assert_eq!(manager.signing_key().await.unwrap().id, key.id);

        let inside = handover + ChronoDuration::hours(23);
        let keys = manager.get_verification_keys(inside).await.unwrap();
        assert_eq!(keys.iter().map(|k| k.id.as_str()).collect::<Vec<_>>(), [&key.id, "bootstrap"]);
        assert_eq!(keys[1].status, KeyStatus::Retired);
        assert_eq!(keys[1].retired_at, Some(handover));

        let boundary = handover + ChronoDuration::hours(24);
        assert!(!manager.is_key_acceptable_for_verification("bootstrap", boundary).await.unwrap());
    }

    #[tokio::test]
    async fn test_bootstrap_grace_survives_later_rotation() {
        let (manager, _) = manager();
        let manager = manager.with_bootstrap(bootstrap());

        manager.rotate(t0()).await.unwrap();
        manager.rotate(t0() + ChronoDuration::hours(2)).await.unwrap();

        let inside = t0() + ChronoDuration::hours(12);
        assert!(manager.is_key_acceptable_for_verification("bootstrap", inside).await.unwrap());
        let after = t0() + ChronoDuration::hours(24);
        assert!(!manager.is_key_acceptable_for_verification("bootstrap", after).await.unwrap());
    }

    #[tokio::test]
    async fn test_rapid_rotations_keep_in_grace_keys_past_history_limit() {
        let (manager, store) = manager();
        let first = manager.rotate(t0()).await.unwrap();
        for i in 1..=4 {
            manager.rotate(t0() + ChronoDuration::seconds(i)).await.unwrap();
        }

        let limit = manager.config().key_history_limit();
        assert!(store.snapshot().len() > limit);
        let later = t0() + ChronoDuration::seconds(10);
        assert!(manager.is_key_acceptable_for_verification(&first.id, later).await.unwrap());
    }

    #[test]
    fn test_bootstrap_rejects_short_secret() {
        let result = BootstrapKeyProvider::new(Zeroizing::new("c2hvcnQ".to_owned()), t0());
        assert!(matches!(result, Err(AuthError::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn test_store_outage_fails_closed() {
        let store = FaultInjectingStore::new(MemorySigningKeyStore::new());
        let manager = KeyRotationManager::new(Arc::new(store.clone()), AuthConfig::default());
        manager.rotate(t0()).await.unwrap();

        store.set_mode(FaultMode::Unavailable);
        assert!(matches!(
            manager.get_verification_keys(t0()).await,
            Err(AuthError::UpstreamUnavailable(_))
        ));
        assert!(matches!(manager.signing_key().await, Err(AuthError::UpstreamUnavailable(_))));
        assert!(manager.rotate(t0()).await.is_err());

        store.set_mode(FaultMode::Healthy);
        assert_eq!(store.inner().snapshot().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_store_times_out() {
        let store = FaultInjectingStore::new(MemorySigningKeyStore::new());
        store.set_mode(FaultMode::Slow(Duration::from_secs(10)));
        let manager = KeyRotationManager::new(Arc::new(store), AuthConfig::default());

        let result = manager.should_rotate(t0()).await;
        assert!(matches!(
            result,
            Err(AuthError::UpstreamUnavailable(StorageError::Timeout { .. }))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_scheduler_rotates_empty_store_then_idles() {
        let (manager, store) = manager();
        let scheduler = RotationScheduler::spawn(Arc::new(manager), Duration::from_secs(3600));

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(scheduler.rotations(), 1);
        assert!(store.snapshot().active().is_some());

        tokio::time::sleep(Duration::from_secs(3600)).await;
        assert_eq!(scheduler.completed_checks(), 2);
        assert_eq!(scheduler.rotations(), 1);
        assert_eq!(scheduler.failures(), 0);

        scheduler.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_scheduler_counts_failures_and_keeps_running() {
        let store = FaultInjectingStore::new(MemorySigningKeyStore::new());
        store.set_mode(FaultMode::Unavailable);
        let manager = KeyRotationManager::new(Arc::new(store.clone()), AuthConfig::default());
        let scheduler = RotationScheduler::spawn(Arc::new(manager), Duration::from_secs(60));

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(scheduler.failures(), 1);

        store.set_mode(FaultMode::Healthy);
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(scheduler.rotations(), 1);

        let token = scheduler.cancel_token().clone();
        drop(scheduler);
        assert!(token.is_cancelled());
    }

    mod proptests {
        use proptest::prelude::*;

        use super::*;

        fn runtime() -> tokio::runtime::Runtime {
            tokio::runtime::Builder::new_current_thread().enable_time().build().unwrap()
        }

        proptest! {
            /// A retired key verifies strictly inside its grace window and
            /// never after it.
            #[test]
            fn grace_period_is_monotonic(offset_secs in 0i64..(3 * 86_400)) {
                let rt = runtime();
                let (acceptable, expected) = rt.block_on(async {
                    let (manager, _) = manager();
                    let old = manager.rotate(t0()).await.unwrap();
                    manager.rotate(t0() + ChronoDuration::days(90)).await.unwrap();

                    let now = t0() + ChronoDuration::days(90) + ChronoDuration::seconds(offset_secs);
                    let acceptable =
                        manager.is_key_acceptable_for_verification(&old.id, now).await.unwrap();
                    (acceptable, offset_secs < 86_400)
                });
                prop_assert_eq!(acceptable, expected);
            }

            /// Any sequence of rotations leaves exactly one active key.
            #[test]
            fn rotations_keep_single_active_key(gaps in proptest::collection::vec(0i64..200, 1..12)) {
                let rt = runtime();
                let active_count = rt.block_on(async {
                    let (manager, store) = manager();
                    let mut now = t0();
                    for gap in gaps {
                        now += ChronoDuration::days(gap);
                        manager.rotate_if_due(now).await.unwrap();
                    }
                    store.get_key_history().await.unwrap().iter().filter(|k| k.is_active()).count()
                });
                prop_assert_eq!(active_count, 1);
            }
        }
    }
}
