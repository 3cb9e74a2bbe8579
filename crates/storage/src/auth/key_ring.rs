//! The durable record of signing key state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    auth::{KeyStatus, SigningKey},
    error::{StorageError, StorageResult},
};

/// Number of key generations kept in history by default (active included).
pub const DEFAULT_KEY_HISTORY_LIMIT: usize = 4;

/// Signing key history plus a pointer to the active entry.
///
/// Keys are ordered most recent first. When `active_kid` is set, exactly one
/// entry has [`KeyStatus::Active`] and it is the entry the pointer names.
/// All mutation goes through [`KeyRing::install`], which keeps that true.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KeyRing {
    keys: Vec<SigningKey>,
    active_kid: Option<String>,
}

impl KeyRing {
    /// Creates an empty ring with no active key.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The active key, if the ring has been bootstrapped.
    #[must_use]
    pub fn active(&self) -> Option<&SigningKey> {
        let kid = self.active_kid.as_deref()?;
        self.keys.iter().find(|key| key.id == kid)
    }

    /// All retained keys, most recent first.
    #[must_use]
    pub fn history(&self) -> &[SigningKey] {
        &self.keys
    }

    /// Number of retained keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Returns `true` if the ring holds no keys.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Installs `new_key` as the active key.
    ///
    /// The previous active key (if any) is retired at
    /// `previous_key_retired_at` and the pointer moves to `new_key`. Entries
    /// beyond `history_limit` are dropped once they were retired at or before
    /// `grace_cutoff`; a key retired after the cutoff is still verifying
    /// tokens and stays regardless of the cap. Preconditions are checked
    /// before anything is mutated, so a rejected install leaves the ring
    /// untouched.
    ///
    /// # Errors
    ///
    /// - [`StorageError::Internal`] if `new_key` is not [`KeyStatus::Active`]
    ///   or `history_limit` is zero
    /// - [`StorageError::Conflict`] if a key with the same id is already
    ///   retained
    pub fn install(
        &mut self,
        new_key: SigningKey,
        previous_key_retired_at: DateTime<Utc>,
        grace_cutoff: DateTime<Utc>,
        history_limit: usize,
    ) -> StorageResult<()> {
        if new_key.status != KeyStatus::Active || new_key.retired_at.is_some() {
            return Err(StorageError::internal(format!(
                "Key {} must be active to be installed",
                new_key.id
            )));
        }
        if history_limit == 0 {
            return Err(StorageError::internal("Key history limit must be at least 1"));
        }
        if self.keys.iter().any(|key| key.id == new_key.id) {
            return Err(StorageError::conflict(new_key.id));
        }

        if let Some(kid) = self.active_kid.take()
            && let Some(previous) = self.keys.iter_mut().find(|key| key.id == kid)
        {
            previous.retire(previous_key_retired_at);
        }

        self.active_kid = Some(new_key.id.clone());
        self.keys.insert(0, new_key);

        let mut position = 0;
        self.keys.retain(|key| {
            position += 1;
            position <= history_limit || key.retired_at.is_some_and(|at| at > grace_cutoff)
        });
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use chrono::Duration;
    use proptest::prelude::*;

    use super::*;
    use crate::assert_storage_error;

    fn make_key(id: &str, created_at: DateTime<Utc>) -> SigningKey {
        SigningKey::builder()
            .id(id)
            .secret("AAECAwQFBgcICQoLDA0ODxAREhMUFRYXGBkaGxwdHh8".to_owned())
            .created_at(created_at)
            .build()
    }

    #[test]
    fn test_empty_ring_has_no_active_key() {
        let ring = KeyRing::new();
        assert!(ring.active().is_none());
        assert!(ring.is_empty());
    }

    #[test]
    fn test_install_first_key() {
        let now = Utc::now();
        let mut ring = KeyRing::new();
        ring.install(make_key("a", now), now, now, DEFAULT_KEY_HISTORY_LIMIT).unwrap();

        assert_eq!(ring.active().map(|k| k.id.as_str()), Some("a"));
        assert_eq!(ring.len(), 1);
    }

    #[test]
    fn test_install_retires_previous_key() {
        let t0 = Utc::now();
        let t1 = t0 + Duration::days(90);
        let mut ring = KeyRing::new();
        ring.install(make_key("a", t0), t0, t0, DEFAULT_KEY_HISTORY_LIMIT).unwrap();
        ring.install(make_key("b", t1), t1, t1, DEFAULT_KEY_HISTORY_LIMIT).unwrap();

        let history = ring.history();
        assert_eq!(history[0].id, "b");
        assert!(history[0].is_active());
        assert_eq!(history[1].id, "a");
        assert_eq!(history[1].status, KeyStatus::Retired);
        assert_eq!(history[1].retired_at, Some(t1));
    }

    #[test]
    fn test_install_trims_oldest_entries() {
        let t0 = Utc::now();
        let mut ring = KeyRing::new();
        for i in 0..6 {
            let at = t0 + Duration::days(i);
            ring.install(make_key(&format!("k{i}"), at), at, at - Duration::hours(24), 3).unwrap();
        }

        let ids: Vec<_> = ring.history().iter().map(|k| k.id.as_str()).collect();
        assert_eq!(ids, vec!["k5", "k4", "k3"]);
    }

    #[test]
    fn test_install_keeps_keys_in_grace_beyond_limit() {
        let t0 = Utc::now();
        let mut ring = KeyRing::new();
        for i in 0..5 {
            let at = t0 + Duration::seconds(i);
            ring.install(make_key(&format!("k{i}"), at), at, at - Duration::hours(24), 2).unwrap();
        }

        let ids: Vec<_> = ring.history().iter().map(|k| k.id.as_str()).collect();
        assert_eq!(ids, vec!["k4", "k3", "k2", "k1", "k0"]);

        // Once the cutoff passes their retirement, the extra keys go.
        let later = t0 + Duration::days(2);
        ring.install(make_key("k5", later), later, later - Duration::hours(24), 2).unwrap();
        let ids: Vec<_> = ring.history().iter().map(|k| k.id.as_str()).collect();
        assert_eq!(ids, vec!["k5", "k4"]);
    }

    #[test]
    fn test_install_duplicate_id_is_rejected_without_mutation() {
        let now = Utc::now();
        let mut ring = KeyRing::new();
        ring.install(make_key("a", now), now, now, DEFAULT_KEY_HISTORY_LIMIT).unwrap();
        let before = ring.clone();

        let result = ring.install(make_key("a", now), now, now, DEFAULT_KEY_HISTORY_LIMIT);

        assert_storage_error!(result, Conflict);
        assert_eq!(ring, before);
    }

    #[test]
    fn test_install_retired_key_is_rejected() {
        let now = Utc::now();
        let mut ring = KeyRing::new();
        let mut key = make_key("a", now);
        key.retire(now);

        let result = ring.install(key, now, now, DEFAULT_KEY_HISTORY_LIMIT);

        assert_storage_error!(result, Internal);
        assert!(ring.is_empty());
    }

    proptest! {
        #[test]
        fn prop_exactly_one_active_key(
            steps in proptest::collection::vec(1i64..200 * 24, 1..20),
            limit in 1usize..6,
        ) {
            let mut ring = KeyRing::new();
            let mut at = Utc::now();
            for (i, step) in steps.iter().enumerate() {
                at += Duration::hours(*step);
                let cutoff = at - Duration::hours(24);
                ring.install(make_key(&format!("k{i}"), at), at, cutoff, limit).unwrap();

                let active: Vec<_> = ring.history().iter().filter(|k| k.is_active()).collect();
                prop_assert_eq!(active.len(), 1);
                let expected = format!("k{i}");
                prop_assert_eq!(ring.active().map(|k| k.id.clone()), Some(expected));
                let mut beyond_limit = ring.history().iter().skip(limit);
                prop_assert!(beyond_limit.all(|k| k.retired_at.is_some_and(|r| r > cutoff)));
            }
        }
    }
}
