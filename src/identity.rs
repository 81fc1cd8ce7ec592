//! Stable per-installation user identifier.
//!
//! The id is generated once, persisted under a fixed key, and reused across
//! sessions. A value already in storage always wins over the in-memory one,
//! so two handles sharing a store converge on the same id.

use std::sync::{Arc, RwLock};

use rand::Rng;

use crate::config::UserIdStrategy;
use crate::storage::KeyValueStore;

/// Storage key holding the stable user id.
pub const USER_ID_STORAGE_KEY: &str = "bss-mvp-user-id";

const BASE36: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// `len` random lowercase base36 characters.
pub fn random_base36(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| BASE36[rng.gen_range(0..BASE36.len())] as char)
        .collect()
}

/// Short prefixed id such as `identity_k3j9x2ab`.
pub fn prefixed_id(prefix: &str) -> String {
    format!("{prefix}_{}", random_base36(8))
}

pub struct StableUserId {
    storage: Arc<dyn KeyValueStore>,
    strategy: UserIdStrategy,
    current: RwLock<Option<String>>,
}

impl StableUserId {
    pub fn new(storage: Arc<dyn KeyValueStore>, strategy: UserIdStrategy) -> Self {
        Self {
            storage,
            strategy,
            current: RwLock::new(None),
        }
    }

    /// Return the stable id, generating and persisting it on first use.
    ///
    /// Storage failures degrade to an in-memory id for this process.
    pub fn get(&self) -> String {
        match self.storage.get(USER_ID_STORAGE_KEY) {
            Ok(Some(stored)) if !stored.trim().is_empty() => {
                let mut current = self.current.write().expect("user id lock poisoned");
                if current.as_deref() != Some(stored.as_str()) {
                    *current = Some(stored.clone());
                }
                return stored;
            }
            Ok(_) => {}
            Err(e) => tracing::warn!(error = %e, "Failed to read stable user id"),
        }

        let mut current = self.current.write().expect("user id lock poisoned");
        let id = current.get_or_insert_with(|| self.generate()).clone();
        if let Err(e) = self.storage.set(USER_ID_STORAGE_KEY, &id) {
            tracing::warn!(error = %e, "Failed to persist stable user id");
        }
        id
    }

    fn generate(&self) -> String {
        match self.strategy {
            UserIdStrategy::Uuid => uuid::Uuid::new_v4().to_string(),
            UserIdStrategy::PseudoRandom => prefixed_id("user"),
        }
    }
}

impl std::fmt::Debug for StableUserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StableUserId")
            .field("strategy", &self.strategy)
            .finish_non_exhaustive()
    }
}
