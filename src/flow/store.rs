//! FlowStore — the single owner of `MvpFlowState` and its persistence.
//!
//! The persisted document is `{"version": 1, "state": {...}}` under
//! [`FLOW_STORAGE_KEY`]. The version tag is checked before the payload is
//! trusted; anything unreadable is purged and replaced with defaults.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::model::{IdentityModelCard, MvpFlowState};
use crate::storage::KeyValueStore;

/// Schema version of the persisted flow document. Compared for equality.
pub const FLOW_STATE_VERSION: u64 = 1;

/// Storage key of the persisted flow document.
pub const FLOW_STORAGE_KEY: &str = "bss-mvp-flow-state-v1";

#[derive(Serialize)]
struct PersistedFlow<'a> {
    version: u64,
    state: &'a MvpFlowState,
}

/// Why a persisted document was discarded.
#[derive(Debug, thiserror::Error)]
enum Discarded {
    #[error("not valid JSON: {0}")]
    Corrupt(serde_json::Error),

    #[error("unsupported schema version {0:?}")]
    Version(Option<u64>),

    #[error("missing state payload")]
    MissingState,

    #[error("state payload does not match the model: {0}")]
    Shape(serde_json::Error),
}

fn decode(raw: &str) -> Result<MvpFlowState, Discarded> {
    let document: Value = serde_json::from_str(raw).map_err(Discarded::Corrupt)?;
    let version = document.get("version").and_then(Value::as_u64);
    if version != Some(FLOW_STATE_VERSION) {
        return Err(Discarded::Version(version));
    }
    let state = document.get("state").ok_or(Discarded::MissingState)?;
    MvpFlowState::deserialize(state).map_err(Discarded::Shape)
}

pub struct FlowStore {
    storage: Arc<dyn KeyValueStore>,
    state: RwLock<MvpFlowState>,
    hydrated: AtomicBool,
}

impl FlowStore {
    /// A store holding defaults. Mutations are not persisted until
    /// [`FlowStore::hydrate`] has run.
    pub fn new(storage: Arc<dyn KeyValueStore>) -> Self {
        Self {
            storage,
            state: RwLock::new(MvpFlowState::default()),
            hydrated: AtomicBool::new(false),
        }
    }

    /// Construct and hydrate from storage in one step.
    pub fn load(storage: Arc<dyn KeyValueStore>) -> Self {
        let store = Self::new(storage);
        store.hydrate();
        store
    }

    /// Replace in-memory state with the persisted document, or defaults.
    ///
    /// Never fails: read errors, corrupt JSON, and version mismatches all
    /// fall back to defaults, purging the bad entry where there is one.
    pub fn hydrate(&self) {
        let state = match self.storage.get(FLOW_STORAGE_KEY) {
            Ok(Some(raw)) => match decode(&raw) {
                Ok(state) => {
                    tracing::debug!(
                        models = state.identity_models.len(),
                        events = state.events.len(),
                        "Restored flow state"
                    );
                    state
                }
                Err(reason) => {
                    tracing::warn!(%reason, "Discarding persisted flow state");
                    if let Err(e) = self.storage.remove(FLOW_STORAGE_KEY) {
                        tracing::warn!(error = %e, "Failed to purge persisted flow state");
                    }
                    MvpFlowState::default()
                }
            },
            Ok(None) => MvpFlowState::default(),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read persisted flow state");
                MvpFlowState::default()
            }
        };

        *self.state.write().expect("flow state lock poisoned") = state;
        self.hydrated.store(true, Ordering::Release);
    }

    pub fn is_hydrated(&self) -> bool {
        self.hydrated.load(Ordering::Acquire)
    }

    /// Read the state under the lock.
    pub fn read<R>(&self, f: impl FnOnce(&MvpFlowState) -> R) -> R {
        let state = self.state.read().expect("flow state lock poisoned");
        f(&*state)
    }

    /// Owned copy of the current state.
    pub fn snapshot(&self) -> MvpFlowState {
        self.read(MvpFlowState::clone)
    }

    /// Apply a change and, once hydrated, persist immediately.
    ///
    /// Persistence failures are logged and do not fail the mutation.
    pub fn mutate<R>(&self, f: impl FnOnce(&mut MvpFlowState) -> R) -> R {
        let mut state = self.state.write().expect("flow state lock poisoned");
        let result = f(&mut *state);
        if self.is_hydrated() {
            self.persist(&state);
        }
        result
    }

    /// Fresh defaults in memory; the persisted document is removed.
    pub fn reset(&self) {
        *self.state.write().expect("flow state lock poisoned") = MvpFlowState::default();
        if let Err(e) = self.storage.remove(FLOW_STORAGE_KEY) {
            tracing::warn!(error = %e, "Failed to clear persisted flow state");
        }
        tracing::info!("Flow state reset");
    }

    pub fn selected_primary_model(&self) -> Option<IdentityModelCard> {
        self.read(|s| s.selected_primary_model().cloned())
    }

    pub fn selected_backup_model(&self) -> Option<IdentityModelCard> {
        self.read(|s| s.selected_backup_model().cloned())
    }

    fn persist(&self, state: &MvpFlowState) {
        let document = PersistedFlow {
            version: FLOW_STATE_VERSION,
            state,
        };
        let raw = match serde_json::to_string(&document) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to serialize flow state");
                return;
            }
        };
        if let Err(e) = self.storage.set(FLOW_STORAGE_KEY, &raw) {
            tracing::warn!(error = %e, "Failed to persist flow state");
        }
    }
}

impl std::fmt::Debug for FlowStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlowStore")
            .field("hydrated", &self.is_hydrated())
            .finish_non_exhaustive()
    }
}
