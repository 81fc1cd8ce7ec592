//! Analytics emitter.
//!
//! Every event is appended to the flow-state event log first, then forwarded
//! to the backend. Forwarding is best-effort: failures are logged and never
//! reach the caller.

use std::sync::Arc;

use chrono::Utc;
use serde_json::{Map, Value};

use crate::api::ApiClient;
use crate::flow::FlowStore;
use crate::flow::model::{AnalyticsEventName, AnalyticsEventPayload};
use crate::identity::StableUserId;

pub struct Analytics {
    api: Arc<dyn ApiClient>,
    store: Arc<FlowStore>,
    user_id: Arc<StableUserId>,
}

impl Analytics {
    pub fn new(api: Arc<dyn ApiClient>, store: Arc<FlowStore>, user_id: Arc<StableUserId>) -> Self {
        Self {
            api,
            store,
            user_id,
        }
    }

    /// Record an event and forward it. Always returns the recorded payload.
    pub async fn track(
        &self,
        event_name: AnalyticsEventName,
        identity_id: Option<&str>,
        metadata: Option<Map<String, Value>>,
    ) -> AnalyticsEventPayload {
        let payload = AnalyticsEventPayload {
            event_name,
            user_id: self.user_id.get(),
            timestamp: Utc::now(),
            identity_id: identity_id.map(str::to_string),
            metadata,
        };

        self.store.mutate(|state| state.events.push(payload.clone()));

        match self.api.track_event(&payload).await {
            Ok(()) => tracing::debug!(event = %event_name, "Event forwarded"),
            Err(e) => tracing::warn!(event = %event_name, error = %e, "Event forwarding failed"),
        }

        payload
    }
}

/// Build event metadata from key/value pairs.
pub fn metadata<const N: usize>(pairs: [(&str, Value); N]) -> Map<String, Value> {
    pairs
        .into_iter()
        .map(|(key, value)| (key.to_string(), value))
        .collect()
}
