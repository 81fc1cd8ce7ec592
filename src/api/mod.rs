//! Backend access for the wizard.
//!
//! `ApiClient` exposes one operation per wizard step. Two implementations
//! conform to it:
//! - **Http**: talks to the real backend under `/v1`, normalizing every
//!   response through [`crate::normalize`]
//! - **Mock**: generates plausible data in-process with artificial latency
//!
//! Callers only ever hold an `Arc<dyn ApiClient>` built by [`create_client`].

pub mod http;
pub mod mock;

pub use http::HttpApiClient;
pub use mock::MockApiClient;

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::{ApiBackend, ClientConfig};
use crate::error::ApiError;
use crate::flow::model::{
    AnalyticsEventPayload, ConsistencyCheckResult, ContentMatrix, DayArticle, ExperimentRecord,
    IdentityModelCard, LaunchKit, MonetizationMap, OnboardingInput, OnboardingProfile,
    PersonaConstitution,
};
use crate::identity::StableUserId;
use crate::normalize::{DayArticleRequest, NewExperiment};

#[async_trait]
pub trait ApiClient: Send + Sync {
    /// Short backend name for logs.
    fn backend_name(&self) -> &'static str;

    /// Open an onboarding session, returning its id.
    async fn create_onboarding_session(&self) -> Result<String, ApiError>;

    /// Submit onboarding answers and fetch the resulting profile.
    async fn complete_onboarding(
        &self,
        session_id: &str,
        input: &OnboardingInput,
    ) -> Result<OnboardingProfile, ApiError>;

    async fn generate_identity_models(
        &self,
        profile: &OnboardingProfile,
    ) -> Result<Vec<IdentityModelCard>, ApiError>;

    async fn select_identity(
        &self,
        primary_id: &str,
        backup_id: Option<&str>,
    ) -> Result<(), ApiError>;

    async fn generate_persona_constitution(
        &self,
        identity_model: &IdentityModelCard,
    ) -> Result<PersonaConstitution, ApiError>;

    async fn generate_launch_kit(
        &self,
        identity_model: &IdentityModelCard,
        constitution: &PersonaConstitution,
    ) -> Result<LaunchKit, ApiError>;

    async fn generate_day_article(
        &self,
        request: &DayArticleRequest,
    ) -> Result<DayArticle, ApiError>;

    async fn run_consistency_check(
        &self,
        draft: &str,
        identity_model: &IdentityModelCard,
        constitution: &PersonaConstitution,
    ) -> Result<ConsistencyCheckResult, ApiError>;

    async fn generate_content_matrix(
        &self,
        identity_model: &IdentityModelCard,
    ) -> Result<ContentMatrix, ApiError>;

    /// Register an experiment, returning its id.
    async fn create_experiment(
        &self,
        identity_model: &IdentityModelCard,
        experiment: &NewExperiment,
    ) -> Result<String, ApiError>;

    async fn update_experiment_result(
        &self,
        experiment_id: &str,
        result: &str,
        conclusion: &str,
    ) -> Result<(), ApiError>;

    async fn list_experiments(&self) -> Result<Vec<ExperimentRecord>, ApiError>;

    async fn generate_monetization_map(
        &self,
        identity_model: &IdentityModelCard,
    ) -> Result<MonetizationMap, ApiError>;

    /// Forward one analytics event.
    async fn track_event(&self, event: &AnalyticsEventPayload) -> Result<(), ApiError>;
}

/// Build the configured client.
pub fn create_client(config: &ClientConfig, user_id: Arc<StableUserId>) -> Arc<dyn ApiClient> {
    match config.backend {
        ApiBackend::Http => {
            tracing::info!(base = %config.api_base, "Using HTTP backend");
            Arc::new(HttpApiClient::new(&config.api_base, user_id))
        }
        ApiBackend::Mock => {
            tracing::info!(
                latency_ms = config.mock_latency.as_millis() as u64,
                "Using mock backend"
            );
            Arc::new(MockApiClient::new(config.mock_latency))
        }
    }
}
