//! HTTP-backed API client.
//!
//! Every call goes through `execute`, which maps transport failures and
//! non-success statuses into [`ApiError`] before any response is mapped.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder};
use serde::Serialize;
use serde_json::Value;

use super::ApiClient;
use crate::error::ApiError;
use crate::flow::model::{
    AnalyticsEventPayload, ConsistencyCheckResult, ContentMatrix, DayArticle, ExperimentRecord,
    IdentityModelCard, LaunchKit, MonetizationMap, OnboardingInput, OnboardingProfile,
    PersonaConstitution,
};
use crate::identity::StableUserId;
use crate::normalize::dto;
use crate::normalize::fields::text;
use crate::normalize::requests::{
    CompleteOnboardingBody, ConsistencyCheckBody, DayArticleBody, EventBody,
    ExperimentResultBody, GenerateIdentityModelsBody, IdentityScopedBody, IdentitySelectionBody,
    NewExperimentBody, UserScopedBody,
};
use crate::normalize::{DayArticleRequest, NewExperiment};

/// Separator for flattened 422 validation messages.
const VALIDATION_SEPARATOR: &str = "；";

pub struct HttpApiClient {
    client: reqwest::Client,
    base_url: String,
    user_id: Arc<StableUserId>,
}

impl HttpApiClient {
    pub fn new(api_base: &str, user_id: Arc<StableUserId>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: api_base.trim_end_matches('/').to_string(),
            user_id,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1{path}", self.base_url)
    }

    async fn get(&self, path: &str) -> Result<Value, ApiError> {
        self.execute(Method::GET, path, self.client.get(self.url(path)))
            .await
    }

    async fn send<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: &B,
    ) -> Result<Value, ApiError> {
        let builder = self
            .client
            .request(method.clone(), self.url(path))
            .json(body);
        self.execute(method, path, builder).await
    }

    async fn execute(
        &self,
        method: Method,
        path: &str,
        builder: RequestBuilder,
    ) -> Result<Value, ApiError> {
        tracing::debug!(%method, path, "Backend request");

        let response = builder.send().await.map_err(|e| {
            tracing::warn!(%method, path, error = %e, "Backend unreachable");
            ApiError::Transport {
                reason: e.to_string(),
            }
        })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| ApiError::Transport {
            reason: e.to_string(),
        })?;

        if !status.is_success() {
            let err = ApiError::from_status(status.as_u16(), error_detail(&body));
            tracing::warn!(%method, path, status = status.as_u16(), error = %err, "Backend request failed");
            return Err(err);
        }

        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&body).map_err(|e| ApiError::InvalidResponse {
            reason: format!("{method} {path} returned non-JSON body: {e}"),
        })
    }

    /// Issue a `*/generate` call and fetch the created resource by id.
    async fn generate_then_fetch(
        &self,
        resource: &str,
        identity_model: &IdentityModelCard,
    ) -> Result<Value, ApiError> {
        let user_id = self.user_id.get();
        let created = self
            .send(
                Method::POST,
                &format!("/{resource}/generate"),
                &IdentityScopedBody {
                    user_id: &user_id,
                    identity_model_id: &identity_model.id,
                },
            )
            .await?;
        let id = created_id(&created).ok_or_else(|| ApiError::InvalidResponse {
            reason: format!("{resource} generate returned no id"),
        })?;
        self.get(&format!("/{resource}/{id}")).await
    }
}

/// Id field of a create/generate acknowledgement.
fn created_id(created: &Value) -> Option<String> {
    Some(text(created.get("id"))).filter(|id| !id.is_empty())
}

/// Backend-supplied detail text of an error response.
///
/// Accepts a bare string body, `{"detail": "..."}`, and the 422 shape
/// `{"detail": [{"msg": "..."}, ...]}` whose messages are joined.
fn error_detail(body: &str) -> Option<String> {
    let body = body.trim();
    if body.is_empty() {
        return None;
    }
    let value = match serde_json::from_str::<Value>(body) {
        Ok(value) => value,
        Err(_) => return Some(body.to_string()),
    };
    let detail = match &value {
        Value::String(s) => s.clone(),
        Value::Object(map) => match map.get("detail") {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|item| match item {
                    Value::String(s) => Some(s.as_str()),
                    Value::Object(entry) => entry.get("msg").and_then(Value::as_str),
                    _ => None,
                })
                .filter(|msg| !msg.is_empty())
                .collect::<Vec<_>>()
                .join(VALIDATION_SEPARATOR),
            _ => String::new(),
        },
        _ => String::new(),
    };
    Some(detail).filter(|d| !d.is_empty())
}

#[async_trait]
impl ApiClient for HttpApiClient {
    fn backend_name(&self) -> &'static str {
        "http"
    }

    async fn create_onboarding_session(&self) -> Result<String, ApiError> {
        let user_id = self.user_id.get();
        let created = self
            .send(
                Method::POST,
                "/onboarding/sessions",
                &UserScopedBody { user_id: &user_id },
            )
            .await?;
        created_id(&created).ok_or_else(|| ApiError::InvalidResponse {
            reason: "onboarding session returned no id".to_string(),
        })
    }

    async fn complete_onboarding(
        &self,
        session_id: &str,
        input: &OnboardingInput,
    ) -> Result<OnboardingProfile, ApiError> {
        self.send(
            Method::POST,
            &format!("/onboarding/sessions/{session_id}/complete"),
            &CompleteOnboardingBody::new(session_id, input),
        )
        .await?;
        let profile = self
            .get(&format!("/onboarding/sessions/{session_id}/profile"))
            .await?;
        Ok(dto::map_profile(&profile))
    }

    async fn generate_identity_models(
        &self,
        profile: &OnboardingProfile,
    ) -> Result<Vec<IdentityModelCard>, ApiError> {
        let user_id = self.user_id.get();
        self.send(
            Method::POST,
            "/identity-models/generate",
            &GenerateIdentityModelsBody::new(&user_id, profile),
        )
        .await?;
        let models = self
            .get(&format!("/identity-models/users/{user_id}"))
            .await?;
        Ok(dto::map_identity_models(&models))
    }

    async fn select_identity(
        &self,
        primary_id: &str,
        backup_id: Option<&str>,
    ) -> Result<(), ApiError> {
        let user_id = self.user_id.get();
        self.send(
            Method::POST,
            "/identity-selections",
            &IdentitySelectionBody {
                user_id: &user_id,
                primary_identity_id: primary_id,
                backup_identity_id: backup_id,
            },
        )
        .await?;
        Ok(())
    }

    async fn generate_persona_constitution(
        &self,
        identity_model: &IdentityModelCard,
    ) -> Result<PersonaConstitution, ApiError> {
        let user_id = self.user_id.get();
        let created = self
            .send(
                Method::POST,
                "/persona-constitutions/generate",
                &IdentityScopedBody {
                    user_id: &user_id,
                    identity_model_id: &identity_model.id,
                },
            )
            .await?;
        let path = match created_id(&created) {
            Some(id) => format!("/persona-constitutions/{id}"),
            None => format!("/persona-constitutions/users/{user_id}/latest"),
        };
        Ok(dto::map_persona(&self.get(&path).await?))
    }

    async fn generate_launch_kit(
        &self,
        identity_model: &IdentityModelCard,
        _constitution: &PersonaConstitution,
    ) -> Result<LaunchKit, ApiError> {
        let kit = self
            .generate_then_fetch("launch-kits", identity_model)
            .await?;
        Ok(dto::map_launch_kit(&kit))
    }

    async fn generate_day_article(
        &self,
        request: &DayArticleRequest,
    ) -> Result<DayArticle, ApiError> {
        let user_id = self.user_id.get();
        let article = self
            .send(
                Method::POST,
                "/launch-kits/day-articles/generate",
                &DayArticleBody {
                    user_id: &user_id,
                    identity_model_id: &request.identity_model.id,
                    constitution_id: None,
                    day_no: request.day_no,
                    theme: &request.theme,
                    draft_or_outline: &request.draft_outline,
                    opening_text: &request.opening,
                },
            )
            .await?;
        Ok(dto::map_day_article(&article))
    }

    async fn run_consistency_check(
        &self,
        draft: &str,
        identity_model: &IdentityModelCard,
        _constitution: &PersonaConstitution,
    ) -> Result<ConsistencyCheckResult, ApiError> {
        let user_id = self.user_id.get();
        let response = self
            .send(
                Method::POST,
                "/consistency-checks",
                &ConsistencyCheckBody {
                    user_id: &user_id,
                    identity_model_id: &identity_model.id,
                    draft_text: draft,
                },
            )
            .await?;
        dto::map_consistency_check(&response)
    }

    async fn generate_content_matrix(
        &self,
        identity_model: &IdentityModelCard,
    ) -> Result<ContentMatrix, ApiError> {
        let matrix = self
            .generate_then_fetch("content-matrices", identity_model)
            .await?;
        Ok(dto::map_content_matrix(&matrix))
    }

    async fn create_experiment(
        &self,
        identity_model: &IdentityModelCard,
        experiment: &NewExperiment,
    ) -> Result<String, ApiError> {
        let user_id = self.user_id.get();
        let created = self
            .send(
                Method::POST,
                "/experiments",
                &NewExperimentBody {
                    user_id: &user_id,
                    identity_model_id: &identity_model.id,
                    hypothesis: &experiment.hypothesis,
                    variables: &experiment.variables,
                    execution_cycle: &experiment.execution_cycle,
                },
            )
            .await?;
        created_id(&created).ok_or_else(|| ApiError::InvalidResponse {
            reason: "experiment create returned no id".to_string(),
        })
    }

    async fn update_experiment_result(
        &self,
        experiment_id: &str,
        result: &str,
        conclusion: &str,
    ) -> Result<(), ApiError> {
        self.send(
            Method::PATCH,
            &format!("/experiments/{experiment_id}/result"),
            &ExperimentResultBody { result, conclusion },
        )
        .await?;
        Ok(())
    }

    async fn list_experiments(&self) -> Result<Vec<ExperimentRecord>, ApiError> {
        let user_id = self.user_id.get();
        let experiments = self.get(&format!("/experiments/users/{user_id}")).await?;
        Ok(dto::map_experiments(&experiments))
    }

    async fn generate_monetization_map(
        &self,
        identity_model: &IdentityModelCard,
    ) -> Result<MonetizationMap, ApiError> {
        let map = self
            .generate_then_fetch("monetization-maps", identity_model)
            .await?;
        Ok(dto::map_monetization_map(&map))
    }

    async fn track_event(&self, event: &AnalyticsEventPayload) -> Result<(), ApiError> {
        self.send(Method::POST, "/events", &EventBody::new(event))
            .await?;
        Ok(())
    }
}
