//! Wizard — the page actions of the identity flow.
//!
//! Each generation action checks its prerequisite against the current
//! state, runs its backend calls inside the action's [`GenerationFeedback`]
//! (so a second trigger while one is pending is suppressed), writes results
//! through [`FlowStore::mutate`], then records the matching analytics event.
//! Backend errors always propagate to the caller.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::json;

use crate::analytics::{Analytics, metadata};
use crate::api::ApiClient;
use crate::config::ClientConfig;
use crate::error::{Error, FlowError, Result};
use crate::export::{
    DeliveryChannel, DeliveryPackage, DirectoryDownload, ExportOptions, ExportOutcome,
    export_delivery_package,
};
use crate::feedback::{GenerationAction, GenerationFeedback, Triggered};
use crate::flow::model::{
    AnalyticsEventName, AnalyticsEventPayload, ConsistencyCheckResult, ContentMatrix, DayArticle,
    ExperimentRecord, IdentityModelCard, LaunchKit, MonetizationMap, MvpFlowState,
    OnboardingInput, OnboardingProfile, PersonaConstitution,
};
use crate::flow::{FlowStore, Navigation, check_navigation};
use crate::identity::StableUserId;
use crate::normalize::{DayArticleRequest, NewExperiment};

const PRIMARY_IDENTITY: &str = "selected primary identity";

pub struct Wizard {
    api: Arc<dyn ApiClient>,
    store: Arc<FlowStore>,
    analytics: Analytics,
    feedback: HashMap<GenerationAction, GenerationFeedback>,
    downloads: DirectoryDownload,
}

impl Wizard {
    pub fn new(
        api: Arc<dyn ApiClient>,
        store: Arc<FlowStore>,
        user_id: Arc<StableUserId>,
        config: &ClientConfig,
    ) -> Self {
        let feedback = GenerationAction::ALL
            .into_iter()
            .map(|action| {
                (
                    action,
                    GenerationFeedback::for_action(action, config.hint_interval),
                )
            })
            .collect();
        Self {
            analytics: Analytics::new(api.clone(), store.clone(), user_id),
            api,
            store,
            feedback,
            downloads: DirectoryDownload::new(config.data_dir.join("exports")),
        }
    }

    pub fn store(&self) -> &Arc<FlowStore> {
        &self.store
    }

    pub fn analytics(&self) -> &Analytics {
        &self.analytics
    }

    /// Owned copy of the current flow state.
    pub fn state(&self) -> MvpFlowState {
        self.store.snapshot()
    }

    /// Feedback controller for one action.
    pub fn feedback(&self, action: GenerationAction) -> &GenerationFeedback {
        &self.feedback[&action]
    }

    /// Guard check against the live state.
    pub fn navigate(&self, path: &str) -> Navigation {
        self.store.read(|state| check_navigation(path, state))
    }

    pub async fn complete_onboarding(
        &self,
        input: OnboardingInput,
    ) -> Result<Triggered<OnboardingProfile>> {
        let input = &input;
        self.feedback(GenerationAction::Onboarding)
            .run(|| async move {
                self.analytics
                    .track(AnalyticsEventName::OnboardingStarted, None, None)
                    .await;

                let session_id = self.api.create_onboarding_session().await?;
                self.store.mutate(|s| {
                    s.session_id = Some(session_id.clone());
                    s.onboarding_input = input.clone();
                });

                let profile = self.api.complete_onboarding(&session_id, input).await?;
                self.store.mutate(|s| s.profile = Some(profile.clone()));
                tracing::info!(
                    session = %session_id,
                    skills = profile.skill_stack.len(),
                    "Onboarding completed"
                );

                self.analytics
                    .track(
                        AnalyticsEventName::OnboardingCompleted,
                        None,
                        Some(metadata([
                            ("sessionId", json!(session_id)),
                            ("weeklyHours", json!(profile.weekly_hours)),
                        ])),
                    )
                    .await;
                Ok::<_, Error>(profile)
            })
            .await
    }

    pub async fn generate_identity_models(&self) -> Result<Triggered<Vec<IdentityModelCard>>> {
        let profile = self.require("identity models", "onboarding profile", |s| {
            s.profile.clone()
        })?;
        let profile = &profile;

        self.feedback(GenerationAction::IdentityModels)
            .run(|| async move {
                let models = self.api.generate_identity_models(profile).await?;
                for warning in models.iter().flat_map(IdentityModelCard::validation_warnings) {
                    tracing::warn!(%warning, "Identity model below expectations");
                }

                self.store.mutate(|s| {
                    s.identity_models = models.clone();
                    if s.selected_primary_model().is_none() {
                        s.selected_primary_id = None;
                    }
                    if s.selected_backup_model().is_none() {
                        s.selected_backup_id = None;
                    }
                });
                tracing::info!(count = models.len(), "Identity models generated");

                self.analytics
                    .track(
                        AnalyticsEventName::IdentityModelsGenerated,
                        None,
                        Some(metadata([("count", json!(models.len()))])),
                    )
                    .await;
                Ok::<_, Error>(models)
            })
            .await
    }

    /// Choose the primary identity and an optional distinct backup.
    pub async fn select_identity(&self, primary_id: &str, backup_id: Option<&str>) -> Result<()> {
        if backup_id == Some(primary_id) {
            return Err(FlowError::SameIdentitySelected {
                id: primary_id.to_string(),
            }
            .into());
        }
        let missing = self.store.read(|s| {
            std::iter::once(primary_id)
                .chain(backup_id)
                .find(|id| s.identity(id).is_none())
                .map(str::to_string)
        });
        if let Some(id) = missing {
            return Err(FlowError::UnknownIdentity { id }.into());
        }

        self.api.select_identity(primary_id, backup_id).await?;
        self.store.mutate(|s| {
            s.selected_primary_id = Some(primary_id.to_string());
            s.selected_backup_id = backup_id.map(str::to_string);
        });
        tracing::info!(primary = primary_id, backup = ?backup_id, "Identity selected");

        self.analytics
            .track(
                AnalyticsEventName::IdentitySelected,
                Some(primary_id),
                Some(metadata([("backupId", json!(backup_id))])),
            )
            .await;
        Ok(())
    }

    pub async fn generate_persona(&self) -> Result<Triggered<PersonaConstitution>> {
        let model = self.require("persona constitution", PRIMARY_IDENTITY, |s| {
            s.selected_primary_model().cloned()
        })?;
        let model = &model;

        self.feedback(GenerationAction::PersonaConstitution)
            .run(|| async move {
                let persona = self.api.generate_persona_constitution(model).await?;
                self.store.mutate(|s| s.persona = Some(persona.clone()));
                tracing::info!(identity = %model.id, "Persona constitution generated");
                Ok::<_, Error>(persona)
            })
            .await
    }

    pub async fn generate_launch_kit(&self) -> Result<Triggered<LaunchKit>> {
        let model = self.require("launch kit", PRIMARY_IDENTITY, |s| {
            s.selected_primary_model().cloned()
        })?;
        let persona = self.require("launch kit", "persona constitution", |s| s.persona.clone())?;
        let (model, persona) = (&model, &persona);

        self.feedback(GenerationAction::LaunchKit)
            .run(|| async move {
                let kit = self.api.generate_launch_kit(model, persona).await?;
                self.store.mutate(|s| s.launch_kit = Some(kit.clone()));
                tracing::info!(days = kit.days.len(), "Launch kit generated");

                self.analytics
                    .track(
                        AnalyticsEventName::LaunchKitGenerated,
                        Some(&model.id),
                        Some(metadata([("days", json!(kit.days.len()))])),
                    )
                    .await;
                Ok::<_, Error>(kit)
            })
            .await
    }

    /// Expand one launch-kit day into a full article. Not persisted.
    pub async fn generate_day_article(&self, day_no: u32) -> Result<Triggered<DayArticle>> {
        let kit = self.require("day article", "launch kit", |s| s.launch_kit.clone())?;
        let model = self.require("day article", PRIMARY_IDENTITY, |s| {
            s.selected_primary_model().cloned()
        })?;
        let day = kit
            .day(day_no)
            .ok_or(FlowError::UnknownLaunchDay { day: day_no })?;
        let request = DayArticleRequest {
            identity_model: model,
            day_no,
            theme: day.theme.clone(),
            draft_outline: day.draft_outline.clone(),
            opening: day.opening.clone(),
        };
        let request = &request;

        self.feedback(GenerationAction::DayArticle)
            .run(|| async move {
                let article = self.api.generate_day_article(request).await?;
                tracing::info!(day = day_no, "Day article generated");
                Ok::<_, Error>(article)
            })
            .await
    }

    pub async fn run_consistency_check(
        &self,
        draft: &str,
    ) -> Result<Triggered<ConsistencyCheckResult>> {
        self.require("consistency check", "launch kit", |s| {
            s.launch_kit.as_ref().map(|_| ())
        })?;
        let model = self.require("consistency check", PRIMARY_IDENTITY, |s| {
            s.selected_primary_model().cloned()
        })?;
        let persona = self.require("consistency check", "persona constitution", |s| {
            s.persona.clone()
        })?;
        let (model, persona) = (&model, &persona);

        self.feedback(GenerationAction::ConsistencyCheck)
            .run(|| async move {
                self.store.mutate(|s| s.draft_to_check = draft.to_string());
                let result = self.api.run_consistency_check(draft, model, persona).await?;
                self.store
                    .mutate(|s| s.consistency_check = Some(result.clone()));
                tracing::info!(
                    score = result.score,
                    deviations = result.deviations.len(),
                    "Consistency check finished"
                );

                self.analytics
                    .track(
                        AnalyticsEventName::ConsistencyCheckTriggered,
                        Some(&model.id),
                        Some(metadata([
                            ("score", json!(result.score)),
                            ("risk", json!(result.risk_warning.is_some())),
                        ])),
                    )
                    .await;
                Ok::<_, Error>(result)
            })
            .await
    }

    pub async fn generate_content_matrix(&self) -> Result<Triggered<ContentMatrix>> {
        self.require("content matrix", "consistency check result", |s| {
            s.consistency_check.as_ref().map(|_| ())
        })?;
        let model = self.require("content matrix", PRIMARY_IDENTITY, |s| {
            s.selected_primary_model().cloned()
        })?;
        let model = &model;

        self.feedback(GenerationAction::ContentMatrix)
            .run(|| async move {
                let matrix = self.api.generate_content_matrix(model).await?;
                self.store.mutate(|s| s.content_matrix = Some(matrix.clone()));
                tracing::info!(pillars = matrix.pillars.len(), "Content matrix generated");
                Ok::<_, Error>(matrix)
            })
            .await
    }

    /// Register an experiment and refresh the list from the backend.
    pub async fn create_experiment(
        &self,
        experiment: NewExperiment,
    ) -> Result<Triggered<ExperimentRecord>> {
        self.require("experiments", "content matrix", |s| {
            s.content_matrix.as_ref().map(|_| ())
        })?;
        let model = self.require("experiments", PRIMARY_IDENTITY, |s| {
            s.selected_primary_model().cloned()
        })?;
        let (model, experiment) = (&model, &experiment);

        self.feedback(GenerationAction::Experiment)
            .run(|| async move {
                let id = self.api.create_experiment(model, experiment).await?;
                let mut experiments = self.api.list_experiments().await?;
                let record = match experiments.iter().find(|e| e.id == id) {
                    Some(record) => record.clone(),
                    None => {
                        tracing::debug!(%id, "Created experiment missing from list");
                        let record = ExperimentRecord {
                            id: id.clone(),
                            hypothesis: experiment.hypothesis.clone(),
                            variables: experiment.variables.clone(),
                            execution_cycle: experiment.execution_cycle.clone(),
                            ..Default::default()
                        };
                        experiments.insert(0, record.clone());
                        record
                    }
                };
                self.store.mutate(|s| s.experiments = experiments);
                tracing::info!(%id, "Experiment created");

                self.analytics
                    .track(
                        AnalyticsEventName::ExperimentCreated,
                        Some(&model.id),
                        Some(metadata([("experimentId", json!(id))])),
                    )
                    .await;
                Ok::<_, Error>(record)
            })
            .await
    }

    /// Record an experiment outcome and refresh the list.
    pub async fn record_experiment_result(
        &self,
        experiment_id: &str,
        result: &str,
        conclusion: &str,
    ) -> Result<Triggered<Vec<ExperimentRecord>>> {
        self.require("experiments", "content matrix", |s| {
            s.content_matrix.as_ref().map(|_| ())
        })?;
        let known = self
            .store
            .read(|s| s.experiments.iter().any(|e| e.id == experiment_id));
        if !known {
            return Err(FlowError::UnknownExperiment {
                id: experiment_id.to_string(),
            }
            .into());
        }

        self.feedback(GenerationAction::Experiment)
            .run(|| async move {
                self.api
                    .update_experiment_result(experiment_id, result, conclusion)
                    .await?;
                let experiments = self.api.list_experiments().await?;
                self.store.mutate(|s| s.experiments = experiments.clone());
                tracing::info!(id = experiment_id, "Experiment result recorded");
                Ok::<_, Error>(experiments)
            })
            .await
    }

    pub async fn generate_monetization_map(&self) -> Result<Triggered<MonetizationMap>> {
        self.require("monetization map", "at least one experiment", |s| {
            (!s.experiments.is_empty()).then_some(())
        })?;
        let model = self.require("monetization map", PRIMARY_IDENTITY, |s| {
            s.selected_primary_model().cloned()
        })?;
        let model = &model;

        self.feedback(GenerationAction::MonetizationMap)
            .run(|| async move {
                let map = self.api.generate_monetization_map(model).await?;
                self.store.mutate(|s| s.monetization_map = Some(map.clone()));
                tracing::info!(weeks = map.weeks.len(), "Monetization map generated");

                self.analytics
                    .track(
                        AnalyticsEventName::MonetizationPlanStarted,
                        Some(&model.id),
                        Some(metadata([("primaryPath", json!(map.primary_path))])),
                    )
                    .await;
                Ok::<_, Error>(map)
            })
            .await
    }

    pub async fn confirm_first_revenue(&self, note: &str) -> AnalyticsEventPayload {
        let primary = self.store.read(|s| s.selected_primary_id.clone());
        self.analytics
            .track(
                AnalyticsEventName::FirstRevenueOrLeadConfirmed,
                primary.as_deref(),
                Some(metadata([("note", json!(note))])),
            )
            .await
    }

    pub async fn mark_content_published(&self) -> AnalyticsEventPayload {
        let primary = self.store.read(|s| s.selected_primary_id.clone());
        self.analytics
            .track(AnalyticsEventName::ContentPublished, primary.as_deref(), None)
            .await
    }

    /// Deliver the current state as a JSON package.
    ///
    /// A native save API wins when present; otherwise the package goes to
    /// the download sink, defaulting to `<data_dir>/exports`.
    pub async fn export(&self, options: ExportOptions) -> Result<ExportOutcome> {
        let package = self.store.read(DeliveryPackage::from_state);
        let channel = match (&options.native, &options.download) {
            (Some(native), _) => DeliveryChannel::Native(native.as_ref()),
            (None, Some(sink)) => DeliveryChannel::Download(sink.as_ref()),
            (None, None) => DeliveryChannel::Download(&self.downloads),
        };
        Ok(export_delivery_package(&package, options.file_name.clone(), channel).await?)
    }

    /// Back to a fresh flow.
    pub fn reset(&self) {
        for feedback in self.feedback.values() {
            feedback.reset();
        }
        self.store.reset();
    }

    fn require<T>(
        &self,
        stage: &'static str,
        requirement: &'static str,
        pick: impl FnOnce(&MvpFlowState) -> Option<T>,
    ) -> Result<T> {
        self.store.read(pick).ok_or_else(|| {
            tracing::debug!(stage, requirement, "Prerequisite missing");
            FlowError::MissingPrerequisite { stage, requirement }.into()
        })
    }
}

impl std::fmt::Debug for Wizard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Wizard")
            .field("backend", &self.api.backend_name())
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::MockApiClient;
    use crate::config::UserIdStrategy;
    use crate::storage::{KeyValueStore, MemoryStore};
    use std::time::Duration;

    fn wizard() -> Wizard {
        let storage: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let store = Arc::new(FlowStore::load(storage.clone()));
        let ids = Arc::new(StableUserId::new(storage, UserIdStrategy::Uuid));
        Wizard::new(
            Arc::new(MockApiClient::new(Duration::ZERO)),
            store,
            ids,
            &ClientConfig::default(),
        )
    }

    fn sample_input() -> OnboardingInput {
        OnboardingInput {
            skills: vec!["写作".into()],
            interests: vec!["效率".into(), "理财".into(), "阅读".into()],
            ..Default::default()
        }
    }

    async fn with_models(wizard: &Wizard) -> Vec<IdentityModelCard> {
        wizard.complete_onboarding(sample_input()).await.unwrap();
        wizard
            .generate_identity_models()
            .await
            .unwrap()
            .completed()
            .unwrap()
    }

    fn missing(err: Error) -> &'static str {
        match err {
            Error::Flow(FlowError::MissingPrerequisite { requirement, .. }) => requirement,
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn stages_refuse_to_run_early() {
        let wizard = wizard();
        assert_eq!(
            missing(wizard.generate_identity_models().await.unwrap_err()),
            "onboarding profile"
        );
        assert_eq!(
            missing(wizard.generate_persona().await.unwrap_err()),
            PRIMARY_IDENTITY
        );
        assert_eq!(
            missing(wizard.run_consistency_check("draft").await.unwrap_err()),
            "launch kit"
        );
        assert_eq!(
            missing(wizard.generate_monetization_map().await.unwrap_err()),
            "at least one experiment"
        );
        // Refusals never touch the feedback controller.
        assert_eq!(
            wizard.feedback(GenerationAction::IdentityModels).status(),
            crate::feedback::GenerationStatus::Idle
        );
    }

    #[tokio::test(start_paused = true)]
    async fn onboarding_tracks_start_and_completion() {
        let wizard = wizard();
        let profile = wizard
            .complete_onboarding(sample_input())
            .await
            .unwrap()
            .completed()
            .unwrap();

        let state = wizard.state();
        assert_eq!(state.profile, Some(profile));
        assert!(state.session_id.is_some());
        assert_eq!(state.onboarding_input, sample_input());
        let names: Vec<_> = state.events.iter().map(|e| e.event_name).collect();
        assert_eq!(
            names,
            [
                AnalyticsEventName::OnboardingStarted,
                AnalyticsEventName::OnboardingCompleted
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn selection_rules() {
        let wizard = wizard();
        let models = with_models(&wizard).await;
        let (a, b) = (models[0].id.as_str(), models[1].id.as_str());

        let err = wizard.select_identity(a, Some(a)).await.unwrap_err();
        assert!(matches!(err, Error::Flow(FlowError::SameIdentitySelected { .. })));

        let err = wizard.select_identity("ghost", None).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Flow(FlowError::UnknownIdentity { ref id }) if id == "ghost"
        ));

        wizard.select_identity(a, Some(b)).await.unwrap();
        let state = wizard.state();
        assert_eq!(state.selected_primary_id.as_deref(), Some(a));
        assert_eq!(state.selected_backup_id.as_deref(), Some(b));
        let last = state.events.last().unwrap();
        assert_eq!(last.event_name, AnalyticsEventName::IdentitySelected);
        assert_eq!(last.identity_id.as_deref(), Some(a));
    }

    #[tokio::test(start_paused = true)]
    async fn regeneration_clears_vanished_selections() {
        let wizard = wizard();
        let models = with_models(&wizard).await;
        wizard.select_identity(&models[0].id, None).await.unwrap();

        // Mock ids are fresh on every generation.
        wizard.generate_identity_models().await.unwrap();
        let state = wizard.state();
        assert!(state.selected_primary_id.is_none());
        assert!(state.selected_backup_id.is_none());
        assert_eq!(
            wizard.navigate(crate::flow::guard::PERSONA_CONSTITUTION_ROUTE),
            Navigation::Redirect(crate::flow::guard::IDENTITY_MODELS_ROUTE)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_day_and_experiment_are_rejected() {
        let wizard = wizard();
        let models = with_models(&wizard).await;
        wizard.select_identity(&models[0].id, None).await.unwrap();
        wizard.generate_persona().await.unwrap();
        wizard.generate_launch_kit().await.unwrap();

        let article = wizard.generate_day_article(1).await.unwrap().completed().unwrap();
        assert_eq!(article.day_no, 1);
        let err = wizard.generate_day_article(99).await.unwrap_err();
        assert!(matches!(err, Error::Flow(FlowError::UnknownLaunchDay { day: 99 })));

        wizard.run_consistency_check("草稿").await.unwrap();
        wizard.generate_content_matrix().await.unwrap();
        let err = wizard
            .record_experiment_result("missing", "r", "c")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Flow(FlowError::UnknownExperiment { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn tracking_only_actions() {
        let wizard = wizard();
        let payload = wizard.confirm_first_revenue("first lead").await;
        assert_eq!(payload.event_name, AnalyticsEventName::FirstRevenueOrLeadConfirmed);
        assert!(payload.identity_id.is_none());
        assert_eq!(payload.metadata.unwrap()["note"], "first lead");

        wizard.mark_content_published().await;
        assert_eq!(wizard.state().events.len(), 2);
    }
}
