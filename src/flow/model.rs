//! Wizard data model — onboarding input, generated artifacts, and the
//! `MvpFlowState` aggregate that ties them together.
//!
//! Field names serialize in camelCase; this is the persisted document
//! format and the export format.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Target cardinality for identity tone examples. Fewer is a soft warning.
pub const MIN_TONE_EXAMPLES: usize = 5;

/// Platforms recommended when the backend does not say otherwise.
pub const DEFAULT_RECOMMENDED_PLATFORMS: [&str; 3] = ["小红书", "公众号", "视频号"];

/// Three-bucket risk appetite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RiskTolerance {
    Low,
    #[default]
    Medium,
    High,
}

impl RiskTolerance {
    pub const ALL: [RiskTolerance; 3] = [Self::Low, Self::Medium, Self::High];

    /// Canonical point on the backend's 1–5 scale.
    pub fn to_scale(self) -> u8 {
        match self {
            Self::Low => 1,
            Self::Medium => 3,
            Self::High => 5,
        }
    }

    /// Bucket a 1–5 scale value. Lossy: 1 and 2 both read as `Low`.
    pub fn from_scale(value: f64) -> Self {
        if value <= 2.0 {
            Self::Low
        } else if value >= 5.0 {
            Self::High
        } else {
            Self::Medium
        }
    }
}

impl std::fmt::Display for RiskTolerance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
        }
    }
}

/// Raw capability data submitted by the onboarding form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OnboardingInput {
    pub skills: Vec<String>,
    pub interests: Vec<String>,
    pub cognitive_style: String,
    pub value_boundaries: Vec<String>,
    pub risk_tolerance: RiskTolerance,
    pub weekly_hours: u32,
    pub goals: Vec<String>,
}

impl Default for OnboardingInput {
    fn default() -> Self {
        Self {
            skills: Vec::new(),
            interests: Vec::new(),
            cognitive_style: String::new(),
            value_boundaries: Vec::new(),
            risk_tolerance: RiskTolerance::Medium,
            weekly_hours: 6,
            goals: Vec::new(),
        }
    }
}

/// Normalized capability profile returned by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct OnboardingProfile {
    pub skill_stack: Vec<String>,
    /// Ordered interest descriptors.
    pub energy_curve: Vec<String>,
    pub cognitive_style: String,
    pub value_boundaries: Vec<String>,
    pub risk_tolerance: RiskTolerance,
    pub weekly_hours: u32,
    pub recommended_platforms: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct GrowthPath {
    pub first_quarter: String,
    pub year_one: String,
}

/// One candidate creator identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct IdentityModelCard {
    /// Backend-assigned, opaque.
    pub id: String,
    pub title: String,
    pub target_audience_pain: String,
    pub content_pillars: Vec<String>,
    pub tone_style_keywords: Vec<String>,
    pub tone_examples: Vec<String>,
    pub long_term_views: Vec<String>,
    pub differentiation: String,
    pub growth_path: GrowthPath,
    pub monetization_validation_order: Vec<String>,
    /// Display string: `monetization_validation_order` joined with `" -> "`.
    pub monetization_map: String,
    pub risk_boundaries: Vec<String>,
}

impl IdentityModelCard {
    /// Soft validation findings. These never block selection.
    pub fn validation_warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if self.tone_examples.len() < MIN_TONE_EXAMPLES {
            warnings.push(format!(
                "identity {} has {} tone examples (expected at least {})",
                self.id,
                self.tone_examples.len(),
                MIN_TONE_EXAMPLES
            ));
        }
        if self.differentiation.trim().is_empty() {
            warnings.push(format!("identity {} has no differentiation", self.id));
        }
        warnings
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct GrowthArcItem {
    pub stage: String,
    pub story_template: String,
}

/// Writing-rules document derived from the selected identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct PersonaConstitution {
    pub common_words: Vec<String>,
    pub forbidden_words: Vec<String>,
    pub sentence_preferences: Vec<String>,
    /// Positions that never change (the "moat").
    pub immutable_positions: Vec<String>,
    pub narrative_mainline: String,
    pub growth_arc: Vec<GrowthArcItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct LaunchKitDay {
    pub day: u32,
    pub theme: String,
    pub draft_outline: String,
    pub opening: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct GrowthExperiment {
    pub hypothesis: String,
    pub variables: Vec<String>,
    pub execution_cycle: String,
    pub success_metric: String,
}

/// Multi-day launch plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct LaunchKit {
    pub days: Vec<LaunchKitDay>,
    pub sustainable_columns: Vec<String>,
    pub growth_experiment: GrowthExperiment,
}

impl LaunchKit {
    pub fn day(&self, day_no: u32) -> Option<&LaunchKitDay> {
        self.days.iter().find(|d| d.day == day_no)
    }
}

/// A full article generated for one launch-kit day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct DayArticle {
    pub day_no: u32,
    pub title: String,
    pub markdown: String,
}

/// Outcome of comparing a draft against the persona constitution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct ConsistencyCheckResult {
    pub deviations: Vec<String>,
    pub reasons: Vec<String>,
    pub suggestions: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub risk_warning: Option<String>,
    /// 0..=100.
    pub score: u8,
}

impl ConsistencyCheckResult {
    /// Local score used when the backend does not supply one:
    /// `clamp(92 - 18*deviations - 4*reasons - 22*risk, 25, 100)`.
    pub fn derive_score(deviations: usize, reasons: usize, has_risk_warning: bool) -> u8 {
        let risk_penalty = if has_risk_warning { 22 } else { 0 };
        let raw = 92_i64 - 18 * deviations as i64 - 4 * reasons as i64 - risk_penalty;
        raw.clamp(25, 100) as u8
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct PillarPlan {
    pub pillar: String,
    pub topics: Vec<String>,
    pub platform_rewrites: std::collections::BTreeMap<String, Vec<String>>,
}

/// Topics per content pillar, with per-platform rewrites.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct ContentMatrix {
    pub pillars: Vec<PillarPlan>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ExperimentStatus {
    #[default]
    Planned,
    Completed,
}

/// A growth experiment and its recorded outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct ExperimentRecord {
    pub id: String,
    pub hypothesis: String,
    pub variables: Vec<String>,
    pub execution_cycle: String,
    pub result: String,
    pub conclusion: String,
    pub status: ExperimentStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct MonetizationWeek {
    pub week_no: u32,
    pub goal: String,
    pub task: String,
    pub deliverable: String,
    pub validation_metric: String,
}

/// Week-by-week monetization validation plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct MonetizationMap {
    pub primary_path: String,
    pub backup_path: String,
    pub weeks: Vec<MonetizationWeek>,
}

/// Analytics event names understood by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalyticsEventName {
    OnboardingStarted,
    OnboardingCompleted,
    IdentityModelsGenerated,
    IdentitySelected,
    LaunchKitGenerated,
    ConsistencyCheckTriggered,
    ContentPublished,
    ExperimentCreated,
    MonetizationPlanStarted,
    FirstRevenueOrLeadConfirmed,
}

impl std::fmt::Display for AnalyticsEventName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::OnboardingStarted => "onboarding_started",
            Self::OnboardingCompleted => "onboarding_completed",
            Self::IdentityModelsGenerated => "identity_models_generated",
            Self::IdentitySelected => "identity_selected",
            Self::LaunchKitGenerated => "launch_kit_generated",
            Self::ConsistencyCheckTriggered => "consistency_check_triggered",
            Self::ContentPublished => "content_published",
            Self::ExperimentCreated => "experiment_created",
            Self::MonetizationPlanStarted => "monetization_plan_started",
            Self::FirstRevenueOrLeadConfirmed => "first_revenue_or_lead_confirmed",
        };
        write!(f, "{s}")
    }
}

/// One analytics event. Append-only once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsEventPayload {
    pub event_name: AnalyticsEventName,
    pub user_id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
}

/// The wizard aggregate root.
///
/// Optional artifacts stay `None` until the stage that produces them runs;
/// the navigation guard is the only gatekeeper for their presence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct MvpFlowState {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    pub onboarding_input: OnboardingInput,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<OnboardingProfile>,
    pub identity_models: Vec<IdentityModelCard>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected_primary_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected_backup_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub persona: Option<PersonaConstitution>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub launch_kit: Option<LaunchKit>,
    pub draft_to_check: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consistency_check: Option<ConsistencyCheckResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_matrix: Option<ContentMatrix>,
    pub experiments: Vec<ExperimentRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub monetization_map: Option<MonetizationMap>,
    pub events: Vec<AnalyticsEventPayload>,
}

impl MvpFlowState {
    /// Look up an identity card by id.
    pub fn identity(&self, id: &str) -> Option<&IdentityModelCard> {
        self.identity_models.iter().find(|m| m.id == id)
    }

    /// Selected primary card, or `None` when unset or no longer present.
    pub fn selected_primary_model(&self) -> Option<&IdentityModelCard> {
        self.selected_primary_id
            .as_deref()
            .and_then(|id| self.identity(id))
    }

    /// Selected backup card, or `None` when unset or no longer present.
    pub fn selected_backup_model(&self) -> Option<&IdentityModelCard> {
        self.selected_backup_id
            .as_deref()
            .and_then(|id| self.identity(id))
    }
}
