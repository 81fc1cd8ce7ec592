//! Outbound request bodies, in the backend's snake_case wire format.

use chrono::SecondsFormat;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::flow::model::{
    AnalyticsEventPayload, IdentityModelCard, OnboardingInput, OnboardingProfile,
};

/// Tag sent with every onboarding completion.
pub const QUESTIONNAIRE_SOURCE: &str = "frontend_mvp";

/// Funnel stage attached to analytics events.
pub const EVENT_STAGE: &str = "MVP";

/// Candidates requested per identity generation.
pub const IDENTITY_MODEL_COUNT: u32 = 3;

#[derive(Debug, Serialize)]
pub struct InterestEntry<'a> {
    pub interest: &'a str,
}

fn interest_entries(items: &[String]) -> Vec<InterestEntry<'_>> {
    items
        .iter()
        .map(|interest| InterestEntry {
            interest: interest.as_str(),
        })
        .collect()
}

#[derive(Debug, Serialize)]
pub struct UserScopedBody<'a> {
    pub user_id: &'a str,
}

#[derive(Debug, Serialize)]
pub struct QuestionnaireResponses<'a> {
    pub goals: &'a [String],
    pub source: &'static str,
}

#[derive(Debug, Serialize)]
pub struct CompleteOnboardingBody<'a> {
    pub session_id: &'a str,
    pub questionnaire_responses: QuestionnaireResponses<'a>,
    pub skill_stack: &'a [String],
    pub interest_energy_curve: Vec<InterestEntry<'a>>,
    pub cognitive_style: &'a str,
    pub value_boundaries: &'a [String],
    pub risk_tolerance: u8,
    pub time_investment_hours: u32,
}

impl<'a> CompleteOnboardingBody<'a> {
    pub fn new(session_id: &'a str, input: &'a OnboardingInput) -> Self {
        Self {
            session_id,
            questionnaire_responses: QuestionnaireResponses {
                goals: &input.goals,
                source: QUESTIONNAIRE_SOURCE,
            },
            skill_stack: &input.skills,
            interest_energy_curve: interest_entries(&input.interests),
            cognitive_style: &input.cognitive_style,
            value_boundaries: &input.value_boundaries,
            risk_tolerance: input.risk_tolerance.to_scale(),
            time_investment_hours: input.weekly_hours,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CapabilityProfileBody<'a> {
    pub skill_stack: &'a [String],
    pub interest_energy_curve: Vec<InterestEntry<'a>>,
    pub cognitive_style: &'a str,
    pub value_boundaries: &'a [String],
    pub risk_tolerance: u8,
    pub time_investment_hours: u32,
}

#[derive(Debug, Serialize)]
pub struct GenerateIdentityModelsBody<'a> {
    pub user_id: &'a str,
    pub capability_profile: CapabilityProfileBody<'a>,
    pub count: u32,
}

impl<'a> GenerateIdentityModelsBody<'a> {
    pub fn new(user_id: &'a str, profile: &'a OnboardingProfile) -> Self {
        Self {
            user_id,
            capability_profile: CapabilityProfileBody {
                skill_stack: &profile.skill_stack,
                interest_energy_curve: interest_entries(&profile.energy_curve),
                cognitive_style: &profile.cognitive_style,
                value_boundaries: &profile.value_boundaries,
                risk_tolerance: profile.risk_tolerance.to_scale(),
                time_investment_hours: profile.weekly_hours,
            },
            count: IDENTITY_MODEL_COUNT,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct IdentitySelectionBody<'a> {
    pub user_id: &'a str,
    pub primary_identity_id: &'a str,
    /// Serialized as `null` when no backup was chosen.
    pub backup_identity_id: Option<&'a str>,
}

/// Body shared by every `*/generate` call keyed on one identity model.
#[derive(Debug, Serialize)]
pub struct IdentityScopedBody<'a> {
    pub user_id: &'a str,
    pub identity_model_id: &'a str,
}

#[derive(Debug, Serialize)]
pub struct DayArticleBody<'a> {
    pub user_id: &'a str,
    pub identity_model_id: &'a str,
    /// The client does not track constitution ids; always `null`.
    pub constitution_id: Option<&'a str>,
    pub day_no: u32,
    pub theme: &'a str,
    pub draft_or_outline: &'a str,
    pub opening_text: &'a str,
}

#[derive(Debug, Serialize)]
pub struct ConsistencyCheckBody<'a> {
    pub user_id: &'a str,
    pub identity_model_id: &'a str,
    pub draft_text: &'a str,
}

#[derive(Debug, Serialize)]
pub struct NewExperimentBody<'a> {
    pub user_id: &'a str,
    pub identity_model_id: &'a str,
    pub hypothesis: &'a str,
    pub variables: &'a [String],
    pub execution_cycle: &'a str,
}

#[derive(Debug, Serialize)]
pub struct ExperimentResultBody<'a> {
    pub result: &'a str,
    pub conclusion: &'a str,
}

#[derive(Debug, Serialize)]
pub struct EventBody<'a> {
    pub user_id: &'a str,
    pub event_name: String,
    pub stage: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identity_model_id: Option<&'a str>,
    pub payload: Map<String, Value>,
}

impl<'a> EventBody<'a> {
    /// Payload is `{timestamp, ...metadata}`; metadata keys win on collision.
    pub fn new(event: &'a AnalyticsEventPayload) -> Self {
        let mut payload = Map::new();
        payload.insert(
            "timestamp".to_string(),
            Value::String(event.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)),
        );
        if let Some(metadata) = &event.metadata {
            payload.extend(metadata.clone());
        }
        Self {
            user_id: &event.user_id,
            event_name: event.event_name.to_string(),
            stage: EVENT_STAGE,
            identity_model_id: event.identity_id.as_deref(),
            payload,
        }
    }
}

/// Request for a full article expanding one launch-kit day.
#[derive(Debug, Clone)]
pub struct DayArticleRequest {
    pub identity_model: IdentityModelCard,
    pub day_no: u32,
    pub theme: String,
    pub draft_outline: String,
    pub opening: String,
}

/// A new growth experiment to register.
#[derive(Debug, Clone, Default)]
pub struct NewExperiment {
    pub hypothesis: String,
    pub variables: Vec<String>,
    pub execution_cycle: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::model::{AnalyticsEventName, RiskTolerance};
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    #[test]
    fn onboarding_body_shape() {
        let input = OnboardingInput {
            skills: vec!["writing".into()],
            interests: vec!["strategy".into(), "review".into()],
            cognitive_style: "structured".into(),
            risk_tolerance: RiskTolerance::High,
            weekly_hours: 8,
            goals: vec!["validate mainline".into()],
            ..Default::default()
        };
        let body = serde_json::to_value(CompleteOnboardingBody::new("session_1", &input)).unwrap();
        assert_eq!(body["session_id"], "session_1");
        assert_eq!(
            body["questionnaire_responses"],
            json!({"goals": ["validate mainline"], "source": "frontend_mvp"})
        );
        assert_eq!(
            body["interest_energy_curve"],
            json!([{"interest": "strategy"}, {"interest": "review"}])
        );
        assert_eq!(body["risk_tolerance"], 5);
        assert_eq!(body["time_investment_hours"], 8);
    }

    #[test]
    fn identity_generation_requests_three() {
        let profile = OnboardingProfile::default();
        let body = serde_json::to_value(GenerateIdentityModelsBody::new("user_1", &profile)).unwrap();
        assert_eq!(body["count"], 3);
        assert_eq!(body["capability_profile"]["risk_tolerance"], 3);
    }

    #[test]
    fn selection_without_backup_sends_null() {
        let body = serde_json::to_value(IdentitySelectionBody {
            user_id: "u",
            primary_identity_id: "a",
            backup_identity_id: None,
        })
        .unwrap();
        assert_eq!(body["backup_identity_id"], Value::Null);
    }

    #[test]
    fn event_body_merges_metadata() {
        let mut metadata = Map::new();
        metadata.insert("from".into(), json!("test"));
        let event = AnalyticsEventPayload {
            event_name: AnalyticsEventName::IdentitySelected,
            user_id: "user_1".into(),
            timestamp: Utc.with_ymd_and_hms(2026, 2, 23, 0, 0, 0).unwrap(),
            identity_id: Some("identity_1".into()),
            metadata: Some(metadata),
        };
        let body = serde_json::to_value(EventBody::new(&event)).unwrap();
        assert_eq!(
            body,
            json!({
                "user_id": "user_1",
                "event_name": "identity_selected",
                "stage": "MVP",
                "identity_model_id": "identity_1",
                "payload": {"timestamp": "2026-02-23T00:00:00.000Z", "from": "test"}
            })
        );
    }
}
