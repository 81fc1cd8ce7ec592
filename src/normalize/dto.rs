//! Backend DTOs and their mapping into the internal model.
//!
//! Every DTO field is a raw `serde_json::Value` with a default, so decoding
//! a response object never fails; the mappers below then normalize each
//! field. The only mapper that can fail is the consistency check, whose
//! score is a protocol field.

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::ApiError;
use crate::flow::model::{
    ConsistencyCheckResult, ContentMatrix, DEFAULT_RECOMMENDED_PLATFORMS, DayArticle,
    ExperimentRecord, ExperimentStatus, GrowthExperiment, GrowthPath, IdentityModelCard,
    LaunchKit, LaunchKitDay, MonetizationMap, MonetizationWeek, OnboardingProfile,
    PersonaConstitution, PillarPlan,
};

use super::fields::{
    energy_curve, first_text, growth_arc, json_array, risk_tolerance, string_list, text,
    whole_number,
};

/// Title used when the backend omits one.
pub const UNTITLED_IDENTITY: &str = "未命名身份";

/// Separator for the monetization display string.
pub const MONETIZATION_SEPARATOR: &str = " -> ";

static NULL: Value = Value::Null;

/// Decode a DTO leniently: anything that is not an object yields defaults.
pub fn lenient<T: DeserializeOwned + Default>(value: &Value) -> T {
    match value {
        Value::Object(_) => serde_json::from_value(value.clone()).unwrap_or_default(),
        _ => T::default(),
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct OnboardingProfileDto {
    pub skill_stack_json: Value,
    pub interest_energy_curve_json: Value,
    pub cognitive_style: Value,
    pub value_boundaries_json: Value,
    pub risk_tolerance: Option<Value>,
    pub time_investment_hours: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct IdentityModelDto {
    pub id: Value,
    pub title: Value,
    pub target_audience_pain: Value,
    pub content_pillars_json: Value,
    pub tone_keywords_json: Value,
    pub tone_examples_json: Value,
    pub long_term_views_json: Value,
    pub differentiation: Value,
    pub growth_path_0_3m: Value,
    pub growth_path_3_12m: Value,
    pub monetization_validation_order_json: Value,
    pub risk_boundary_json: Value,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PersonaConstitutionDto {
    pub common_words_json: Value,
    pub forbidden_words_json: Value,
    pub sentence_preferences_json: Value,
    pub moat_positions_json: Value,
    pub narrative_mainline: Value,
    pub growth_arc_template: Value,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LaunchKitDayDto {
    pub day_no: Option<Value>,
    pub theme: Value,
    pub draft_or_outline: Value,
    pub opening_text: Value,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LaunchKitDto {
    pub days: Value,
    pub sustainable_columns_json: Value,
    pub growth_experiment_suggestion_json: Value,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ExperimentDto {
    pub id: Value,
    pub hypothesis: Value,
    pub variables_json: Value,
    pub execution_cycle: Value,
    pub result: Value,
    pub conclusion: Value,
    pub status: Value,
}

pub fn map_profile(raw: &Value) -> OnboardingProfile {
    let dto: OnboardingProfileDto = lenient(raw);
    OnboardingProfile {
        skill_stack: string_list(&dto.skill_stack_json),
        energy_curve: energy_curve(&dto.interest_energy_curve_json),
        cognitive_style: text(Some(&dto.cognitive_style)),
        value_boundaries: string_list(&dto.value_boundaries_json),
        risk_tolerance: risk_tolerance(dto.risk_tolerance.as_ref()),
        weekly_hours: whole_number(dto.time_investment_hours.as_ref()),
        recommended_platforms: DEFAULT_RECOMMENDED_PLATFORMS
            .iter()
            .map(|p| p.to_string())
            .collect(),
    }
}

pub fn map_identity_model(raw: &Value) -> IdentityModelCard {
    let dto: IdentityModelDto = lenient(raw);
    let monetization_validation_order = string_list(&dto.monetization_validation_order_json);
    let title = text(Some(&dto.title));
    IdentityModelCard {
        id: text(Some(&dto.id)),
        title: if title.is_empty() {
            UNTITLED_IDENTITY.to_string()
        } else {
            title
        },
        target_audience_pain: text(Some(&dto.target_audience_pain)),
        content_pillars: string_list(&dto.content_pillars_json),
        tone_style_keywords: string_list(&dto.tone_keywords_json),
        tone_examples: string_list(&dto.tone_examples_json),
        long_term_views: string_list(&dto.long_term_views_json),
        differentiation: text(Some(&dto.differentiation)),
        growth_path: GrowthPath {
            first_quarter: text(Some(&dto.growth_path_0_3m)),
            year_one: text(Some(&dto.growth_path_3_12m)),
        },
        monetization_map: monetization_validation_order.join(MONETIZATION_SEPARATOR),
        monetization_validation_order,
        risk_boundaries: string_list(&dto.risk_boundary_json),
    }
}

/// Map a list response; a non-array body yields no models.
pub fn map_identity_models(raw: &Value) -> Vec<IdentityModelCard> {
    json_array(raw).iter().map(map_identity_model).collect()
}

pub fn map_persona(raw: &Value) -> PersonaConstitution {
    let dto: PersonaConstitutionDto = lenient(raw);
    PersonaConstitution {
        common_words: string_list(&dto.common_words_json),
        forbidden_words: string_list(&dto.forbidden_words_json),
        sentence_preferences: string_list(&dto.sentence_preferences_json),
        immutable_positions: string_list(&dto.moat_positions_json),
        narrative_mainline: text(Some(&dto.narrative_mainline)),
        growth_arc: growth_arc(&text(Some(&dto.growth_arc_template))),
    }
}

pub fn map_launch_kit(raw: &Value) -> LaunchKit {
    let dto: LaunchKitDto = lenient(raw);

    let days = json_array(&dto.days)
        .iter()
        .map(|day| {
            let day: LaunchKitDayDto = lenient(day);
            LaunchKitDay {
                day: whole_number(day.day_no.as_ref()),
                theme: text(Some(&day.theme)),
                draft_outline: text(Some(&day.draft_or_outline)),
                opening: text(Some(&day.opening_text)),
            }
        })
        .collect();

    let suggestions = json_array(&dto.growth_experiment_suggestion_json);
    let growth_experiment = match suggestions.first() {
        Some(Value::Object(first)) => GrowthExperiment {
            hypothesis: text(first.get("hypothesis")),
            variables: first
                .get("variables")
                .and_then(Value::as_array)
                .map(|vars| {
                    vars.iter()
                        .filter_map(Value::as_str)
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
            execution_cycle: first_text(&[first.get("duration"), first.get("execution_cycle")]),
            success_metric: first_text(&[
                first.get("success_metric"),
                first.get("successMetric"),
            ]),
        },
        _ => GrowthExperiment::default(),
    };

    LaunchKit {
        days,
        sustainable_columns: string_list(&dto.sustainable_columns_json),
        growth_experiment,
    }
}

pub fn map_day_article(raw: &Value) -> DayArticle {
    DayArticle {
        day_no: whole_number(raw.get("day_no")),
        title: text(raw.get("title")),
        markdown: text(raw.get("markdown")),
    }
}

/// Map a consistency-check response.
///
/// A `score` field, when present, is authoritative and must be an integer in
/// `0..=100`; anything else is a protocol violation. Only a response with no
/// `score` key at all gets a locally derived score.
pub fn map_consistency_check(raw: &Value) -> Result<ConsistencyCheckResult, ApiError> {
    let field = |key: &str| raw.get(key).unwrap_or(&NULL);

    let deviations = string_list(field("deviation_items"));
    let reasons = string_list(field("deviation_reasons"));
    let suggestions = string_list(field("suggestions"));
    let risk_warning = Some(text(raw.get("risk_warning")).trim().to_string())
        .filter(|w| !w.is_empty());

    let score = match raw.get("score") {
        None => ConsistencyCheckResult::derive_score(
            deviations.len(),
            reasons.len(),
            risk_warning.is_some(),
        ),
        Some(value) => validate_score(value)?,
    };

    Ok(ConsistencyCheckResult {
        deviations,
        reasons,
        suggestions,
        risk_warning,
        score,
    })
}

fn validate_score(value: &Value) -> Result<u8, ApiError> {
    let score = match value {
        Value::Number(n) => n.as_f64(),
        _ => None,
    };
    match score {
        Some(s) if s.fract() == 0.0 && (0.0..=100.0).contains(&s) => Ok(s as u8),
        _ => Err(ApiError::InvalidResponse {
            reason: format!("consistency score {value} is not an integer in [0, 100]"),
        }),
    }
}

pub fn map_content_matrix(raw: &Value) -> ContentMatrix {
    let pillars = json_array(raw.get("matrix_json").unwrap_or(&NULL))
        .iter()
        .filter_map(|item| {
            let entry = item.as_object()?;
            let pillar = text(entry.get("pillar"));
            if pillar.trim().is_empty() {
                return None;
            }
            let platform_rewrites = entry
                .get("platform_rewrites")
                .and_then(Value::as_object)
                .map(|rewrites| {
                    rewrites
                        .iter()
                        .map(|(platform, values)| (platform.clone(), string_list(values)))
                        .collect()
                })
                .unwrap_or_default();
            Some(PillarPlan {
                pillar,
                topics: string_list(entry.get("topics").unwrap_or(&NULL)),
                platform_rewrites,
            })
        })
        .collect();
    ContentMatrix { pillars }
}

pub fn map_experiment(raw: &Value) -> ExperimentRecord {
    let dto: ExperimentDto = lenient(raw);
    ExperimentRecord {
        id: text(Some(&dto.id)),
        hypothesis: text(Some(&dto.hypothesis)),
        variables: string_list(&dto.variables_json),
        execution_cycle: text(Some(&dto.execution_cycle)),
        result: text(Some(&dto.result)),
        conclusion: text(Some(&dto.conclusion)),
        status: if text(Some(&dto.status)) == "completed" {
            ExperimentStatus::Completed
        } else {
            ExperimentStatus::Planned
        },
    }
}

pub fn map_experiments(raw: &Value) -> Vec<ExperimentRecord> {
    json_array(raw).iter().map(map_experiment).collect()
}

pub fn map_monetization_map(raw: &Value) -> MonetizationMap {
    let weeks = json_array(raw.get("weeks_json").unwrap_or(&NULL))
        .iter()
        .filter_map(|item| {
            let week = item.as_object()?;
            let week_no = whole_number(week.get("week_no"));
            (week_no > 0).then(|| MonetizationWeek {
                week_no,
                goal: text(week.get("goal")),
                task: text(week.get("task")),
                deliverable: text(week.get("deliverable")),
                validation_metric: text(week.get("validation_metric")),
            })
        })
        .collect();
    MonetizationMap {
        primary_path: text(raw.get("primary_path")),
        backup_path: text(raw.get("backup_path")),
        weeks,
    }
}
