//! Field-level normalization for loosely-typed backend payloads.
//!
//! List fields arrive as real arrays, as JSON-encoded strings, or as
//! newline/bullet-delimited prose. `ListField` names those shapes once so the
//! mapping code never duck-types at call sites. Nothing here fails: malformed
//! input degrades to empty collections and default strings.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::flow::model::{GrowthArcItem, RiskTolerance};

/// Stage label used when a growth-arc line has no `：` separator.
pub const DEFAULT_ARC_STAGE: &str = "阶段";

/// Full-width colon separating a growth-arc stage from its template.
const ARC_SEPARATOR: char = '：';

/// Leading list markers: `-`, `*`, `•`, `(1)`, `（1）`, `1.`, `1)`, `1、`.
static LIST_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:[-*•]|[（(]\d+[）)]|\d+[.)、])\s*").expect("valid list marker pattern")
});

/// Keys probed, in order, when an energy-curve entry is an object.
const INTEREST_KEYS: [&str; 4] = ["interest", "name", "label", "value"];

/// The shape a list-typed field arrived in.
#[derive(Debug, Clone, PartialEq)]
pub enum ListField<'a> {
    /// A genuine JSON array.
    Array(&'a [Value]),
    /// A string that looks like JSON (`[` or `{` first). May be malformed.
    RawJson(&'a str),
    /// Prose, one item per line.
    FreeText(&'a str),
    /// Null, blank, or a non-string scalar.
    Empty,
}

impl<'a> ListField<'a> {
    /// Classify a raw field value.
    pub fn classify(value: &'a Value) -> Self {
        match value {
            Value::Array(items) => Self::Array(items),
            Value::String(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    Self::Empty
                } else if trimmed.starts_with('[') || trimmed.starts_with('{') {
                    Self::RawJson(trimmed)
                } else {
                    Self::FreeText(trimmed)
                }
            }
            _ => Self::Empty,
        }
    }

    /// Resolve into trimmed, non-empty strings, rendering each array element
    /// with `render`.
    fn resolve(self, render: fn(&Value) -> String) -> Vec<String> {
        match self {
            Self::Array(items) => render_all(items, render),
            // Malformed structured data is not worth heuristic recovery.
            Self::RawJson(raw) => match serde_json::from_str::<Value>(raw) {
                Ok(Value::Array(items)) => render_all(&items, render),
                _ => Vec::new(),
            },
            Self::FreeText(text) => free_text_lines(text),
            Self::Empty => Vec::new(),
        }
    }
}

fn render_all(items: &[Value], render: fn(&Value) -> String) -> Vec<String> {
    items
        .iter()
        .map(render)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Strings as-is, numbers/bools in display form, objects/arrays as compact
/// JSON, null as nothing.
fn render_item(item: &Value) -> String {
    match item {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn render_interest(item: &Value) -> String {
    match item {
        Value::Object(map) => INTEREST_KEYS
            .iter()
            .find_map(|key| map.get(*key).and_then(Value::as_str))
            .map(str::to_string)
            .unwrap_or_else(|| item.to_string()),
        other => render_item(other),
    }
}

fn free_text_lines(text: &str) -> Vec<String> {
    text.split('\n')
        .map(|line| LIST_MARKER.replace(line, "").trim().to_string())
        .filter(|line| !line.is_empty())
        .collect()
}

/// Normalize any string-list field.
pub fn string_list(value: &Value) -> Vec<String> {
    ListField::classify(value).resolve(render_item)
}

/// Normalize an interest energy curve. Object entries contribute their first
/// string among `interest`, `name`, `label`, `value`.
pub fn energy_curve(value: &Value) -> Vec<String> {
    ListField::classify(value).resolve(render_interest)
}

/// Raw array elements from an array or a JSON-encoded array string.
pub fn json_array(value: &Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items.clone(),
        Value::String(s) => match serde_json::from_str::<Value>(s.trim()) {
            Ok(Value::Array(items)) => items,
            _ => Vec::new(),
        },
        _ => Vec::new(),
    }
}

/// Parse a growth-arc template, one `stage：template` entry per line.
pub fn growth_arc(raw: &str) -> Vec<GrowthArcItem> {
    raw.split('\n')
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| match line.split_once(ARC_SEPARATOR) {
            None => GrowthArcItem {
                stage: DEFAULT_ARC_STAGE.to_string(),
                story_template: line.to_string(),
            },
            Some((stage, template)) => {
                let stage = stage.trim();
                let template = template.trim();
                GrowthArcItem {
                    stage: if stage.is_empty() {
                        DEFAULT_ARC_STAGE.to_string()
                    } else {
                        stage.to_string()
                    },
                    story_template: if template.is_empty() {
                        line.to_string()
                    } else {
                        template.to_string()
                    },
                }
            }
        })
        .collect()
}

/// String content of a scalar field; numbers render, everything else is empty.
pub fn text(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

/// First non-empty text among several candidate fields.
pub fn first_text(values: &[Option<&Value>]) -> String {
    values
        .iter()
        .map(|v| text(*v))
        .find(|s| !s.is_empty())
        .unwrap_or_default()
}

/// Numeric content of a field, accepting numeric strings.
pub fn number(value: Option<&Value>) -> Option<f64> {
    match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Non-negative whole number, rounding and saturating.
pub fn whole_number(value: Option<&Value>) -> u32 {
    number(value)
        .filter(|n| n.is_finite() && *n > 0.0)
        .map(|n| n.round().min(u32::MAX as f64) as u32)
        .unwrap_or(0)
}

/// Risk tolerance from the backend's 1–5 scale. Missing reads as 3.
pub fn risk_tolerance(value: Option<&Value>) -> RiskTolerance {
    if let Some(Value::String(s)) = value {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => return RiskTolerance::Low,
            "medium" => return RiskTolerance::Medium,
            "high" => return RiskTolerance::High,
            _ => {}
        }
    }
    RiskTolerance::from_scale(number(value).unwrap_or(3.0))
}
