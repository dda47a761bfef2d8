use serde_json::{Map, Value};

use crate::workflows::assessment::domain::{Coefficients, RiskText};
use crate::workflows::assessment::library::CategoryItem;
use crate::workflows::assessment::scoring::FineKinneyScale;

/// A provider or catalog record mapped onto one canonical shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawCandidate {
    pub category_code: Option<String>,
    pub risk_no: Option<String>,
    pub item: CategoryItem,
}

impl RawCandidate {
    /// Returns `None` for non-objects and for records without hazard or risk text.
    pub fn from_value(value: &Value) -> Option<Self> {
        let object = value.as_object()?;

        let text = RiskText {
            sub_category: text_of(object, &["sub_category", "subCategory"]),
            source: text_of(object, &["source"]),
            hazard: text_of(object, &["hazard"]),
            risk: text_of(object, &["risk"]),
            affected: text_of(object, &["affected"]),
            responsible: text_of(object, &["responsible"]),
            measures: text_of(object, &["measures"]),
        };
        if text.hazard.trim().is_empty() && text.risk.trim().is_empty() {
            return None;
        }

        let current = phase_of(
            object,
            "current",
            [&["probability", "p"], &["frequency", "f"], &["severity", "s"]],
        );
        let target = phase_of(
            object,
            "target",
            [&["probability2", "p2"], &["frequency2", "f2"], &["severity2", "s2"]],
        );

        let sector_tags = object
            .get("sector_tags")
            .or_else(|| object.get("sectorTags"))
            .and_then(Value::as_array)
            .map(|tags| {
                tags.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Some(Self {
            category_code: optional_text_of(object, &["category_code", "categoryCode"]),
            risk_no: optional_text_of(object, &["riskNo", "risk_no"]),
            item: CategoryItem {
                text,
                current,
                target,
                sector_tags,
            },
        })
    }
}

fn first_of<'a>(object: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| object.get(*key))
        .find(|value| !value.is_null())
}

fn optional_text_of(object: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    let text = match first_of(object, keys)? {
        Value::String(text) => text.trim().to_string(),
        Value::Number(number) => number.to_string(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

fn text_of(object: &Map<String, Value>, keys: &[&str]) -> String {
    match first_of(object, keys) {
        Some(Value::String(text)) => text.clone(),
        Some(Value::Number(number)) => number.to_string(),
        _ => String::new(),
    }
}

/// Flat keys win; otherwise the nested `{probability, frequency, severity}`
/// object under `nested` is read, which is the shape `CategoryItem` serializes.
fn phase_of(object: &Map<String, Value>, nested: &str, flat: [&[&str]; 3]) -> Coefficients {
    let inner = object.get(nested).and_then(Value::as_object);
    let field = |flat_keys: &[&str], nested_keys: &[&str]| {
        coefficient_of(
            first_of(object, flat_keys)
                .or_else(|| inner.and_then(|inner| first_of(inner, nested_keys))),
        )
    };
    Coefficients::new(
        field(flat[0], &["probability", "p"]),
        field(flat[1], &["frequency", "f"]),
        field(flat[2], &["severity", "s"]),
    )
}

/// Missing or unparseable coefficients fall back to the scale minimum; every
/// value is clamped to `[1, 100]`.
fn coefficient_of(value: Option<&Value>) -> u32 {
    let raw = match value {
        Some(Value::Number(number)) => number.as_f64(),
        Some(Value::String(text)) => text.trim().parse::<f64>().ok(),
        _ => None,
    };
    clamp_coefficient(raw)
}

pub(crate) fn clamp_coefficient(raw: Option<f64>) -> u32 {
    match raw {
        Some(value) if value.is_finite() => value
            .round()
            .clamp(FineKinneyScale::MIN as f64, FineKinneyScale::MAX as f64)
            as u32,
        _ => FineKinneyScale::MIN,
    }
}

/// Case- and whitespace-insensitive `(hazard, risk)` key used for
/// within-batch duplicate suppression.
pub fn batch_key(hazard: &str, risk: &str) -> String {
    format!("{}\u{1f}{}", normalize_text(hazard), normalize_text(risk))
}

fn normalize_text(value: &str) -> String {
    value
        .trim_start_matches('\u{feff}')
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}
