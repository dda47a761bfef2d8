use std::fmt;

use chrono::NaiveDate;
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};

use super::scoring::{self, FineKinneyScale, RiskLevel};

/// Identifier assigned by the store when an entry is created. Never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RiskId(pub u64);

impl fmt::Display for RiskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "risk-{:06}", self.0)
    }
}

/// Category grouping used for templating and per-category numbering.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategoryCode(pub String);

impl CategoryCode {
    pub const MANUAL: &'static str = "99";
    pub const PERSONAL_LIBRARY: &'static str = "500";

    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into().trim().to_string())
    }

    pub fn manual() -> Self {
        Self(Self::MANUAL.to_string())
    }

    pub fn personal_library() -> Self {
        Self(Self::PERSONAL_LIBRARY.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_library(&self) -> bool {
        self.0 != Self::MANUAL && self.0 != Self::PERSONAL_LIBRARY
    }
}

impl fmt::Display for CategoryCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Free-text columns shared by entries, drafts and catalog templates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskText {
    pub sub_category: String,
    /// Location or working environment where the hazard occurs.
    pub source: String,
    pub hazard: String,
    pub risk: String,
    pub affected: String,
    pub responsible: String,
    pub measures: String,
}

impl RiskText {
    pub fn field(&self, field: TextField) -> &str {
        match field {
            TextField::SubCategory => &self.sub_category,
            TextField::Source => &self.source,
            TextField::Hazard => &self.hazard,
            TextField::Risk => &self.risk,
            TextField::Affected => &self.affected,
            TextField::Responsible => &self.responsible,
            TextField::Measures => &self.measures,
        }
    }

    pub(crate) fn set_field(&mut self, field: TextField, value: String) {
        let slot = match field {
            TextField::SubCategory => &mut self.sub_category,
            TextField::Source => &mut self.source,
            TextField::Hazard => &mut self.hazard,
            TextField::Risk => &mut self.risk,
            TextField::Affected => &mut self.affected,
            TextField::Responsible => &mut self.responsible,
            TextField::Measures => &mut self.measures,
        };
        *slot = value;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextField {
    SubCategory,
    Source,
    Hazard,
    Risk,
    Affected,
    Responsible,
    Measures,
}

/// Current exposure (phase 1) or post-mitigation target (phase 2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Current,
    Target,
}

/// The six editable Fine-Kinney coefficients of an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoefficientField {
    Probability,
    Frequency,
    Severity,
    Probability2,
    Frequency2,
    Severity2,
}

impl CoefficientField {
    pub const ALL: [CoefficientField; 6] = [
        Self::Probability,
        Self::Frequency,
        Self::Severity,
        Self::Probability2,
        Self::Frequency2,
        Self::Severity2,
    ];

    pub const fn phase(self) -> Phase {
        match self {
            Self::Probability | Self::Frequency | Self::Severity => Phase::Current,
            Self::Probability2 | Self::Frequency2 | Self::Severity2 => Phase::Target,
        }
    }

    /// Accepts both the long names and the `p/f/s/p2/f2/s2` shorthand.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "p" | "probability" => Some(Self::Probability),
            "f" | "frequency" => Some(Self::Frequency),
            "s" | "severity" => Some(Self::Severity),
            "p2" | "probability2" => Some(Self::Probability2),
            "f2" | "frequency2" => Some(Self::Frequency2),
            "s2" | "severity2" => Some(Self::Severity2),
            _ => None,
        }
    }
}

/// Raw coefficient triple for one phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coefficients {
    pub probability: u32,
    pub frequency: u32,
    pub severity: u32,
}

impl Coefficients {
    pub const fn new(probability: u32, frequency: u32, severity: u32) -> Self {
        Self {
            probability,
            frequency,
            severity,
        }
    }
}

impl Default for Coefficients {
    fn default() -> Self {
        Self::new(1, 1, 1)
    }
}

/// A phase's coefficients together with the derived score and level.
///
/// The derived fields are only ever produced by [`PhaseAssessment::new`];
/// deserialization goes through [`Coefficients`] so a loaded snapshot is
/// always rescored. Coefficients are clamped to `0..=FineKinneyScale::MAX`
/// (0 marks a cleared field).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(from = "Coefficients")]
pub struct PhaseAssessment {
    probability: u32,
    frequency: u32,
    severity: u32,
    score: u32,
    level: RiskLevel,
}

impl PhaseAssessment {
    pub fn new(coefficients: Coefficients) -> Self {
        let probability = coefficients.probability.min(FineKinneyScale::MAX);
        let frequency = coefficients.frequency.min(FineKinneyScale::MAX);
        let severity = coefficients.severity.min(FineKinneyScale::MAX);
        let score = scoring::score(probability, frequency, severity);
        Self {
            probability,
            frequency,
            severity,
            score,
            level: scoring::classify(score),
        }
    }

    pub fn coefficients(&self) -> Coefficients {
        Coefficients::new(self.probability, self.frequency, self.severity)
    }

    pub fn probability(&self) -> u32 {
        self.probability
    }

    pub fn frequency(&self) -> u32 {
        self.frequency
    }

    pub fn severity(&self) -> u32 {
        self.severity
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn level(&self) -> RiskLevel {
        self.level
    }

    pub fn color(&self) -> &'static str {
        self.level.color_token()
    }
}

impl Serialize for PhaseAssessment {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("PhaseAssessment", 6)?;
        state.serialize_field("probability", &self.probability)?;
        state.serialize_field("frequency", &self.frequency)?;
        state.serialize_field("severity", &self.severity)?;
        state.serialize_field("score", &self.score)?;
        state.serialize_field("level", &self.level)?;
        state.serialize_field("color", self.color())?;
        state.end()
    }
}

impl From<Coefficients> for PhaseAssessment {
    fn from(value: Coefficients) -> Self {
        Self::new(value)
    }
}

/// One finalized row of the assessment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskItem {
    pub id: RiskId,
    pub risk_no: String,
    pub category_code: CategoryCode,
    #[serde(flatten)]
    pub text: RiskText,
    pub current: PhaseAssessment,
    pub target: PhaseAssessment,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl RiskItem {
    pub fn phase(&self, phase: Phase) -> &PhaseAssessment {
        match phase {
            Phase::Current => &self.current,
            Phase::Target => &self.target,
        }
    }

    pub fn coefficient(&self, field: CoefficientField) -> u32 {
        let phase = self.phase(field.phase());
        match field {
            CoefficientField::Probability | CoefficientField::Probability2 => phase.probability(),
            CoefficientField::Frequency | CoefficientField::Frequency2 => phase.frequency(),
            CoefficientField::Severity | CoefficientField::Severity2 => phase.severity(),
        }
    }

    /// Replaces one coefficient and rescores the phase it belongs to.
    pub(crate) fn with_coefficient(&self, field: CoefficientField, value: u32) -> Self {
        let mut coefficients = self.phase(field.phase()).coefficients();
        match field {
            CoefficientField::Probability | CoefficientField::Probability2 => {
                coefficients.probability = value
            }
            CoefficientField::Frequency | CoefficientField::Frequency2 => {
                coefficients.frequency = value
            }
            CoefficientField::Severity | CoefficientField::Severity2 => {
                coefficients.severity = value
            }
        }

        let mut updated = self.clone();
        match field.phase() {
            Phase::Current => updated.current = PhaseAssessment::new(coefficients),
            Phase::Target => updated.target = PhaseAssessment::new(coefficients),
        }
        updated
    }

    pub fn duplicates(&self, hazard: &str, risk: &str) -> bool {
        self.text.hazard == hazard && self.text.risk == risk
    }
}

/// Input for creating an entry: a form submission or a reconciled candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskDraft {
    #[serde(default)]
    pub risk_no: Option<String>,
    #[serde(default = "CategoryCode::manual")]
    pub category_code: CategoryCode,
    #[serde(flatten)]
    pub text: RiskText,
    #[serde(default)]
    pub current: Coefficients,
    #[serde(default)]
    pub target: Coefficients,
    #[serde(default)]
    pub image: Option<String>,
}

impl RiskDraft {
    pub fn new(category_code: CategoryCode, text: RiskText) -> Self {
        Self {
            risk_no: None,
            category_code,
            text,
            current: Coefficients::default(),
            target: Coefficients::default(),
            image: None,
        }
    }
}

/// Facility and authorship details printed on the report cover.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeaderMetadata {
    pub company_name: String,
    pub workplace_address: String,
    pub hazard_class: String,
    pub assessment_date: Option<NaiveDate>,
    pub valid_until: Option<NaiveDate>,
    pub prepared_by: Vec<String>,
}

/// Everything the persistence adapter and the report compiler receive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssessmentSnapshot {
    #[serde(default)]
    pub header: HeaderMetadata,
    #[serde(default)]
    pub risks: Vec<RiskItem>,
    #[serde(default)]
    pub next_id: u64,
}
