use serde::{Deserialize, Serialize};

/// Ordered Fine-Kinney risk classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Acceptable,
    Possible,
    Important,
    High,
    VeryHigh,
}

impl RiskLevel {
    pub const ALL: [RiskLevel; 5] = [
        Self::Acceptable,
        Self::Possible,
        Self::Important,
        Self::High,
        Self::VeryHigh,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            Self::Acceptable => "Acceptable",
            Self::Possible => "Possible Risk",
            Self::Important => "Important Risk",
            Self::High => "High Risk",
            Self::VeryHigh => "Very High Risk",
        }
    }

    pub const fn color_token(self) -> &'static str {
        match self {
            Self::Acceptable => "none",
            Self::Possible => "low",
            Self::Important => "medium",
            Self::High => "high",
            Self::VeryHigh => "critical",
        }
    }
}

/// Minimum phase-1 score filter used for display and for gating suggestions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum SeverityTier {
    #[default]
    All,
    MediumAndAbove,
    HighAndAbove,
}

impl SeverityTier {
    pub const fn min_score(self) -> u32 {
        match self {
            Self::All => 0,
            Self::MediumAndAbove => 70,
            Self::HighAndAbove => 200,
        }
    }

    pub const fn admits(self, score: u32) -> bool {
        score >= self.min_score()
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown severity tier {0}; expected 0, 70 or 200")]
pub struct UnknownSeverityTier(pub u32);

impl TryFrom<u32> for SeverityTier {
    type Error = UnknownSeverityTier;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::All),
            70 => Ok(Self::MediumAndAbove),
            200 => Ok(Self::HighAndAbove),
            other => Err(UnknownSeverityTier(other)),
        }
    }
}

impl From<SeverityTier> for u32 {
    fn from(value: SeverityTier) -> Self {
        value.min_score()
    }
}
