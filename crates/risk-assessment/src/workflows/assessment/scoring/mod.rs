//! Fine-Kinney scoring: `risk = probability × frequency × severity`, classified
//! into five ordered levels. Pure functions only.

mod levels;
mod scale;

pub use levels::{RiskLevel, SeverityTier, UnknownSeverityTier};
pub use scale::FineKinneyScale;

pub fn score(probability: u32, frequency: u32, severity: u32) -> u32 {
    probability
        .saturating_mul(frequency)
        .saturating_mul(severity)
}

pub fn classify(score: u32) -> RiskLevel {
    match score {
        s if s < 20 => RiskLevel::Acceptable,
        s if s < 70 => RiskLevel::Possible,
        s if s < 200 => RiskLevel::Important,
        s if s < 400 => RiskLevel::High,
        _ => RiskLevel::VeryHigh,
    }
}
