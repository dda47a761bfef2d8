//! Read-only projection handed to the report compiler. Layout and export
//! formats beyond CSV live outside the engine.

use std::io::Write;

use serde::Serialize;

use super::domain::{AssessmentSnapshot, HeaderMetadata, PhaseAssessment, RiskItem};
use super::scoring::RiskLevel;

#[derive(Debug, Clone, Serialize)]
pub struct RiskRowView {
    pub risk_no: String,
    pub category_code: String,
    pub sub_category: String,
    pub source: String,
    pub hazard: String,
    pub risk: String,
    pub affected: String,
    pub probability: u32,
    pub frequency: u32,
    pub severity: u32,
    pub score: u32,
    pub level: &'static str,
    pub color: &'static str,
    pub measures: String,
    pub responsible: String,
    pub probability2: u32,
    pub frequency2: u32,
    pub severity2: u32,
    pub score2: u32,
    pub level2: &'static str,
    pub color2: &'static str,
    #[serde(skip)]
    pub has_image: bool,
}

impl From<&RiskItem> for RiskRowView {
    fn from(item: &RiskItem) -> Self {
        let (current, target) = (&item.current, &item.target);
        Self {
            risk_no: item.risk_no.clone(),
            category_code: item.category_code.to_string(),
            sub_category: item.text.sub_category.clone(),
            source: item.text.source.clone(),
            hazard: item.text.hazard.clone(),
            risk: item.text.risk.clone(),
            affected: item.text.affected.clone(),
            probability: current.probability(),
            frequency: current.frequency(),
            severity: current.severity(),
            score: current.score(),
            level: current.level().label(),
            color: current.color(),
            measures: item.text.measures.clone(),
            responsible: item.text.responsible.clone(),
            probability2: target.probability(),
            frequency2: target.frequency(),
            severity2: target.severity(),
            score2: target.score(),
            level2: target.level().label(),
            color2: target.color(),
            has_image: item.image.is_some(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LevelCount {
    pub level: RiskLevel,
    pub label: &'static str,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct AssessmentReport {
    pub header: HeaderMetadata,
    pub rows: Vec<RiskRowView>,
    pub current_distribution: Vec<LevelCount>,
    pub target_distribution: Vec<LevelCount>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub highest_current_score: Option<u32>,
    /// Entries whose target score is not lower than their current score.
    pub unmitigated: usize,
    pub images: usize,
}

impl AssessmentReport {
    pub fn compile(snapshot: &AssessmentSnapshot) -> Self {
        let rows: Vec<RiskRowView> = snapshot.risks.iter().map(RiskRowView::from).collect();

        Self {
            header: snapshot.header.clone(),
            current_distribution: distribution(snapshot.risks.iter().map(|item| &item.current)),
            target_distribution: distribution(snapshot.risks.iter().map(|item| &item.target)),
            highest_current_score: snapshot.risks.iter().map(|item| item.current.score()).max(),
            unmitigated: snapshot
                .risks
                .iter()
                .filter(|item| item.target.score() >= item.current.score())
                .count(),
            images: rows.iter().filter(|row| row.has_image).count(),
            rows,
        }
    }

    pub fn export_csv<W: Write>(&self, writer: W) -> Result<(), csv::Error> {
        let mut csv_writer = csv::Writer::from_writer(writer);
        for row in &self.rows {
            csv_writer.serialize(row)?;
        }
        csv_writer.flush()?;
        Ok(())
    }
}

fn distribution<'a>(phases: impl Iterator<Item = &'a PhaseAssessment>) -> Vec<LevelCount> {
    let mut counts = [0usize; RiskLevel::ALL.len()];
    for phase in phases {
        counts[phase.level() as usize] += 1;
    }
    RiskLevel::ALL
        .iter()
        .zip(counts)
        .map(|(level, count)| LevelCount {
            level: *level,
            label: level.label(),
            count,
        })
        .collect()
}
