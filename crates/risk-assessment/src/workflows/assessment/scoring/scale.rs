use serde::Serialize;

use crate::workflows::assessment::domain::CoefficientField;

/// The standard option sets offered for each coefficient.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct FineKinneyScale {
    pub probability: &'static [u32],
    pub frequency: &'static [u32],
    pub severity: &'static [u32],
}

impl FineKinneyScale {
    pub const STANDARD: FineKinneyScale = FineKinneyScale {
        probability: &[1, 3, 6, 10],
        frequency: &[1, 2, 3, 6, 10],
        severity: &[1, 3, 7, 15, 40, 100],
    };

    pub const MIN: u32 = 1;
    pub const MAX: u32 = 100;

    pub fn options(&self, field: CoefficientField) -> &'static [u32] {
        match field {
            CoefficientField::Probability | CoefficientField::Probability2 => self.probability,
            CoefficientField::Frequency | CoefficientField::Frequency2 => self.frequency,
            CoefficientField::Severity | CoefficientField::Severity2 => self.severity,
        }
    }
}
