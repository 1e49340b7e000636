use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use crate::error::{ExtractionError, Result};
use crate::reference::VowelReferenceTable;
use crate::types::FormantDiffs;

/// A measured vowel segment awaiting validation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormantMeasurement {
    pub phone: String,
    pub f1: f64,
    pub f2: f64,
}

impl FormantMeasurement {
    pub fn new(phone: impl Into<String>, f1: f64, f2: f64) -> Self {
        Self {
            phone: phone.into(),
            f1,
            f2,
        }
    }
}

/// Drops implausible measurements and pools the deviations of the rest from
/// the reference defaults.
#[derive(Debug, Clone)]
pub struct FormantDeviationAggregator {
    reference: Arc<VowelReferenceTable>,
}

impl FormantDeviationAggregator {
    pub fn new(reference: Arc<VowelReferenceTable>) -> Self {
        Self { reference }
    }

    pub fn reference(&self) -> &VowelReferenceTable {
        &self.reference
    }

    /// Inside the vowel's F1 and F2 bounds (inclusive). Labels missing from
    /// the reference table are never valid.
    pub fn is_valid(&self, measurement: &FormantMeasurement) -> bool {
        self.reference
            .range(&measurement.phone)
            .is_some_and(|range| range.contains(measurement.f1, measurement.f2))
    }

    /// Mean F1 and F2 deviations across all valid measurements, pooled over
    /// vowels without per-vowel weighting.
    pub fn aggregate(&self, measurements: &[FormantMeasurement]) -> Result<FormantDiffs> {
        let mut f1_total = 0.0;
        let mut f2_total = 0.0;
        let mut count = 0usize;
        for measurement in measurements {
            if !self.is_valid(measurement) {
                debug!(
                    phone = %measurement.phone,
                    f1 = measurement.f1,
                    f2 = measurement.f2,
                    "formants outside expected range; excluded"
                );
                continue;
            }
            let Some(default) = self.reference.default_formants(&measurement.phone) else {
                continue;
            };
            f1_total += measurement.f1 - default.f1;
            f2_total += measurement.f2 - default.f2;
            count += 1;
        }
        if count == 0 {
            return Err(ExtractionError::InsufficientVowelData);
        }
        Ok(FormantDiffs {
            f1_diff: f1_total / count as f64,
            f2_diff: f2_total / count as f64,
        })
    }
}
