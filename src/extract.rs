//! Formant-deviation extraction: phone alignment, per-vowel formant
//! estimation and aggregation against the vowel reference table.

use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use crate::audio;
use crate::config::FormantSettings;
use crate::error::Result;
use crate::formant::{FormantDeviationAggregator, FormantEstimator, FormantMeasurement};
use crate::phones::{PhoneAligner, PhoneRecognizer};
use crate::reference::VowelReferenceTable;
use crate::types::{FormantDiffs, PhoneSegment, Waveform};

/// A vowel segment with its measured formants and validity verdict.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeasuredSegment {
    #[serde(flatten)]
    pub segment: PhoneSegment,
    pub valid: bool,
}

/// Everything computed for one recording.
#[derive(Debug, Clone)]
pub struct FormantAnalysis {
    /// Vowel segments whose formants could be estimated, in time order.
    pub measured: Vec<MeasuredSegment>,
    pub diffs: Result<FormantDiffs>,
}

pub struct FormantDiffExtractor {
    aligner: PhoneAligner,
    estimator: FormantEstimator,
    aggregator: FormantDeviationAggregator,
}

impl FormantDiffExtractor {
    pub fn new(
        recognizer: Arc<dyn PhoneRecognizer>,
        reference: Arc<VowelReferenceTable>,
        settings: FormantSettings,
    ) -> Self {
        Self {
            aligner: PhoneAligner::new(recognizer),
            estimator: FormantEstimator::new(settings),
            aggregator: FormantDeviationAggregator::new(reference),
        }
    }

    pub fn extract(&self, path: &Path, sampling_rate: u32) -> Result<FormantDiffs> {
        self.analyze(path, sampling_rate)?.diffs
    }

    /// Decode, align and measure `path`. Decode and alignment failures are
    /// returned directly; aggregation failures end up in `diffs`.
    pub fn analyze(&self, path: &Path, sampling_rate: u32) -> Result<FormantAnalysis> {
        let waveform = audio::load_waveform(path, sampling_rate)?;
        self.analyze_waveform(path, &waveform)
    }

    /// Like [`analyze`](Self::analyze) for a waveform already decoded from
    /// `path`; the recognizer still reads `path`.
    pub fn analyze_waveform(&self, path: &Path, waveform: &Waveform) -> Result<FormantAnalysis> {
        let segments = self.aligner.segments(path)?;
        Ok(self.analyze_segments(waveform, &segments))
    }

    pub fn extract_waveform(&self, path: &Path, waveform: &Waveform) -> Result<FormantDiffs> {
        self.analyze_waveform(path, waveform)?.diffs
    }

    /// Measure every vowel in `segments`, skipping those whose estimate
    /// fails, and aggregate the valid ones.
    pub fn analyze_segments(&self, waveform: &Waveform, segments: &[PhoneSegment]) -> FormantAnalysis {
        let reference = self.aggregator.reference();
        let mut measured = Vec::new();
        let mut measurements = Vec::new();
        for segment in segments.iter().filter(|s| reference.is_vowel(&s.phone)) {
            let estimated = match self.estimator.estimate(waveform, segment) {
                Ok(estimated) => estimated,
                Err(err) => {
                    debug!(
                        phone = %segment.phone,
                        start = segment.start,
                        error = %err,
                        "skipping vowel segment"
                    );
                    continue;
                }
            };
            let (Some(f1), Some(f2)) = (estimated.formant1, estimated.formant2) else {
                continue;
            };
            let measurement = FormantMeasurement::new(estimated.phone.clone(), f1, f2);
            let valid = self.aggregator.is_valid(&measurement);
            measurements.push(measurement);
            measured.push(MeasuredSegment {
                segment: estimated,
                valid,
            });
        }
        let diffs = self.aggregator.aggregate(&measurements);
        FormantAnalysis { measured, diffs }
    }
}
