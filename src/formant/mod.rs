//! Per-segment formant estimation and deviation aggregation.

pub mod aggregate;
pub mod burg;

pub use aggregate::{FormantDeviationAggregator, FormantMeasurement};
pub use burg::{BurgTracker, FormantFrame, FormantPoint, FormantTrack};

use crate::audio::slicer;
use crate::config::FormantSettings;
use crate::error::{ExtractionError, Result};
use crate::types::{PhoneSegment, Waveform};

/// Trajectories are sampled every millisecond of the segment.
const SAMPLE_STEP_SECONDS: f64 = 0.001;

/// Estimates F1/F2 for one phone segment as the medians of the tracked
/// trajectories over the segment's span.
#[derive(Debug, Clone, Default)]
pub struct FormantEstimator {
    tracker: BurgTracker,
}

impl FormantEstimator {
    pub fn new(settings: FormantSettings) -> Self {
        Self {
            tracker: BurgTracker::new(settings),
        }
    }

    /// Median `(f1, f2)` over the segment, or `NoFormantSignal` when either
    /// trajectory has no finite sample.
    pub fn measure(&self, waveform: &Waveform, segment: &PhoneSegment) -> Result<(f64, f64)> {
        let span = slicer::slice_span(waveform, segment.start, segment.duration);
        let track = self.tracker.track(span, waveform.sample_rate);
        let steps = (segment.duration / SAMPLE_STEP_SECONDS).round() as usize;

        let sample = |number: usize| -> Vec<f64> {
            (0..steps)
                .map(|i| track.value_at_time(number, i as f64 * SAMPLE_STEP_SECONDS))
                .filter(|value| value.is_finite())
                .collect()
        };
        let f1 = median(sample(1)).ok_or(ExtractionError::NoFormantSignal)?;
        let f2 = median(sample(2)).ok_or(ExtractionError::NoFormantSignal)?;
        Ok((f1, f2))
    }

    /// Same as [`measure`](Self::measure), returning a copy of `segment` that
    /// carries the formants.
    pub fn estimate(&self, waveform: &Waveform, segment: &PhoneSegment) -> Result<PhoneSegment> {
        let (f1, f2) = self.measure(waveform, segment)?;
        Ok(segment.with_formants(f1, f2))
    }
}

fn median(mut values: Vec<f64>) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    Some(if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    })
}
