//! Pitch and intonation: mean and spread of the plausible voiced contour.

mod tracker;

use std::path::Path;

use ndarray::Array1;
use tracing::debug;

pub use tracker::{PitchTracker, PyinTracker};

use crate::audio;
use crate::config::PitchSettings;
use crate::error::{ExtractionError, Result};
use crate::types::{PitchIntonation, Waveform};

/// Entry point for the pitch feature pair of one recording.
pub struct PitchIntonationExtractor {
    tracker: Box<dyn PitchTracker>,
    plausible_max_hz: f64,
}

impl PitchIntonationExtractor {
    pub fn new(settings: &PitchSettings) -> Self {
        Self::with_tracker(Box::new(PyinTracker::new(settings)), settings.plausible_max_hz)
    }

    pub fn with_tracker(tracker: Box<dyn PitchTracker>, plausible_max_hz: f64) -> Self {
        Self {
            tracker,
            plausible_max_hz,
        }
    }

    pub fn extract(&self, path: &Path, sampling_rate: u32) -> Result<PitchIntonation> {
        let waveform = audio::load_waveform(path, sampling_rate)?;
        self.extract_waveform(&waveform)
    }

    pub fn extract_waveform(&self, waveform: &Waveform) -> Result<PitchIntonation> {
        let contour = self.tracker.contour(waveform)?;
        debug!(frames = contour.len(), "pitch contour computed");
        summarize_contour(&contour, self.plausible_max_hz)
    }
}

impl Default for PitchIntonationExtractor {
    fn default() -> Self {
        Self::new(&PitchSettings::default())
    }
}

/// Mean and population standard deviation of the frames in `(0, plausible_max_hz)`.
///
/// Zero marks an unvoiced frame; anything at or above `plausible_max_hz` is
/// treated as an octave error. Fails with `InsufficientSignal` when nothing
/// survives.
pub fn summarize_contour(contour: &[f64], plausible_max_hz: f64) -> Result<PitchIntonation> {
    let retained: Array1<f64> = contour
        .iter()
        .copied()
        .filter(|&f| f.is_finite() && f != 0.0 && f < plausible_max_hz)
        .collect();
    let pitch = retained.mean().ok_or(ExtractionError::InsufficientSignal)?;
    Ok(PitchIntonation {
        pitch,
        intonation: retained.std(0.0),
    })
}
