use aus::analysis;

use crate::audio::resample;
use crate::config::PitchSettings;
use crate::error::{ExtractionError, Result};
use crate::types::Waveform;

/// Produces a per-frame fundamental-frequency contour. Unvoiced frames are
/// reported as `0.0`.
pub trait PitchTracker: Send + Sync {
    fn contour(&self, waveform: &Waveform) -> Result<Vec<f64>>;
}

/// Probabilistic YIN tracker from `aus`, run at a fixed analysis rate.
#[derive(Debug, Clone)]
pub struct PyinTracker {
    analysis_rate: u32,
    floor_hz: f64,
    ceiling_hz: f64,
    frame_length: usize,
}

impl PyinTracker {
    pub fn new(settings: &PitchSettings) -> Self {
        Self {
            analysis_rate: settings.analysis_rate,
            floor_hz: settings.floor_hz,
            ceiling_hz: settings.ceiling_hz,
            frame_length: settings.frame_length,
        }
    }

    fn ensure_sample_rate(&self, waveform: &Waveform) -> Result<Vec<f32>> {
        if waveform.sample_rate == self.analysis_rate {
            Ok(waveform.samples.to_vec())
        } else {
            resample::linear_resample(&waveform.samples, waveform.sample_rate, self.analysis_rate)
                .map_err(|err| {
                    ExtractionError::decode(
                        "<waveform>",
                        format!(
                            "failed to resample from {} Hz to {} Hz: {err}",
                            waveform.sample_rate, self.analysis_rate
                        ),
                    )
                })
        }
    }
}

impl Default for PyinTracker {
    fn default() -> Self {
        Self::new(&PitchSettings::default())
    }
}

impl PitchTracker for PyinTracker {
    fn contour(&self, waveform: &Waveform) -> Result<Vec<f64>> {
        let samples = self.ensure_sample_rate(waveform)?;
        if samples.len() < self.frame_length {
            return Ok(Vec::new());
        }
        let audio: Vec<f64> = samples.into_iter().map(|s| s as f64).collect();
        let (_timestamps, pitches, voiced_flags, _confidence) = analysis::pyin_pitch_estimator(
            &audio,
            self.analysis_rate,
            self.floor_hz,
            self.ceiling_hz,
            self.frame_length,
        );
        Ok(voiced_contour(&pitches, &voiced_flags))
    }
}

fn voiced_contour(pitches: &[f64], voiced: &[bool]) -> Vec<f64> {
    pitches
        .iter()
        .zip(voiced.iter())
        .map(|(&pitch, &flag)| {
            if flag && pitch.is_finite() && pitch > 0.0 {
                pitch
            } else {
                0.0
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::voiced_contour;

    #[test]
    fn unvoiced_and_undefined_frames_become_zero() {
        let pitches = [110.0, f64::NAN, 130.0, 140.0, -1.0];
        let voiced = [true, true, false, true, true];
        assert_eq!(
            voiced_contour(&pitches, &voiced),
            vec![110.0, 0.0, 0.0, 140.0, 0.0]
        );
    }
}
