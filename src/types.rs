//! Core types for the vocalyzer feature extraction pipeline

use std::sync::Arc;

use serde::Serialize;

/// Decoded mono audio at a fixed sample rate.
#[derive(Debug, Clone)]
pub struct Waveform {
    /// Audio samples, normalized to [-1.0, 1.0]
    pub samples: Arc<[f32]>,
    /// Sample rate in Hz (e.g., 48000)
    pub sample_rate: u32,
}

impl Waveform {
    pub fn new(samples: impl Into<Arc<[f32]>>, sample_rate: u32) -> Self {
        Self {
            samples: samples.into(),
            sample_rate,
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Duration in seconds.
    pub fn duration(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// A phone label with its onset, as reported by the recognizer.
#[derive(Debug, Clone, PartialEq)]
pub struct PhoneOnset {
    pub phone: String,
    pub onset: f64, // seconds
}

impl PhoneOnset {
    pub fn new(phone: impl Into<String>, onset: f64) -> Self {
        Self {
            phone: phone.into(),
            onset,
        }
    }
}

/// A time-bounded span of audio labeled with one phone.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhoneSegment {
    pub start: f64,    // seconds
    pub duration: f64, // seconds, derived by `phones::derive_segments`
    pub phone: String,
    pub formant1: Option<f64>,
    pub formant2: Option<f64>,
}

impl PhoneSegment {
    pub fn end(&self) -> f64 {
        self.start + self.duration
    }

    /// Returns a copy of this segment carrying the measured formants.
    pub fn with_formants(&self, formant1: f64, formant2: f64) -> Self {
        Self {
            formant1: Some(formant1),
            formant2: Some(formant2),
            ..self.clone()
        }
    }
}

/// Pitch statistics for one recording.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PitchIntonation {
    /// Mean of the plausible voiced frames, in Hz
    pub pitch: f64,
    /// Population standard deviation of the same frames, in Hz
    pub intonation: f64,
}

/// Mean signed formant deviations from the reference defaults, in Hz.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FormantDiffs {
    pub f1_diff: f64,
    pub f2_diff: f64,
}
