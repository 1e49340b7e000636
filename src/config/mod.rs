//! Runtime-configurable analysis settings, parsed from JSON.

use std::fs;
use std::path::Path;

use anyhow::{ensure, Context, Result};
use serde::Deserialize;

/// Top-level analysis configuration. Every section and field has a default,
/// so an empty JSON object is a valid configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub pitch: PitchSettings,
    #[serde(alias = "formants")]
    pub formant: FormantSettings,
    pub recognizer: RecognizerSettings,
    pub batch: BatchSettings,
}

impl AnalysisConfig {
    /// Load from `path` when given, otherwise return the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(p) => {
                let data = fs::read_to_string(p)
                    .with_context(|| format!("Failed to read config file {:?}", p))?;
                Self::from_json(&data)?
            }
            None => Self::default(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).context("Failed to parse config JSON")
    }

    pub fn validate(&self) -> Result<()> {
        self.pitch.validate()?;
        self.formant.validate()?;
        self.batch.validate()?;
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PitchSettings {
    /// Rate the waveform is resampled to before pitch tracking.
    #[serde(alias = "analysisRate")]
    pub analysis_rate: u32,
    /// Lowest candidate frequency for the tracker, in Hz.
    #[serde(alias = "floor")]
    pub floor_hz: f64,
    /// Highest candidate frequency for the tracker, in Hz.
    #[serde(alias = "ceiling")]
    pub ceiling_hz: f64,
    /// Analysis frame length in samples at `analysis_rate`.
    #[serde(alias = "frameLength")]
    pub frame_length: usize,
    /// Frames at or above this frequency are discarded as octave errors.
    #[serde(alias = "plausibleMax")]
    pub plausible_max_hz: f64,
}

impl Default for PitchSettings {
    fn default() -> Self {
        Self {
            analysis_rate: 16_000,
            floor_hz: 75.0,
            ceiling_hz: 600.0,
            frame_length: 1024,
            plausible_max_hz: 350.0,
        }
    }
}

impl PitchSettings {
    fn validate(&self) -> Result<()> {
        ensure!(self.analysis_rate > 0, "pitch analysis_rate must be positive");
        ensure!(self.floor_hz > 0.0, "pitch floor_hz must be positive");
        ensure!(
            self.ceiling_hz > self.floor_hz,
            "pitch ceiling_hz ({}) must exceed floor_hz ({})",
            self.ceiling_hz,
            self.floor_hz
        );
        ensure!(self.frame_length >= 2, "pitch frame_length must be at least 2");
        ensure!(
            self.plausible_max_hz > 0.0,
            "pitch plausible_max_hz must be positive"
        );
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FormantSettings {
    /// Number of formants tracked per frame; the LPC order is twice this.
    #[serde(alias = "maxFormants")]
    pub max_formants: usize,
    /// Ceiling of the formant search range, in Hz.
    #[serde(alias = "maxFormantHz")]
    pub max_formant_hz: f64,
    /// Effective window length in seconds (the Gaussian window spans twice this).
    #[serde(alias = "windowLength")]
    pub window_length: f64,
    /// Frame step in seconds; zero means a quarter of `window_length`.
    #[serde(alias = "timeStep")]
    pub time_step: f64,
    /// Pre-emphasis corner frequency, in Hz.
    #[serde(alias = "preEmphasis")]
    pub pre_emphasis_hz: f64,
}

impl Default for FormantSettings {
    fn default() -> Self {
        Self {
            max_formants: 5,
            max_formant_hz: 5500.0,
            window_length: 0.025,
            time_step: 0.0,
            pre_emphasis_hz: 50.0,
        }
    }
}

impl FormantSettings {
    fn validate(&self) -> Result<()> {
        ensure!(self.max_formants >= 2, "formant max_formants must be at least 2");
        ensure!(
            self.max_formant_hz > 100.0,
            "formant max_formant_hz must exceed 100 Hz"
        );
        ensure!(self.window_length > 0.0, "formant window_length must be positive");
        ensure!(self.time_step >= 0.0, "formant time_step must not be negative");
        ensure!(
            self.pre_emphasis_hz >= 0.0,
            "formant pre_emphasis_hz must not be negative"
        );
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RecognizerSettings {
    /// External recognizer command line; `{input}` is replaced by the audio path.
    pub command: Option<String>,
    /// Read precomputed recognizer output from `<audio>.<extension>` instead.
    #[serde(alias = "sidecar")]
    pub sidecar_extension: Option<String>,
    /// Serialize recognizer calls across workers.
    pub exclusive: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BatchSettings {
    pub workers: usize,
    /// Used for rows that do not carry their own `sampling_rate`.
    #[serde(alias = "samplingRate")]
    pub sampling_rate: u32,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            workers: 8,
            sampling_rate: 48_000,
        }
    }
}

impl BatchSettings {
    fn validate(&self) -> Result<()> {
        ensure!(self.workers > 0, "batch workers must be positive");
        ensure!(self.sampling_rate > 0, "batch sampling_rate must be positive");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::AnalysisConfig;

    #[test]
    fn empty_object_yields_defaults() {
        let config = AnalysisConfig::from_json("{}").unwrap();
        config.validate().unwrap();
        assert_eq!(config.formant.max_formants, 5);
        assert_eq!(config.pitch.plausible_max_hz, 350.0);
        assert_eq!(config.batch.workers, 8);
        assert_eq!(config.batch.sampling_rate, 48_000);
    }

    #[test]
    fn accepts_camel_case_aliases() {
        let json = r#"{
            "formants": {"maxFormants": 4, "maxFormantHz": 5000.0},
            "recognizer": {"sidecar": "txt", "exclusive": true},
            "batch": {"samplingRate": 16000}
        }"#;
        let config = AnalysisConfig::from_json(json).unwrap();
        assert_eq!(config.formant.max_formants, 4);
        assert_eq!(config.formant.max_formant_hz, 5000.0);
        assert_eq!(config.recognizer.sidecar_extension.as_deref(), Some("txt"));
        assert!(config.recognizer.exclusive);
        assert_eq!(config.batch.sampling_rate, 16_000);
    }

    #[test]
    fn rejects_inverted_pitch_range() {
        let json = r#"{"pitch": {"floor": 300.0, "ceiling": 200.0}}"#;
        let config = AnalysisConfig::from_json(json).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_zero_workers() {
        let json = r#"{"batch": {"workers": 0}}"#;
        let config = AnalysisConfig::from_json(json).unwrap();
        assert!(config.validate().is_err());
    }
}
