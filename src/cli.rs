use std::path::PathBuf;

use anyhow::{ensure, Result};
use clap::{Args, Parser, Subcommand};

use crate::batch::FeatureSet;
use crate::config::{AnalysisConfig, RecognizerSettings};

pub const DEFAULT_SIDECAR_EXTENSION: &str = "phones";

#[derive(Parser, Debug)]
#[command(name = "vocalyzer", version)]
#[command(about = "Pitch, intonation and vowel formant features from speech recordings", long_about = None)]
pub struct Cli {
    /// JSON analysis configuration; defaults apply to anything it omits.
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Vowel reference table (JSON) replacing the bundled one.
    #[arg(long, global = true, value_name = "FILE")]
    pub reference: Option<PathBuf>,

    /// Debug-level logging unless RUST_LOG is set.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print mean pitch and intonation of one recording as JSON.
    Pitch(PitchArgs),
    /// Print mean F1/F2 deviations of one recording as JSON.
    Formants(FormantArgs),
    /// Print every measured vowel segment of one recording as JSON.
    Segments(FormantArgs),
    /// Extract features for every row of a CSV table.
    Batch(BatchArgs),
}

#[derive(Args, Debug, Clone)]
pub struct PitchArgs {
    /// Audio file (WAV, FLAC, MP3, OGG, ...).
    #[arg(value_name = "AUDIO")]
    pub audio: PathBuf,
    /// Rate the audio is resampled to before analysis.
    #[arg(long = "sampling-rate", value_name = "HZ")]
    pub sampling_rate: Option<u32>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct RecognizerArgs {
    /// Phone recognizer command line; `{input}` is replaced by the audio path.
    #[arg(long, value_name = "CMD", conflicts_with = "sidecar")]
    pub recognizer: Option<String>,
    /// Read recognizer output from `<audio>.<EXT>` instead of running one.
    #[arg(
        long,
        value_name = "EXT",
        num_args = 0..=1,
        default_missing_value = DEFAULT_SIDECAR_EXTENSION
    )]
    pub sidecar: Option<String>,
    /// Allow only one recognizer invocation at a time.
    #[arg(long)]
    pub exclusive: bool,
}

impl RecognizerArgs {
    /// Command-line flags override the configured recognizer as a whole.
    pub fn apply(&self, configured: &RecognizerSettings) -> RecognizerSettings {
        let mut settings = if self.recognizer.is_some() || self.sidecar.is_some() {
            RecognizerSettings {
                command: self.recognizer.clone(),
                sidecar_extension: self.sidecar.clone(),
                exclusive: configured.exclusive,
            }
        } else {
            configured.clone()
        };
        settings.exclusive |= self.exclusive;
        settings
    }
}

#[derive(Args, Debug, Clone)]
pub struct FormantArgs {
    #[arg(value_name = "AUDIO")]
    pub audio: PathBuf,
    #[arg(long = "sampling-rate", value_name = "HZ")]
    pub sampling_rate: Option<u32>,
    #[command(flatten)]
    pub recognizer: RecognizerArgs,
}

#[derive(Args, Debug, Clone)]
pub struct BatchArgs {
    /// CSV with a `filename` column and an optional `sampling_rate` column.
    #[arg(value_name = "INPUT_CSV")]
    pub input: PathBuf,
    /// Destination CSV: input columns followed by the feature columns.
    #[arg(value_name = "OUTPUT_CSV")]
    pub output: PathBuf,
    #[arg(long, value_enum, default_value_t = FeatureSet::All)]
    pub features: FeatureSet,
    /// Worker threads; defaults to the configured count.
    #[arg(long, value_name = "N")]
    pub workers: Option<usize>,
    /// Rate for rows without a `sampling_rate` value.
    #[arg(long = "sampling-rate", value_name = "HZ")]
    pub sampling_rate: Option<u32>,
    #[command(flatten)]
    pub recognizer: RecognizerArgs,
}

impl BatchArgs {
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.input.is_file(),
            "Input table does not exist: {:?}",
            self.input
        );
        if let Some(workers) = self.workers {
            ensure!(workers > 0, "--workers must be positive");
        }
        if let Some(rate) = self.sampling_rate {
            ensure!(rate > 0, "--sampling-rate must be positive");
        }
        Ok(())
    }

    pub fn worker_count(&self, config: &AnalysisConfig) -> usize {
        self.workers.unwrap_or(config.batch.workers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_pitch_with_global_flags() {
        let cli = Cli::try_parse_from([
            "vocalyzer",
            "pitch",
            "clip.wav",
            "--sampling-rate",
            "16000",
            "--verbose",
        ])
        .unwrap();
        assert!(cli.verbose);
        match cli.command {
            Command::Pitch(args) => {
                assert_eq!(args.audio, PathBuf::from("clip.wav"));
                assert_eq!(args.sampling_rate, Some(16_000));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn bare_sidecar_flag_uses_default_extension() {
        let cli = Cli::try_parse_from(["vocalyzer", "formants", "clip.wav", "--sidecar"]).unwrap();
        let Command::Formants(args) = cli.command else {
            panic!("expected formants command");
        };
        assert_eq!(args.recognizer.sidecar.as_deref(), Some("phones"));
    }

    #[test]
    fn recognizer_and_sidecar_conflict() {
        let parsed = Cli::try_parse_from([
            "vocalyzer",
            "segments",
            "clip.wav",
            "--recognizer",
            "allosaurus {input}",
            "--sidecar",
            "txt",
        ]);
        assert!(parsed.is_err());
    }

    #[test]
    fn batch_defaults_to_all_features() {
        let cli = Cli::try_parse_from(["vocalyzer", "batch", "in.csv", "out.csv", "--workers", "2"])
            .unwrap();
        let Command::Batch(args) = cli.command else {
            panic!("expected batch command");
        };
        assert_eq!(args.features, FeatureSet::All);
        assert_eq!(args.worker_count(&AnalysisConfig::default()), 2);
    }

    #[test]
    fn cli_recognizer_overrides_config() {
        let configured = RecognizerSettings {
            command: Some("configured {input}".into()),
            sidecar_extension: None,
            exclusive: true,
        };
        let args = RecognizerArgs {
            recognizer: None,
            sidecar: Some("phones".into()),
            exclusive: false,
        };
        let settings = args.apply(&configured);
        assert_eq!(settings.command, None);
        assert_eq!(settings.sidecar_extension.as_deref(), Some("phones"));
        assert!(settings.exclusive);
    }
}
