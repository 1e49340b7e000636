//! Table-driven extraction over many recordings with a bounded worker pool.

mod table;

use std::sync::Arc;
use std::thread;

use anyhow::{anyhow, bail, Context, Result as AnyResult};
use clap::ValueEnum;
use crossbeam_channel::bounded;
use tracing::{debug, info, warn};

pub use table::{read_table, write_table, InputRow, InputTable, FILENAME_COLUMN, SAMPLING_RATE_COLUMN};

use crate::audio;
use crate::config::AnalysisConfig;
use crate::error::{ExtractionError, Result};
use crate::extract::FormantDiffExtractor;
use crate::phones::PhoneRecognizer;
use crate::pitch::PitchIntonationExtractor;
use crate::reference::VowelReferenceTable;
use crate::types::{FormantDiffs, PitchIntonation};

const PITCH_COLUMNS: &[&str] = &["pitch", "intonation"];
const FORMANT_COLUMNS: &[&str] = &["f1_diff", "f2_diff"];
const ALL_COLUMNS: &[&str] = &["pitch", "intonation", "f1_diff", "f2_diff"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum FeatureSet {
    Pitch,
    Formants,
    #[default]
    All,
}

impl FeatureSet {
    pub fn columns(self) -> &'static [&'static str] {
        match self {
            FeatureSet::Pitch => PITCH_COLUMNS,
            FeatureSet::Formants => FORMANT_COLUMNS,
            FeatureSet::All => ALL_COLUMNS,
        }
    }

    pub fn includes_pitch(self) -> bool {
        matches!(self, FeatureSet::Pitch | FeatureSet::All)
    }

    pub fn includes_formants(self) -> bool {
        matches!(self, FeatureSet::Formants | FeatureSet::All)
    }
}

/// Outcome for one input row. `None` means the feature was not requested.
#[derive(Debug, Clone)]
pub struct FeatureRecord {
    pub row: InputRow,
    pub pitch: Option<Result<PitchIntonation>>,
    pub formants: Option<Result<FormantDiffs>>,
}

impl FeatureRecord {
    /// Output cells for `features`, empty where extraction failed.
    pub fn feature_cells(&self, features: FeatureSet) -> Vec<String> {
        let mut cells = Vec::with_capacity(features.columns().len());
        if features.includes_pitch() {
            match self.pitch.as_ref().and_then(|r| r.as_ref().ok()) {
                Some(p) => cells.extend([p.pitch.to_string(), p.intonation.to_string()]),
                None => cells.extend([String::new(), String::new()]),
            }
        }
        if features.includes_formants() {
            match self.formants.as_ref().and_then(|r| r.as_ref().ok()) {
                Some(d) => cells.extend([d.f1_diff.to_string(), d.f2_diff.to_string()]),
                None => cells.extend([String::new(), String::new()]),
            }
        }
        cells
    }
}

/// Shared, read-only state for every worker.
pub struct BatchContext {
    features: FeatureSet,
    pitch: PitchIntonationExtractor,
    formants: Option<FormantDiffExtractor>,
    default_sampling_rate: u32,
}

impl BatchContext {
    /// `recognizer` is required only when formant features are requested.
    pub fn new(
        features: FeatureSet,
        config: &AnalysisConfig,
        recognizer: Option<Arc<dyn PhoneRecognizer>>,
        reference: Arc<VowelReferenceTable>,
    ) -> AnyResult<Self> {
        let formants = if features.includes_formants() {
            let recognizer = recognizer
                .ok_or_else(|| anyhow!("formant features need a phone recognizer"))?;
            Some(FormantDiffExtractor::new(
                recognizer,
                reference,
                config.formant.clone(),
            ))
        } else {
            None
        };
        Ok(Self {
            features,
            pitch: PitchIntonationExtractor::new(&config.pitch),
            formants,
            default_sampling_rate: config.batch.sampling_rate,
        })
    }

    pub fn with_extractors(
        features: FeatureSet,
        pitch: PitchIntonationExtractor,
        formants: Option<FormantDiffExtractor>,
        default_sampling_rate: u32,
    ) -> AnyResult<Self> {
        if features.includes_formants() && formants.is_none() {
            bail!("formant features need a formant extractor");
        }
        Ok(Self {
            features,
            pitch,
            formants,
            default_sampling_rate,
        })
    }

    pub fn features(&self) -> FeatureSet {
        self.features
    }

    /// Extract the requested features for one row, decoding the file once.
    /// Failures are logged and kept in the record rather than propagated.
    pub fn process(&self, row: InputRow) -> FeatureRecord {
        let rate = row.sampling_rate.unwrap_or(self.default_sampling_rate);
        let waveform = match &row.rate_error {
            Some(reason) => Err(ExtractionError::decode(&row.filename, reason.as_str())),
            None => audio::load_waveform(&row.filename, rate),
        };
        let pitch = self.features.includes_pitch().then(|| {
            waveform
                .as_ref()
                .map_err(Clone::clone)
                .and_then(|w| self.pitch.extract_waveform(w))
        });
        let formants = match (&self.formants, self.features.includes_formants()) {
            (Some(extractor), true) => Some(
                waveform
                    .as_ref()
                    .map_err(Clone::clone)
                    .and_then(|w| extractor.extract_waveform(&row.filename, w)),
            ),
            _ => None,
        };
        for (feature, err) in [
            ("pitch", pitch.as_ref().and_then(|r| r.as_ref().err())),
            ("formants", formants.as_ref().and_then(|r| r.as_ref().err())),
        ] {
            if let Some(err) = err {
                warn!(
                    file = %row.filename.display(),
                    feature,
                    kind = err.kind(),
                    error = %err,
                    "feature extraction failed"
                );
            }
        }
        FeatureRecord {
            row,
            pitch,
            formants,
        }
    }
}

/// Process `rows` on `workers` threads. The output has one record per input
/// row, in input order.
pub fn run_batch(
    context: &BatchContext,
    rows: Vec<InputRow>,
    workers: usize,
) -> AnyResult<Vec<FeatureRecord>> {
    let total = rows.len();
    let workers = workers.clamp(1, total.max(1));
    info!(rows = total, workers, "starting batch");

    let mut slots: Vec<Option<FeatureRecord>> = (0..total).map(|_| None).collect();
    let (job_tx, job_rx) = bounded::<(usize, InputRow)>(workers * 2);
    let (result_tx, result_rx) = bounded::<(usize, FeatureRecord)>(workers * 2);

    thread::scope(|scope| -> AnyResult<()> {
        let feeder = thread::Builder::new()
            .name("batch-feeder".into())
            .spawn_scoped(scope, move || {
                for job in rows.into_iter().enumerate() {
                    if job_tx.send(job).is_err() {
                        break;
                    }
                }
            })
            .context("Failed to spawn batch feeder")?;

        let mut handles = Vec::with_capacity(workers);
        for id in 0..workers {
            let job_rx = job_rx.clone();
            let result_tx = result_tx.clone();
            let handle = thread::Builder::new()
                .name(format!("batch-worker-{id}"))
                .spawn_scoped(scope, move || {
                    for (index, row) in job_rx.iter() {
                        debug!(worker = id, index, file = %row.filename.display(), "processing row");
                        if result_tx.send((index, context.process(row))).is_err() {
                            break;
                        }
                    }
                })
                .context("Failed to spawn batch worker")?;
            handles.push(handle);
        }
        drop(job_rx);
        drop(result_tx);

        let step = (total / 10).max(1);
        for (done, (index, record)) in result_rx.iter().enumerate() {
            slots[index] = Some(record);
            let done = done + 1;
            if done % step == 0 || done == total {
                info!(done, total, "batch progress");
            }
        }

        feeder
            .join()
            .map_err(|_| anyhow!("batch feeder panicked"))?;
        for handle in handles {
            handle
                .join()
                .map_err(|_| anyhow!("batch worker panicked"))?;
        }
        Ok(())
    })?;

    slots
        .into_iter()
        .enumerate()
        .map(|(index, slot)| slot.ok_or_else(|| anyhow!("row {} produced no result", index)))
        .collect()
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    fn row(name: &str) -> InputRow {
        InputRow {
            filename: PathBuf::from(name),
            sampling_rate: None,
            rate_error: None,
            values: vec![name.to_string()],
        }
    }

    #[test]
    fn feature_cells_follow_the_feature_set() {
        let record = FeatureRecord {
            row: row("a.wav"),
            pitch: Some(Ok(PitchIntonation {
                pitch: 120.5,
                intonation: 10.0,
            })),
            formants: Some(Err(ExtractionError::InsufficientVowelData)),
        };
        assert_eq!(record.feature_cells(FeatureSet::All), vec!["120.5", "10", "", ""]);
        assert_eq!(record.feature_cells(FeatureSet::Pitch), vec!["120.5", "10"]);
    }

    #[test]
    fn formant_features_require_a_recognizer() {
        let reference = Arc::new(VowelReferenceTable::bundled().unwrap());
        let config = AnalysisConfig::default();
        assert!(BatchContext::new(FeatureSet::All, &config, None, reference.clone()).is_err());
        assert!(BatchContext::new(FeatureSet::Pitch, &config, None, reference).is_ok());
    }

    #[test]
    fn missing_files_yield_failures_in_input_order() {
        let reference = Arc::new(VowelReferenceTable::bundled().unwrap());
        let context =
            BatchContext::new(FeatureSet::Pitch, &AnalysisConfig::default(), None, reference)
                .unwrap();
        let rows: Vec<InputRow> = (0..7).map(|i| row(&format!("missing-{i}.wav"))).collect();
        let records = run_batch(&context, rows, 3).unwrap();
        assert_eq!(records.len(), 7);
        for (i, record) in records.iter().enumerate() {
            assert_eq!(record.row.filename, PathBuf::from(format!("missing-{i}.wav")));
            assert!(matches!(
                record.pitch,
                Some(Err(ExtractionError::DecodeFailure { .. }))
            ));
            assert!(record.formants.is_none());
        }
    }

    #[test]
    fn empty_batch_is_empty() {
        let reference = Arc::new(VowelReferenceTable::bundled().unwrap());
        let context =
            BatchContext::new(FeatureSet::Pitch, &AnalysisConfig::default(), None, reference)
                .unwrap();
        assert!(run_batch(&context, Vec::new(), 4).unwrap().is_empty());
    }
}
