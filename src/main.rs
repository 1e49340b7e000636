use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use tracing::info;

use vocalyzer::batch::{self, BatchContext};
use vocalyzer::cli::{BatchArgs, Cli, Command, FormantArgs, PitchArgs, RecognizerArgs};
use vocalyzer::config::AnalysisConfig;
use vocalyzer::phones::{recognizer_from_settings, PhoneRecognizer};
use vocalyzer::reference::VowelReferenceTable;
use vocalyzer::{logging, FormantDiffExtractor, PitchIntonationExtractor};

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let config = AnalysisConfig::load(cli.config.as_deref())
        .context("Failed to load analysis configuration")?;
    let reference = Arc::new(
        VowelReferenceTable::load(cli.reference.as_deref())
            .context("Failed to load vowel reference table")?,
    );

    match &cli.command {
        Command::Pitch(args) => run_pitch(args, &config),
        Command::Formants(args) => run_formants(args, &config, reference),
        Command::Segments(args) => run_segments(args, &config, reference),
        Command::Batch(args) => run_batch(args, &config, reference),
    }
}

fn run_pitch(args: &PitchArgs, config: &AnalysisConfig) -> Result<()> {
    let rate = args.sampling_rate.unwrap_or(config.batch.sampling_rate);
    let features = PitchIntonationExtractor::new(&config.pitch)
        .extract(&args.audio, rate)
        .with_context(|| format!("Pitch extraction failed for {:?}", args.audio))?;
    print_json(&features)
}

fn run_formants(
    args: &FormantArgs,
    config: &AnalysisConfig,
    reference: Arc<VowelReferenceTable>,
) -> Result<()> {
    let extractor = formant_extractor(&args.recognizer, config, reference)?;
    let rate = args.sampling_rate.unwrap_or(config.batch.sampling_rate);
    let diffs = extractor
        .extract(&args.audio, rate)
        .with_context(|| format!("Formant extraction failed for {:?}", args.audio))?;
    print_json(&diffs)
}

fn run_segments(
    args: &FormantArgs,
    config: &AnalysisConfig,
    reference: Arc<VowelReferenceTable>,
) -> Result<()> {
    let extractor = formant_extractor(&args.recognizer, config, reference)?;
    let rate = args.sampling_rate.unwrap_or(config.batch.sampling_rate);
    let analysis = extractor
        .analyze(&args.audio, rate)
        .with_context(|| format!("Segment analysis failed for {:?}", args.audio))?;
    if let Err(err) = &analysis.diffs {
        info!(file = %args.audio.display(), error = %err, "no formant deviations");
    }
    print_json(&analysis.measured)
}

fn run_batch(
    args: &BatchArgs,
    config: &AnalysisConfig,
    reference: Arc<VowelReferenceTable>,
) -> Result<()> {
    args.validate()
        .context("Failed to validate command-line arguments")?;

    let mut config = config.clone();
    if let Some(rate) = args.sampling_rate {
        config.batch.sampling_rate = rate;
    }
    let recognizer = if args.features.includes_formants() {
        Some(build_recognizer(&args.recognizer, &config)?)
    } else {
        None
    };
    let context = BatchContext::new(args.features, &config, recognizer, reference)?;

    let input = File::open(&args.input)
        .with_context(|| format!("Failed to open input table {:?}", args.input))?;
    let table = batch::read_table(BufReader::new(input))
        .with_context(|| format!("Failed to read input table {:?}", args.input))?;
    info!(rows = table.rows.len(), input = %args.input.display(), "loaded input table");

    let records = batch::run_batch(&context, table.rows, args.worker_count(&config))?;

    let output = File::create(&args.output)
        .with_context(|| format!("Failed to create output table {:?}", args.output))?;
    batch::write_table(BufWriter::new(output), &table.headers, &records, args.features)
        .with_context(|| format!("Failed to write output table {:?}", args.output))?;
    info!(rows = records.len(), output = %args.output.display(), "wrote feature table");
    Ok(())
}

fn formant_extractor(
    args: &RecognizerArgs,
    config: &AnalysisConfig,
    reference: Arc<VowelReferenceTable>,
) -> Result<FormantDiffExtractor> {
    let recognizer = build_recognizer(args, config)?;
    Ok(FormantDiffExtractor::new(
        recognizer,
        reference,
        config.formant.clone(),
    ))
}

fn build_recognizer(
    args: &RecognizerArgs,
    config: &AnalysisConfig,
) -> Result<Arc<dyn PhoneRecognizer>> {
    recognizer_from_settings(&args.apply(&config.recognizer))
        .context("Failed to set up the phone recognizer")
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    serde_json::to_writer_pretty(&mut out, value).context("Failed to serialize output")?;
    writeln!(out)?;
    Ok(())
}
