use std::path::Path;
use std::sync::Arc;

use vocalyzer::batch::{read_table, run_batch, write_table, BatchContext, FeatureSet};
use vocalyzer::config::FormantSettings;
use vocalyzer::phones::PhoneRecognizer;
use vocalyzer::pitch::{PitchIntonationExtractor, PitchTracker};
use vocalyzer::reference::VowelReferenceTable;
use vocalyzer::{ExtractionError, FormantDiffExtractor, Waveform};

struct ConsonantsOnly;

impl PhoneRecognizer for ConsonantsOnly {
    fn recognize(&self, _audio: &Path) -> vocalyzer::Result<String> {
        Ok("0.0 0.1 s\n0.1 0.1 t\n".to_string())
    }
}

struct ConstantPitch(f64);

impl PitchTracker for ConstantPitch {
    fn contour(&self, waveform: &Waveform) -> vocalyzer::Result<Vec<f64>> {
        Ok(vec![self.0; waveform.len() / 160])
    }
}

fn pitch_context() -> BatchContext {
    let extractor = PitchIntonationExtractor::with_tracker(Box::new(ConstantPitch(140.0)), 350.0);
    BatchContext::with_extractors(FeatureSet::Pitch, extractor, None, 16_000).expect("context")
}

#[test]
fn failed_rows_keep_their_place_with_empty_features() {
    let dir = tempfile::tempdir().expect("tempdir");
    let present = dir.path().join("present.wav");
    write_silence(&present, 8_000);
    let missing = dir.path().join("missing.wav");

    let csv = format!(
        "speaker,filename,sampling_rate\ns1,{},\ns2,{},16000\ns3,{},8000\n",
        present.display(),
        missing.display(),
        present.display()
    );
    let table = read_table(csv.as_bytes()).expect("read table");
    let records = run_batch(&pitch_context(), table.rows, 2).expect("batch");

    assert_eq!(records.len(), 3);
    assert!(matches!(records[0].pitch, Some(Ok(_))));
    assert!(matches!(records[1].pitch, Some(Err(_))));
    assert!(matches!(records[2].pitch, Some(Ok(_))));

    let mut out = Vec::new();
    write_table(&mut out, &table.headers, &records, FeatureSet::Pitch).expect("write table");
    let written = String::from_utf8(out).unwrap();
    let lines: Vec<&str> = written.lines().collect();
    assert_eq!(lines[0], "speaker,filename,sampling_rate,pitch,intonation");
    assert_eq!(lines[1], format!("s1,{},,140,0", present.display()));
    assert_eq!(lines[2], format!("s2,{},16000,,", missing.display()));
    assert_eq!(lines[3], format!("s3,{},8000,140,0", present.display()));
}

#[test]
fn many_rows_come_back_in_input_order() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut csv = String::from("filename\n");
    for i in 0..25 {
        let path = dir.path().join(format!("clip-{i:02}.wav"));
        if i % 3 != 0 {
            write_silence(&path, 1_600);
        }
        csv.push_str(&format!("{}\n", path.display()));
    }
    let table = read_table(csv.as_bytes()).unwrap();
    let records = run_batch(&pitch_context(), table.rows, 4).unwrap();

    assert_eq!(records.len(), 25);
    for (i, record) in records.iter().enumerate() {
        let expected = dir.path().join(format!("clip-{i:02}.wav"));
        assert_eq!(record.row.filename, expected);
        assert_eq!(record.pitch.as_ref().unwrap().is_ok(), i % 3 != 0);
    }
}

#[test]
fn unparseable_sampling_rate_only_empties_its_own_row() {
    let dir = tempfile::tempdir().expect("tempdir");
    let present = dir.path().join("present.wav");
    write_silence(&present, 8_000);

    let csv = format!(
        "filename,sampling_rate\n{p},16000\n{p},N/A\n{p},16000\n",
        p = present.display()
    );
    let table = read_table(csv.as_bytes()).expect("bad rate cells are not fatal");
    assert_eq!(table.rows.len(), 3);
    let records = run_batch(&pitch_context(), table.rows, 2).expect("batch");

    assert!(matches!(records[0].pitch, Some(Ok(_))));
    assert!(matches!(
        records[1].pitch,
        Some(Err(ExtractionError::DecodeFailure { .. }))
    ));
    assert!(matches!(records[2].pitch, Some(Ok(_))));

    let mut out = Vec::new();
    write_table(&mut out, &table.headers, &records, FeatureSet::Pitch).unwrap();
    let written = String::from_utf8(out).unwrap();
    let lines: Vec<&str> = written.lines().collect();
    assert_eq!(lines.len(), 4);
    assert_eq!(lines[2], format!("{},N/A,,", present.display()));
}

#[test]
fn all_features_share_one_decoded_waveform() {
    let dir = tempfile::tempdir().expect("tempdir");
    let present = dir.path().join("present.wav");
    write_silence(&present, 8_000);
    let missing = dir.path().join("missing.wav");

    let reference = Arc::new(VowelReferenceTable::bundled().expect("bundled table"));
    let formants =
        FormantDiffExtractor::new(Arc::new(ConsonantsOnly), reference, FormantSettings::default());
    let pitch = PitchIntonationExtractor::with_tracker(Box::new(ConstantPitch(140.0)), 350.0);
    let context =
        BatchContext::with_extractors(FeatureSet::All, pitch, Some(formants), 16_000).unwrap();

    let csv = format!("filename\n{}\n{}\n", present.display(), missing.display());
    let table = read_table(csv.as_bytes()).unwrap();
    let records = run_batch(&context, table.rows, 2).unwrap();

    assert!(matches!(records[0].pitch, Some(Ok(_))));
    assert_eq!(
        records[0].formants,
        Some(Err(ExtractionError::InsufficientVowelData))
    );
    assert_eq!(records[1].pitch.as_ref().unwrap().as_ref().unwrap_err().kind(), "decode_failure");
    assert_eq!(records[1].formants.as_ref().unwrap().as_ref().unwrap_err().kind(), "decode_failure");
    assert_eq!(
        records[0].feature_cells(FeatureSet::All),
        vec!["140", "0", "", ""]
    );
}

#[test]
fn formant_features_need_an_extractor() {
    let extractor = PitchIntonationExtractor::with_tracker(Box::new(ConstantPitch(140.0)), 350.0);
    assert!(BatchContext::with_extractors(FeatureSet::All, extractor, None, 16_000).is_err());
}

#[test]
fn header_only_table_writes_header_only() {
    let table = read_table("filename\n".as_bytes()).unwrap();
    let records = run_batch(&pitch_context(), table.rows, 8).unwrap();
    let mut out = Vec::new();
    write_table(&mut out, &table.headers, &records, FeatureSet::All).unwrap();
    assert_eq!(
        String::from_utf8(out).unwrap(),
        "filename,pitch,intonation,f1_diff,f2_diff\n"
    );
}

fn write_silence(path: &Path, samples: usize) {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 16_000,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).expect("create wav");
    for _ in 0..samples {
        writer.write_sample(0i16).expect("write sample");
    }
    writer.finalize().expect("finalize wav");
}
