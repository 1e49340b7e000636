//! Expected formant ranges and defaults per vowel label.
//!
//! The table is built once from per-gender reference averages and is never
//! mutated afterwards; share it across workers behind an `Arc`.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

use anyhow::{ensure, Context, Result};
use serde::Deserialize;
use tracing::warn;

const BUNDLED_REFERENCE: &str = include_str!("../../assets/vowel_formants.json");

/// Margin below the male average / above the female average for F1.
pub const F1_MARGIN_HZ: f64 = 250.0;
/// Margin below the male average / above the female average for F2.
pub const F2_MARGIN_HZ: f64 = 2.0 * F1_MARGIN_HZ;

/// Closed frequency interval in Hz.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FormantBounds {
    pub low: f64,
    pub high: f64,
}

impl FormantBounds {
    /// Inclusive on both ends.
    pub fn contains(&self, value: f64) -> bool {
        value >= self.low && value <= self.high
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VowelRange {
    pub f1: FormantBounds,
    pub f2: FormantBounds,
}

impl VowelRange {
    pub fn contains(&self, f1: f64, f2: f64) -> bool {
        self.f1.contains(f1) && self.f2.contains(f2)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VowelDefault {
    pub f1: f64,
    pub f2: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct VowelEntry {
    range: VowelRange,
    default: VowelDefault,
}

/// On-disk layout: gender -> formant -> vowel -> Hz.
#[derive(Debug, Deserialize)]
struct ReferenceData {
    male: GenderFormants,
    female: GenderFormants,
}

#[derive(Debug, Deserialize)]
struct GenderFormants {
    f1: BTreeMap<String, f64>,
    f2: BTreeMap<String, f64>,
}

impl GenderFormants {
    fn lookup(&self, vowel: &str) -> Option<(f64, f64)> {
        Some((*self.f1.get(vowel)?, *self.f2.get(vowel)?))
    }
}

#[derive(Debug, Clone)]
pub struct VowelReferenceTable {
    entries: HashMap<String, VowelEntry>,
}

impl VowelReferenceTable {
    /// Table compiled from the bundled `assets/vowel_formants.json`.
    pub fn bundled() -> Result<Self> {
        Self::from_json(BUNDLED_REFERENCE).context("bundled vowel reference is malformed")
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("Failed to read vowel reference {:?}", path))?;
        Self::from_json(&data).with_context(|| format!("Invalid vowel reference {:?}", path))
    }

    /// Load `path` when given, otherwise fall back to the bundled table.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::from_path(p),
            None => Self::bundled(),
        }
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let data: ReferenceData =
            serde_json::from_str(raw).context("Failed to parse vowel reference JSON")?;
        let mut entries = HashMap::new();
        for vowel in data.male.f1.keys() {
            let (Some(male), Some(female)) = (data.male.lookup(vowel), data.female.lookup(vowel))
            else {
                warn!(vowel = %vowel, "vowel lacks complete male/female statistics; skipping");
                continue;
            };
            entries.insert(vowel.clone(), build_entry(male, female));
        }
        ensure!(!entries.is_empty(), "vowel reference contained no complete entries");
        Ok(Self { entries })
    }

    pub fn is_vowel(&self, phone: &str) -> bool {
        self.entries.contains_key(phone)
    }

    pub fn range(&self, phone: &str) -> Option<&VowelRange> {
        self.entries.get(phone).map(|entry| &entry.range)
    }

    pub fn default_formants(&self, phone: &str) -> Option<&VowelDefault> {
        self.entries.get(phone).map(|entry| &entry.default)
    }

    /// Vowel labels in sorted order.
    pub fn vowels(&self) -> Vec<&str> {
        let mut vowels: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        vowels.sort_unstable();
        vowels
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn build_entry(male: (f64, f64), female: (f64, f64)) -> VowelEntry {
    let (male_f1, male_f2) = male;
    let (female_f1, female_f2) = female;
    VowelEntry {
        range: VowelRange {
            f1: FormantBounds {
                low: male_f1 - F1_MARGIN_HZ,
                high: female_f1 + F1_MARGIN_HZ,
            },
            f2: FormantBounds {
                low: male_f2 - F2_MARGIN_HZ,
                high: female_f2 + F2_MARGIN_HZ,
            },
        },
        default: VowelDefault {
            f1: (male_f1 + female_f1) / 2.0,
            f2: (male_f2 + female_f2) / 2.0,
        },
    }
}
