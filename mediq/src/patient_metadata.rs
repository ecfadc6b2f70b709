//! Patient metadata table keyed by image file name.
//!
//! Only the join key and three display columns are read; every other column
//! of the source table is ignored.

use crate::error::{MediqError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

pub const KEY_COLUMN: &str = "Image Index";
pub const FINDING_LABELS_COLUMN: &str = "Finding Labels";
pub const PATIENT_AGE_COLUMN: &str = "Patient Age";
pub const PATIENT_GENDER_COLUMN: &str = "Patient Gender";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatientRecord {
    #[serde(rename = "Image Index")]
    pub image_index: String,
    #[serde(rename = "Finding Labels")]
    pub finding_labels: String,
    #[serde(rename = "Patient Age")]
    pub patient_age: String,
    #[serde(rename = "Patient Gender")]
    pub patient_gender: String,
}

/// Age in years from the leading digits ("58", "058Y" -> 58)
pub fn parse_age_years(raw: &str) -> Option<u32> {
    let digits: String = raw
        .trim()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

impl PatientRecord {
    pub fn age_years(&self) -> Option<u32> {
        parse_age_years(&self.patient_age)
    }
}

/// Metadata rows in file order with a key index. Duplicate keys are kept.
#[derive(Debug, Default)]
pub struct PatientTable {
    records: Vec<PatientRecord>,
    by_key: HashMap<String, Vec<usize>>,
}

struct ColumnIndices {
    key: usize,
    findings: usize,
    age: usize,
    gender: usize,
}

impl ColumnIndices {
    fn from_headers(headers: &csv::StringRecord, path: &Path) -> Result<Self> {
        let find = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim() == name)
                .ok_or_else(|| MediqError::Metadata {
                    path: path.to_path_buf(),
                    reason: format!("missing required column '{name}'"),
                })
        };

        Ok(Self {
            key: find(KEY_COLUMN)?,
            findings: find(FINDING_LABELS_COLUMN)?,
            age: find(PATIENT_AGE_COLUMN)?,
            gender: find(PATIENT_GENDER_COLUMN)?,
        })
    }
}

impl PatientTable {
    pub fn from_records(records: Vec<PatientRecord>) -> Self {
        let mut by_key: HashMap<String, Vec<usize>> = HashMap::new();
        for (i, record) in records.iter().enumerate() {
            by_key.entry(record.image_index.clone()).or_default().push(i);
        }
        Self { records, by_key }
    }

    /// Load a CSV table from disk. A missing file is `MissingInput`.
    pub fn from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(MediqError::MissingInput {
                path: path.to_path_buf(),
            });
        }
        let file = File::open(path)?;
        Self::from_reader(file, path)
    }

    /// Parse a CSV table with a header row. `origin` is only used in errors.
    pub fn from_reader<R: Read>(reader: R, origin: &Path) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);

        let columns = ColumnIndices::from_headers(rdr.headers()?, origin)?;

        let mut records = Vec::new();
        for row in rdr.records() {
            let row = row?;
            let field = |i: usize| row.get(i).unwrap_or("").to_string();
            let image_index = field(columns.key);
            if image_index.is_empty() {
                continue;
            }
            records.push(PatientRecord {
                image_index,
                finding_labels: field(columns.findings),
                patient_age: field(columns.age),
                patient_gender: field(columns.gender),
            });
        }

        log::debug!(
            "Loaded {} metadata rows from {}",
            records.len(),
            origin.display()
        );
        Ok(Self::from_records(records))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[PatientRecord] {
        &self.records
    }

    /// All rows for a key, in file order
    pub fn lookup<'a>(&'a self, key: &str) -> impl Iterator<Item = &'a PatientRecord> + 'a {
        self.by_key
            .get(key)
            .into_iter()
            .flat_map(move |indices| indices.iter().map(move |&i| &self.records[i]))
    }
}
