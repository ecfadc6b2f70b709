//! Exploratory statistics over the joined dataset.

use crate::batch_pipeline::JoinedRecord;
use crate::chart_rendering::{render_histogram, render_scatter, save_chart, ChartStyle};
use crate::config::InsightsConfig;
use crate::error::{MediqError, Result};
use crate::patient_metadata::parse_age_years;
use crate::verdict::{classify, Verdict};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub const HISTOGRAM_FILE: &str = "sharpness_histogram.png";
pub const SCATTER_FILE: &str = "brightness_vs_age.png";

/// Load the joined table written by the batch pipeline
pub fn load_joined_dataset(path: &Path) -> Result<Vec<JoinedRecord>> {
    if !path.exists() {
        return Err(MediqError::MissingInput {
            path: path.to_path_buf(),
        });
    }

    let mut reader = csv::Reader::from_path(path)?;
    let records = reader
        .deserialize::<JoinedRecord>()
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(records)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MetricMeans {
    pub brightness: f64,
    pub contrast: f64,
    pub sharpness: f64,
    pub snr: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DatasetSummary {
    pub record_count: usize,
    pub preview: Vec<JoinedRecord>,
    /// `None` for an empty dataset
    pub means: Option<MetricMeans>,
    pub verdict_counts: BTreeMap<String, usize>,
}

fn mean_of(records: &[JoinedRecord], field: impl Fn(&JoinedRecord) -> f64) -> f64 {
    records.iter().map(field).sum::<f64>() / records.len() as f64
}

impl DatasetSummary {
    pub fn from_records(records: &[JoinedRecord], preview_rows: usize) -> Self {
        let n = records.len();
        let means = (n > 0).then(|| MetricMeans {
            brightness: mean_of(records, |r| r.brightness),
            contrast: mean_of(records, |r| r.contrast),
            sharpness: mean_of(records, |r| r.sharpness),
            snr: mean_of(records, |r| r.snr),
        });

        let mut verdict_counts: BTreeMap<String, usize> = Verdict::all()
            .iter()
            .map(|v| (v.label().to_string(), 0))
            .collect();
        for record in records {
            let verdict = classify(&record.metrics());
            *verdict_counts.entry(verdict.label().to_string()).or_default() += 1;
        }

        Self {
            record_count: n,
            preview: records.iter().take(preview_rows).cloned().collect(),
            means,
            verdict_counts,
        }
    }
}

/// Equal-width histogram
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Histogram {
    pub min: f64,
    pub max: f64,
    pub counts: Vec<usize>,
}

impl Histogram {
    pub fn bin_width(&self) -> f64 {
        if self.counts.is_empty() {
            0.0
        } else {
            (self.max - self.min) / self.counts.len() as f64
        }
    }

    pub fn total(&self) -> usize {
        self.counts.iter().sum()
    }
}

/// Bin values into `bins` equal-width bins over [min, max]. The maximum lands
/// in the last bin; a constant column puts everything in the first bin.
pub fn histogram(values: &[f64], bins: usize) -> Histogram {
    let bins = bins.max(1);
    let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    let mut counts = vec![0usize; bins];

    if finite.is_empty() {
        return Histogram {
            min: 0.0,
            max: 0.0,
            counts,
        };
    }

    let min = finite.iter().copied().fold(f64::INFINITY, f64::min);
    let max = finite.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let span = max - min;

    for v in finite {
        let idx = if span > 0.0 {
            (((v - min) / span) * bins as f64) as usize
        } else {
            0
        };
        counts[idx.min(bins - 1)] += 1;
    }

    Histogram { min, max, counts }
}

pub fn sharpness_histogram(records: &[JoinedRecord], bins: usize) -> Histogram {
    let values: Vec<f64> = records.iter().map(|r| r.sharpness).collect();
    histogram(&values, bins)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScatterPoint {
    pub x: f64,
    pub y: f64,
    pub group: String,
}

/// Brightness against patient age, grouped by gender. Records whose age does
/// not parse are dropped.
pub fn brightness_vs_age(records: &[JoinedRecord]) -> Vec<ScatterPoint> {
    records
        .iter()
        .filter_map(|r| {
            parse_age_years(&r.patient_age).map(|age| ScatterPoint {
                x: age as f64,
                y: r.brightness,
                group: r.patient_gender.clone(),
            })
        })
        .collect()
}

/// What `run_insights` produced
#[derive(Debug, Clone)]
pub struct InsightsOutcome {
    pub summary: DatasetSummary,
    pub histogram_path: PathBuf,
    pub scatter_path: PathBuf,
    pub points_plotted: usize,
}

/// Load the joined table, summarize it and write both charts. A missing table
/// surfaces as `MediqError::MissingInput` inside the returned error.
pub fn run_insights(config: &InsightsConfig) -> anyhow::Result<InsightsOutcome> {
    let records = load_joined_dataset(&config.data_file)?;
    log::debug!(
        "Loaded {} joined rows from {}",
        records.len(),
        config.data_file.display()
    );

    let summary = DatasetSummary::from_records(&records, config.preview_rows);
    let style = ChartStyle::with_size(config.chart_size);

    let histogram = sharpness_histogram(&records, config.bins);
    let histogram_path = config.chart_dir.join(HISTOGRAM_FILE);
    save_chart(&render_histogram(&histogram, &style), &histogram_path)?;

    let points = brightness_vs_age(&records);
    if points.len() < records.len() {
        log::info!(
            "{} rows without a usable age left out of the scatter plot",
            records.len() - points.len()
        );
    }
    let scatter_path = config.chart_dir.join(SCATTER_FILE);
    save_chart(&render_scatter(&points, &style), &scatter_path)?;

    Ok(InsightsOutcome {
        summary,
        histogram_path,
        scatter_path,
        points_plotted: points.len(),
    })
}
