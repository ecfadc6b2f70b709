//! Batch scoring of an image directory and inner join with patient metadata.
//!
//! Images are processed one at a time and independently. A decode failure is
//! logged and skipped; it never aborts the batch.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::color_utils::{progress::create_batch_progress_bar, symbols};
use crate::config::PipelineConfig;
use crate::error::MediqError;
use crate::image_input::find_images_in_directory;
use crate::output_manager::OutputManager;
use crate::patient_metadata::{PatientRecord, PatientTable};
use crate::quality_metrics::{compute_from_path, MetricSet};
use crate::run_metadata::{ExecutionContext, InputProcessing, ToolSections};

/// Log progress every this many images when no progress bar is shown
const PROGRESS_LOG_INTERVAL: usize = 5;

/// Metrics for one image, keyed by file name
#[derive(Debug, Clone, PartialEq)]
pub struct ImageMetrics {
    pub image_index: String,
    pub metrics: MetricSet,
}

#[derive(Debug, Clone)]
pub struct ImageFailure {
    pub path: PathBuf,
    pub reason: String,
}

#[derive(Debug, Default)]
pub struct BatchMetrics {
    pub results: Vec<ImageMetrics>,
    pub failures: Vec<ImageFailure>,
}

/// One row of the joined table; field order is the CSV column order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinedRecord {
    #[serde(rename = "Image Index")]
    pub image_index: String,
    #[serde(rename = "Brightness")]
    pub brightness: f64,
    #[serde(rename = "Contrast")]
    pub contrast: f64,
    #[serde(rename = "Sharpness")]
    pub sharpness: f64,
    #[serde(rename = "SNR")]
    pub snr: f64,
    #[serde(rename = "Finding Labels")]
    pub finding_labels: String,
    #[serde(rename = "Patient Age")]
    pub patient_age: String,
    #[serde(rename = "Patient Gender")]
    pub patient_gender: String,
}

impl JoinedRecord {
    pub fn new(metrics: &ImageMetrics, patient: &PatientRecord) -> Self {
        Self {
            image_index: metrics.image_index.clone(),
            brightness: metrics.metrics.brightness,
            contrast: metrics.metrics.contrast,
            sharpness: metrics.metrics.sharpness,
            snr: metrics.metrics.snr,
            finding_labels: patient.finding_labels.clone(),
            patient_age: patient.patient_age.clone(),
            patient_gender: patient.patient_gender.clone(),
        }
    }

    pub fn metrics(&self) -> MetricSet {
        MetricSet {
            brightness: self.brightness,
            contrast: self.contrast,
            sharpness: self.sharpness,
            snr: self.snr,
        }
    }
}

/// Outcome of one pipeline run
#[derive(Debug, Clone, Serialize)]
pub struct PipelineSummary {
    pub images_found: usize,
    pub images_processed: usize,
    pub images_failed: usize,
    pub joined_rows: usize,
    pub output_file: PathBuf,
}

fn image_key(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

/// Score every image, skipping the ones that fail to decode
pub fn process_images(paths: &[PathBuf]) -> BatchMetrics {
    let mut batch = BatchMetrics::default();
    let progress_bar = create_batch_progress_bar(paths.len());

    for (index, path) in paths.iter().enumerate() {
        match compute_from_path(path) {
            Ok(metrics) => {
                log::debug!(
                    "{}: brightness={:.2} contrast={:.2} sharpness={:.2} snr={:.2}",
                    path.display(),
                    metrics.brightness,
                    metrics.contrast,
                    metrics.sharpness,
                    metrics.snr
                );
                batch.results.push(ImageMetrics {
                    image_index: image_key(path),
                    metrics,
                });
            }
            Err(e) => {
                log::warn!(
                    "{}Skipping {} ({}/{}): {}",
                    symbols::warning(),
                    path.display(),
                    index + 1,
                    paths.len(),
                    e
                );
                batch.failures.push(ImageFailure {
                    path: path.clone(),
                    reason: e.to_string(),
                });
            }
        }

        match &progress_bar {
            Some(pb) => pb.inc(1),
            None => {
                if (index + 1) % PROGRESS_LOG_INTERVAL == 0 {
                    log::info!("   ... Processed {}/{} images", index + 1, paths.len());
                }
            }
        }
    }

    if let Some(pb) = progress_bar {
        pb.finish_and_clear();
    }

    batch
}

/// Inner join on the image file name. Output follows the metrics order; a key
/// with several metadata rows yields one row per metadata row.
pub fn inner_join(metrics: &[ImageMetrics], table: &PatientTable) -> Vec<JoinedRecord> {
    metrics
        .iter()
        .flat_map(|m| table.lookup(&m.image_index).map(move |p| JoinedRecord::new(m, p)))
        .collect()
}

/// Write the joined table with a header row, creating parent directories
pub fn write_joined_csv(records: &[JoinedRecord], path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
    }

    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;

    if records.is_empty() {
        writer.write_record([
            "Image Index",
            "Brightness",
            "Contrast",
            "Sharpness",
            "SNR",
            "Finding Labels",
            "Patient Age",
            "Patient Gender",
        ])?;
    }
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;
    Ok(())
}

/// Score a directory, merge with patient metadata and write the joined table
pub fn run_pipeline(config: &PipelineConfig) -> Result<PipelineSummary> {
    let start = Instant::now();

    if !config.image_dir.is_dir() {
        return Err(MediqError::MissingInput {
            path: config.image_dir.clone(),
        }
        .into());
    }

    let image_files = find_images_in_directory(&config.image_dir)
        .with_context(|| format!("Failed to list {}", config.image_dir.display()))?;
    log::info!(
        "{}Found {} images to process",
        symbols::resources_found(),
        image_files.len()
    );

    let batch = process_images(&image_files);
    log::info!(
        "{}Image analysis complete: {} scored, {} skipped",
        symbols::completed_successfully(),
        batch.results.len(),
        batch.failures.len()
    );

    log::info!("{}Merging with patient metadata...", symbols::merge_start());
    let table = PatientTable::from_path(&config.metadata_file)
        .with_context(|| format!("Failed to load {}", config.metadata_file.display()))?;

    let joined = inner_join(&batch.results, &table);
    write_joined_csv(&joined, &config.output_file)?;

    let summary = PipelineSummary {
        images_found: image_files.len(),
        images_processed: batch.results.len(),
        images_failed: batch.failures.len(),
        joined_rows: joined.len(),
        output_file: config.output_file.clone(),
    };

    let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
    let sections = ToolSections {
        core: Some(toml::Value::try_from(&summary)?),
        config: Some(toml::Value::try_from(config)?),
        execution: Some(ExecutionContext::current(elapsed_ms)),
        input: Some(InputProcessing {
            inputs: vec![
                config.image_dir.display().to_string(),
                config.metadata_file.display().to_string(),
            ],
            strict_mode: config.base.strict,
        }),
    };
    OutputManager::new(config, &config.output_file).save_tool_metadata(sections)?;

    Ok(summary)
}
