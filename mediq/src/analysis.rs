//! Score and classify individual images named on the command line.

use anyhow::Result;
use log::{debug, warn};
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::color_utils::symbols;
use crate::config::AnalyzeConfig;
use crate::error::MediqError;
use crate::image_input::{collect_images_from_sources, ImageInputConfig};
use crate::output_manager::OutputManager;
use crate::quality_metrics::compute_from_path;
use crate::report::ImageReport;
use crate::run_metadata::{ExecutionContext, InputProcessing, ToolSections};
use crate::verdict::classify;

#[derive(Debug, Default)]
pub struct AnalysisOutcome {
    pub reports: Vec<ImageReport>,
    pub failed: Vec<PathBuf>,
}

impl AnalysisOutcome {
    pub fn total(&self) -> usize {
        self.reports.len() + self.failed.len()
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

/// Decode, measure and classify one image
pub fn analyze_image(path: &Path) -> std::result::Result<ImageReport, MediqError> {
    let metrics = compute_from_path(path)?;
    Ok(ImageReport {
        image: display_name(path),
        metrics,
        verdict: classify(&metrics),
    })
}

/// Analyze every image named by `config.sources`. Images that fail to decode
/// are recorded in `failed`; an unusable source list is an error.
pub fn run_analysis(config: &AnalyzeConfig) -> Result<AnalysisOutcome> {
    let input_config = ImageInputConfig::from_strict_flag(config.base.strict);
    let image_files = collect_images_from_sources(&config.sources, &input_config)?;
    debug!("{}Analyzing {} images", symbols::analysis_start(), image_files.len());

    let mut outcome = AnalysisOutcome::default();
    for path in image_files {
        let start = Instant::now();
        match analyze_image(&path) {
            Ok(report) => {
                let sections = ToolSections {
                    core: Some(toml::Value::try_from(&report)?),
                    config: Some(toml::Value::try_from(config)?),
                    execution: Some(ExecutionContext::current(
                        start.elapsed().as_secs_f64() * 1000.0,
                    )),
                    input: Some(InputProcessing {
                        inputs: vec![path.display().to_string()],
                        strict_mode: config.base.strict,
                    }),
                };
                OutputManager::new(config, &path).save_tool_metadata(sections)?;
                outcome.reports.push(report);
            }
            Err(e) if e.is_skippable() => {
                warn!("{}{}", symbols::operation_failed(), e);
                outcome.failed.push(path);
            }
            Err(e) => return Err(e.into()),
        }
    }

    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BaseConfig;
    use crate::verdict::Verdict;
    use image::{GrayImage, Luma};
    use std::fs;

    fn config_for(sources: Vec<String>, skip_metadata: bool) -> AnalyzeConfig {
        AnalyzeConfig {
            base: BaseConfig {
                output_dir: None,
                skip_metadata,
                strict: true,
            },
            sources,
            json: false,
        }
    }

    #[test]
    fn test_analyze_flat_image_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("flat.png");
        GrayImage::from_pixel(10, 10, Luma([128])).save(&path).unwrap();

        let report = analyze_image(&path).unwrap();
        assert_eq!(report.image, "flat.png");
        assert_eq!(report.metrics.brightness, 128.0);
        assert_eq!(report.metrics.snr, 0.0);
        assert_eq!(report.verdict, Verdict::Reject);
    }

    #[test]
    fn test_run_analysis_skips_undecodable_images() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good.png");
        GrayImage::from_fn(8, 8, |x, y| Luma([if (x + y) % 2 == 0 { 0 } else { 255 }]))
            .save(&good)
            .unwrap();
        fs::write(dir.path().join("broken.png"), b"truncated").unwrap();

        let config = config_for(vec![dir.path().display().to_string()], true);
        let outcome = run_analysis(&config).unwrap();

        assert_eq!(outcome.total(), 2);
        assert_eq!(outcome.reports.len(), 1);
        assert_eq!(outcome.reports[0].verdict, Verdict::Accept);
        assert_eq!(outcome.failed, vec![dir.path().join("broken.png")]);
    }

    #[test]
    fn test_run_analysis_writes_sidecar_when_enabled() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan.png");
        GrayImage::from_pixel(4, 4, Luma([10])).save(&path).unwrap();

        let config = config_for(vec![path.display().to_string()], false);
        run_analysis(&config).unwrap();

        let sidecar = fs::read_to_string(dir.path().join("scan.mediq.toml")).unwrap();
        assert!(sidecar.contains("[analyze]"));
        assert!(sidecar.contains("verdict = \"reject\""));
        assert!(sidecar.contains("Brightness = 10.0"));
    }

    #[test]
    fn test_strict_missing_source_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.png").display().to_string();
        assert!(run_analysis(&config_for(vec![missing], true)).is_err());
    }
}
