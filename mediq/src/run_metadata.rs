//! TOML sidecar metadata (`<stem>.mediq.toml`) written next to analyzed
//! images and batch outputs.

use anyhow::Result;
use chrono::{DateTime, Utc};
use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Sidecar contents; one section per tool that touched the file
#[derive(Serialize, Deserialize, Default, Debug)]
pub struct MediqMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analyze: Option<ToolSections>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub process: Option<ToolSections>,
}

/// All sections for one tool invocation
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct ToolSections {
    // Core results are flattened into the tool table
    #[serde(flatten, skip_serializing_if = "Option::is_none")]
    pub core: Option<toml::Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<toml::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution: Option<ExecutionContext>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input: Option<InputProcessing>,
}

/// Execution context for a tool invocation
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct ExecutionContext {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mediq_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command_line: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processing_time_ms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mediq_env_vars: Option<HashMap<String, String>>,
}

impl ExecutionContext {
    /// Context for the current process, stamped now
    pub fn current(processing_time_ms: f64) -> Self {
        Self {
            timestamp: Some(Utc::now()),
            mediq_version: Some(env!("CARGO_PKG_VERSION").to_string()),
            command_line: Some(std::env::args().collect()),
            processing_time_ms: Some(processing_time_ms),
            mediq_env_vars: collect_mediq_env_vars(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct InputProcessing {
    pub inputs: Vec<String>,
    pub strict_mode: bool,
}

pub fn load_or_create_metadata(path: &Path) -> Result<MediqMetadata> {
    if !path.exists() {
        return Ok(MediqMetadata::default());
    }

    let content = fs::read_to_string(path)?;
    match toml::from_str::<MediqMetadata>(&content) {
        Ok(metadata) => Ok(metadata),
        Err(e) => {
            let colored_error = crate::color_utils::colors::warning_level(&e.to_string());
            warn!(
                "{}Dropping existing metadata from {}:\n{}",
                crate::color_utils::symbols::warning(),
                path.display(),
                colored_error
            );
            Ok(MediqMetadata::default())
        }
    }
}

pub fn save_metadata(metadata: &MediqMetadata, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let toml_content = toml::to_string_pretty(metadata).map_err(|e| {
        log::debug!("Metadata that failed to serialize: {metadata:#?}");
        anyhow::anyhow!("Failed to serialize metadata to TOML: {e}")
    })?;

    fs::write(path, toml_content)?;
    Ok(())
}

/// `<dir>/<stem>.mediq.toml`, where dir is `output_dir` if given, else the
/// input's own directory
pub fn get_metadata_path(input_path: &Path, output_dir: Option<&str>) -> Result<PathBuf> {
    let input_stem = input_path
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| anyhow::anyhow!("Invalid input filename: {}", input_path.display()))?;

    let metadata_filename = format!("{input_stem}.mediq.toml");

    let metadata_path = if let Some(output_dir) = output_dir {
        Path::new(output_dir).join(metadata_filename)
    } else {
        input_path
            .parent()
            .unwrap_or(Path::new("."))
            .join(metadata_filename)
    };

    Ok(metadata_path)
}

pub fn collect_mediq_env_vars() -> Option<HashMap<String, String>> {
    let vars: HashMap<String, String> = std::env::vars()
        .filter(|(key, value)| key.starts_with("MEDIQ_") && !value.is_empty())
        .collect();

    if vars.is_empty() {
        None
    } else {
        Some(vars)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toml_structure() {
        let metadata = MediqMetadata {
            analyze: Some(ToolSections {
                core: Some(
                    toml::toml! {
                        Brightness = 128.0
                        Contrast = 41.5
                        verdict = "warning"
                    }
                    .into(),
                ),
                config: Some(
                    toml::toml! {
                        json = false
                    }
                    .into(),
                ),
                execution: Some(ExecutionContext {
                    timestamp: Some(Utc::now()),
                    mediq_version: Some("0.1.0".to_string()),
                    command_line: Some(vec!["analyze".to_string(), "scan.png".to_string()]),
                    processing_time_ms: Some(3.5),
                    mediq_env_vars: None,
                }),
                input: Some(InputProcessing {
                    inputs: vec!["scan.png".to_string()],
                    strict_mode: true,
                }),
            }),
            ..Default::default()
        };

        let toml_output = toml::to_string_pretty(&metadata).unwrap();
        assert!(toml_output.contains("[analyze]"));
        assert!(toml_output.contains("Brightness = 128.0"));

        let parsed: MediqMetadata = toml::from_str(&toml_output).unwrap();
        let analyze = parsed.analyze.unwrap();
        assert!(analyze.config.is_some());
        assert!(analyze.execution.is_some());
        assert!(parsed.process.is_none());
    }

    #[test]
    fn test_get_metadata_path() {
        let input_path = Path::new("/path/to/00000001_000.png");
        let metadata_path = get_metadata_path(input_path, None).unwrap();
        assert_eq!(
            metadata_path,
            Path::new("/path/to/00000001_000.mediq.toml")
        );

        let with_output = get_metadata_path(input_path, Some("/output")).unwrap();
        assert_eq!(with_output, Path::new("/output/00000001_000.mediq.toml"));
    }

    #[test]
    fn test_corrupt_sidecar_is_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan.mediq.toml");
        fs::write(&path, "this is = = not toml").unwrap();

        let metadata = load_or_create_metadata(&path).unwrap();
        assert!(metadata.analyze.is_none());
    }

    #[test]
    fn test_save_then_load_keeps_other_sections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("out.mediq.toml");

        let mut metadata = MediqMetadata::default();
        metadata.process = Some(ToolSections {
            core: Some(toml::toml! { joined_rows = 3 }.into()),
            ..Default::default()
        });
        save_metadata(&metadata, &path).unwrap();

        let loaded = load_or_create_metadata(&path).unwrap();
        let core = loaded.process.unwrap().core.unwrap();
        assert_eq!(core["joined_rows"].as_integer(), Some(3));
    }
}
