//! Sidecar placement shared by all tools.
//!
//! Metadata lands next to the input by default, or in the global
//! `--output-dir` when one is given.

use anyhow::Result;
use log::debug;
use std::path::{Path, PathBuf};

use crate::config::ToolConfig;
use crate::run_metadata::{get_metadata_path, load_or_create_metadata, save_metadata, ToolSections};

pub struct OutputManager<'a> {
    config: &'a dyn ToolConfig,
    input_path: &'a Path,
}

impl<'a> OutputManager<'a> {
    pub fn new(config: &'a dyn ToolConfig, input_path: &'a Path) -> Self {
        Self { config, input_path }
    }

    pub fn metadata_path(&self) -> Result<PathBuf> {
        get_metadata_path(self.input_path, self.config.base().output_dir.as_deref())
    }

    /// Merge this tool's sections into the sidecar. Returns the sidecar path,
    /// or `None` when metadata is disabled.
    pub fn save_tool_metadata(&self, sections: ToolSections) -> Result<Option<PathBuf>> {
        if self.config.base().skip_metadata {
            return Ok(None);
        }

        let metadata_path = self.metadata_path()?;
        let mut metadata = load_or_create_metadata(&metadata_path)?;

        match self.config.tool_name() {
            "analyze" => metadata.analyze = Some(sections),
            "process" => metadata.process = Some(sections),
            other => return Err(anyhow::anyhow!("Unknown tool name: {other}")),
        }

        save_metadata(&metadata, &metadata_path)?;
        debug!("📋 Saved metadata to: {}", metadata_path.display());

        Ok(Some(metadata_path))
    }
}
