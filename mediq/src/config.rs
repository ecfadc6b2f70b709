//! Configuration layer providing clean separation between CLI arguments and internal configurations.
//!
//! - `GlobalArgs` and the `*Command` structs are what clap parses
//! - `BaseConfig` holds options shared by every tool
//! - `AnalyzeConfig`, `PipelineConfig` and `InsightsConfig` are the explicit
//!   configuration values handed to the processing entry points
//!
//! Nothing here reads process-wide state; every path the tools touch comes in
//! through these structs.

use clap::Parser;
use clap_verbosity_flag::Verbosity;
use serde::Serialize;
use std::path::{Path, PathBuf};

pub const DEFAULT_IMAGE_DIR: &str = "data/raw_images";
pub const DEFAULT_METADATA_FILE: &str = "data/Data_Entry_2017.csv";
pub const DEFAULT_OUTPUT_FILE: &str = "data/final_data.csv";

/// Parse a strictly positive integer
pub fn parse_positive(s: &str) -> Result<usize, String> {
    let val = s
        .parse::<usize>()
        .map_err(|_| format!("Invalid number: '{s}'"))?;
    if val == 0 {
        return Err("Must be at least 1".to_string());
    }
    Ok(val)
}

/// Parse a chart size like "800x600"
pub fn parse_chart_size(s: &str) -> Result<(u32, u32), String> {
    let (w, h) = s
        .split_once('x')
        .ok_or_else(|| "Size must be in format 'WIDTHxHEIGHT' (e.g., '800x600')".to_string())?;
    let parse = |part: &str| {
        part.trim()
            .parse::<u32>()
            .map_err(|_| format!("Invalid size component: '{part}'"))
    };
    let (w, h) = (parse(w)?, parse(h)?);
    if w < 100 || h < 100 {
        return Err(format!("Chart must be at least 100x100, got {w}x{h}"));
    }
    Ok((w, h))
}

/// Global CLI arguments that apply to all mediq commands
#[derive(Parser, Debug, Clone)]
pub struct GlobalArgs {
    /// Global output directory (overrides default placement next to input)
    #[arg(long, global = true)]
    pub output_dir: Option<String>,

    /// Create metadata output file(s)
    #[arg(long, global = true)]
    pub metadata: bool,

    /// Verbosity level (-q/--quiet, -v/-vv/-vvv/-vvvv for info/debug/trace)
    #[command(flatten)]
    pub verbosity: Verbosity,

    /// Use permissive mode for input validation (warn instead of error for unsupported files)
    #[arg(long, global = true)]
    pub permissive: bool,

    /// Disable colored output (also respects NO_COLOR and MEDIQ_NO_COLOR env vars)
    #[arg(long, global = true)]
    pub no_color: bool,
}

/// Configuration common to all tools
#[derive(Debug, Clone, Serialize)]
pub struct BaseConfig {
    /// Optional output directory override
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<String>,
    /// Whether to skip metadata generation
    pub skip_metadata: bool,
    /// Use strict mode (fail if files are not found or are unsupported). Opposite of `--permissive`.
    pub strict: bool,
}

impl From<GlobalArgs> for BaseConfig {
    fn from(global: GlobalArgs) -> Self {
        Self {
            output_dir: global.output_dir,
            skip_metadata: !global.metadata, // CLI uses metadata flag, internal uses skip_metadata
            strict: !global.permissive,      // CLI uses permissive, internal uses strict
        }
    }
}

/// Configs that carry a `BaseConfig`
pub trait ToolConfig {
    fn base(&self) -> &BaseConfig;

    /// Name used for metadata sections (e.g., "analyze", "process")
    fn tool_name(&self) -> &'static str;
}

/// CLI command for single-image analysis (only command-specific arguments)
#[derive(Parser, Debug, Clone)]
pub struct AnalyzeCommand {
    /// Path(s) to input images or directories. Supports glob patterns like *.png
    #[arg(value_name = "IMAGES_OR_DIRS", required = true)]
    pub sources: Vec<String>,

    /// Print one JSON object per image instead of the text report
    #[arg(long)]
    pub json: bool,
}

/// CLI command for the batch metrics + metadata merge
#[derive(Parser, Debug, Clone)]
pub struct ProcessCommand {
    /// Directory of images to score
    #[arg(long, default_value = DEFAULT_IMAGE_DIR)]
    pub image_dir: String,

    /// Patient metadata CSV with an 'Image Index' column
    #[arg(long = "metadata-file", default_value = DEFAULT_METADATA_FILE)]
    pub metadata_file: String,

    /// Where to write the joined table
    #[arg(short, long, default_value = DEFAULT_OUTPUT_FILE)]
    pub output: String,
}

/// CLI command for dataset insights and charts
#[derive(Parser, Debug, Clone)]
pub struct InsightsCommand {
    /// Joined dataset produced by `mediq process`
    #[arg(long, default_value = DEFAULT_OUTPUT_FILE)]
    pub data: String,

    /// Number of bins in the sharpness histogram
    #[arg(long, default_value = "20", value_parser = parse_positive)]
    pub bins: usize,

    /// Number of records to preview
    #[arg(long, default_value = "5")]
    pub head: usize,

    /// Chart size in pixels
    #[arg(long, default_value = "800x600", value_parser = parse_chart_size)]
    pub chart_size: (u32, u32),
}

/// Internal configuration for `analyze`
#[derive(Debug, Clone, Serialize)]
pub struct AnalyzeConfig {
    #[serde(skip)]
    pub base: BaseConfig,
    pub sources: Vec<String>,
    pub json: bool,
}

impl AnalyzeConfig {
    pub fn from_args(global: GlobalArgs, cmd: AnalyzeCommand) -> Self {
        Self {
            base: global.into(),
            sources: cmd.sources,
            json: cmd.json,
        }
    }
}

/// Internal configuration for the batch pipeline.
///
/// Replaces hard-coded folder paths: every location the pipeline reads or
/// writes is named here.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineConfig {
    #[serde(skip)]
    pub base: BaseConfig,
    pub image_dir: PathBuf,
    pub metadata_file: PathBuf,
    pub output_file: PathBuf,
}

impl PipelineConfig {
    pub fn new(
        image_dir: impl Into<PathBuf>,
        metadata_file: impl Into<PathBuf>,
        output_file: impl Into<PathBuf>,
    ) -> Self {
        Self {
            base: BaseConfig {
                output_dir: None,
                skip_metadata: true,
                strict: false,
            },
            image_dir: image_dir.into(),
            metadata_file: metadata_file.into(),
            output_file: output_file.into(),
        }
    }

    /// `--output-dir` relocates the output file, keeping its file name
    pub fn from_args(global: GlobalArgs, cmd: ProcessCommand) -> Self {
        let base: BaseConfig = global.into();
        let mut output_file = PathBuf::from(&cmd.output);
        if let Some(dir) = &base.output_dir {
            let name = output_file
                .file_name()
                .map(|n| n.to_os_string())
                .unwrap_or_else(|| "final_data.csv".into());
            output_file = Path::new(dir).join(name);
        }

        Self {
            base,
            image_dir: PathBuf::from(cmd.image_dir),
            metadata_file: PathBuf::from(cmd.metadata_file),
            output_file,
        }
    }
}

/// Internal configuration for `insights`
#[derive(Debug, Clone, Serialize)]
pub struct InsightsConfig {
    #[serde(skip)]
    pub base: BaseConfig,
    pub data_file: PathBuf,
    /// Charts go to `--output-dir`, else next to the data file
    pub chart_dir: PathBuf,
    pub bins: usize,
    pub preview_rows: usize,
    pub chart_size: (u32, u32),
}

impl InsightsConfig {
    pub fn from_args(global: GlobalArgs, cmd: InsightsCommand) -> Self {
        let base: BaseConfig = global.into();
        let data_file = PathBuf::from(&cmd.data);
        let chart_dir = match &base.output_dir {
            Some(dir) => PathBuf::from(dir),
            None => data_file
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from(".")),
        };

        Self {
            base,
            data_file,
            chart_dir,
            bins: cmd.bins,
            preview_rows: cmd.head,
            chart_size: cmd.chart_size,
        }
    }
}

impl ToolConfig for AnalyzeConfig {
    fn base(&self) -> &BaseConfig {
        &self.base
    }

    fn tool_name(&self) -> &'static str {
        "analyze"
    }
}

impl ToolConfig for PipelineConfig {
    fn base(&self) -> &BaseConfig {
        &self.base
    }

    fn tool_name(&self) -> &'static str {
        "process"
    }
}
