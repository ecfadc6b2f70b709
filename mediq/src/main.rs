use clap::Parser;
use env_logger::Builder;
use env_logger::Env;
use log::{error, info, warn, Level};
use std::io::Write;

use mediq::analysis::run_analysis;
use mediq::batch_pipeline::run_pipeline;
use mediq::color_utils::{colors, colors_enabled, init_color_config, symbols};
use mediq::config::{
    AnalyzeCommand, AnalyzeConfig, GlobalArgs, InsightsCommand, InsightsConfig, PipelineConfig,
    ProcessCommand,
};
use mediq::insights::run_insights;
use mediq::report::{render_report, render_summary, ReportStyle};
use mediq::MediqError;

#[derive(clap::Subcommand)]
pub enum Commands {
    /// Score and classify individual images
    Analyze(AnalyzeCommand),

    /// Score an image directory and merge with patient metadata
    Process(ProcessCommand),

    /// Summarize the merged dataset and draw charts
    Insights(InsightsCommand),

    /// Show version information
    Version,
}

#[derive(Parser)]
#[command(name = "mediq")]
#[command(about = "Medical image quality scoring toolkit")]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Option<Commands>,
}

fn get_log_level_from_verbosity(
    verbosity: clap_verbosity_flag::Verbosity<clap_verbosity_flag::ErrorLevel>,
) -> log::LevelFilter {
    let base_level = verbosity.log_level_filter();
    let adjusted_level = match base_level {
        log::LevelFilter::Off => log::LevelFilter::Off, // -qq -> OFF
        log::LevelFilter::Error => log::LevelFilter::Warn, // default -> WARN
        log::LevelFilter::Warn => log::LevelFilter::Info, // -v -> INFO
        log::LevelFilter::Info => log::LevelFilter::Debug, // -vv -> DEBUG
        log::LevelFilter::Debug => log::LevelFilter::Trace, // -vvv -> TRACE
        log::LevelFilter::Trace => log::LevelFilter::Trace,
    };

    // clap-verbosity-flag reports a single -q as Off, same as -qq
    if verbosity.is_silent() {
        log::LevelFilter::Error
    } else {
        adjusted_level
    }
}

fn init_logging(global: &GlobalArgs) {
    // If user didn't pass -v/-q and RUST_LOG is set, honor the env var.
    let use_env = !global.verbosity.is_present() && std::env::var_os("RUST_LOG").is_some();

    let mut logger = if use_env {
        Builder::from_env(Env::default())
    } else {
        let mut b = Builder::new();
        b.filter_level(get_log_level_from_verbosity(global.verbosity.clone()));
        b
    };

    logger
        .format(|buf, record| {
            let level_str = match record.level() {
                Level::Error => colors::error_level("ERROR"),
                Level::Warn => colors::warning_level("WARN"),
                Level::Info => colors::info_level("INFO"),
                Level::Debug => colors::debug_level("DEBUG"),
                Level::Trace => colors::trace_level("TRACE"),
            };
            writeln!(buf, "[{}] {}", level_str, record.args())
        })
        .init();
}

fn describe_sources(sources: &[String]) -> String {
    if sources.len() == 1 {
        sources[0].clone()
    } else {
        format!("{} inputs", sources.len())
    }
}

fn analyze(global: &GlobalArgs, cmd: &AnalyzeCommand) -> i32 {
    info!(
        "{}Quality analysis: {}",
        symbols::analysis_start(),
        describe_sources(&cmd.sources)
    );

    let config = AnalyzeConfig::from_args(global.clone(), cmd.clone());
    let outcome = match run_analysis(&config) {
        Ok(outcome) => outcome,
        Err(e) => {
            error!("{}Analysis failed: {e:#}", symbols::operation_failed());
            return 1;
        }
    };

    let style = ReportStyle {
        color: colors_enabled(),
    };
    for report in &outcome.reports {
        if config.json {
            match serde_json::to_string(report) {
                Ok(line) => println!("{line}"),
                Err(e) => error!("Failed to serialize {}: {e}", report.image),
            }
        } else {
            print!(
                "{}",
                render_report(&report.image, &report.metrics, report.verdict, style)
            );
        }
    }

    if outcome.reports.is_empty() {
        error!(
            "{}No images could be analyzed ({} failed)",
            symbols::operation_failed(),
            outcome.failed.len()
        );
        1
    } else if outcome.failed.is_empty() {
        info!(
            "{}Analyzed {} images",
            symbols::completed_successfully(),
            outcome.reports.len()
        );
        0
    } else {
        warn!(
            "{}Analyzed {}/{} images",
            symbols::completed_partially_successfully(),
            outcome.reports.len(),
            outcome.total()
        );
        0
    }
}

fn process(global: &GlobalArgs, cmd: &ProcessCommand) -> i32 {
    let config = PipelineConfig::from_args(global.clone(), cmd.clone());
    info!(
        "{}Batch processing: {} + {}",
        symbols::analysis_start(),
        config.image_dir.display(),
        config.metadata_file.display()
    );

    match run_pipeline(&config) {
        Ok(summary) => {
            info!(
                "{}Wrote {} joined rows to {} ({} of {} images scored)",
                symbols::completed_successfully(),
                summary.joined_rows,
                summary.output_file.display(),
                summary.images_processed,
                summary.images_found
            );
            if summary.joined_rows == 0 {
                warn!("{}No image matched a metadata row", symbols::warning());
            }
            0
        }
        Err(e) => {
            if let Some(MediqError::MissingInput { path }) = e.downcast_ref::<MediqError>() {
                error!(
                    "{}Input not found: {}",
                    symbols::operation_failed(),
                    path.display()
                );
            } else {
                error!("{}Processing failed: {e:#}", symbols::operation_failed());
            }
            1
        }
    }
}

fn insights(global: &GlobalArgs, cmd: &InsightsCommand) -> i32 {
    let config = InsightsConfig::from_args(global.clone(), cmd.clone());
    info!(
        "{}Dataset insights: {}",
        symbols::statistics(),
        config.data_file.display()
    );

    match run_insights(&config) {
        Ok(outcome) => {
            let style = ReportStyle {
                color: colors_enabled(),
            };
            print!("{}", render_summary(&outcome.summary, style));
            println!("  Charts");
            println!("    {}", outcome.histogram_path.display());
            println!("    {}", outcome.scatter_path.display());
            0
        }
        Err(e) => {
            if let Some(MediqError::MissingInput { .. }) = e.downcast_ref::<MediqError>() {
                eprintln!("Data not found. Please run `mediq process` first.");
            } else {
                error!("{}Insights failed: {e:#}", symbols::operation_failed());
            }
            1
        }
    }
}

fn main() {
    let cli = Cli::parse();

    init_color_config(cli.global.no_color);
    init_logging(&cli.global);

    let exit_code = match &cli.command {
        Some(Commands::Analyze(cmd)) => analyze(&cli.global, cmd),
        Some(Commands::Process(cmd)) => process(&cli.global, cmd),
        Some(Commands::Insights(cmd)) => insights(&cli.global, cmd),
        Some(Commands::Version) => {
            println!("mediq v{}", env!("CARGO_PKG_VERSION"));
            0
        }
        None => {
            // Show help if no command specified
            use clap::CommandFactory;
            let mut cmd = Cli::command();
            if let Err(e) = cmd.print_help() {
                eprintln!("{e}");
            }
            0
        }
    };

    std::process::exit(exit_code);
}
