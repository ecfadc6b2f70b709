//! MedIQ: quality scoring for grayscale medical images.
//!
//! The metric engine (`quality_metrics`) and classifier (`verdict`) are pure
//! functions; the remaining modules wire them into the `mediq` command line.

pub mod analysis;
pub mod batch_pipeline;
pub mod chart_rendering;
pub mod color_utils;
pub mod config;
pub mod error;
pub mod image_input;
pub mod insights;
pub mod output_manager;
pub mod patient_metadata;
pub mod quality_metrics;
pub mod report;
pub mod run_metadata;
pub mod verdict;

pub use error::MediqError;
pub use quality_metrics::{compute, MetricSet};
pub use verdict::{classify, Verdict};
