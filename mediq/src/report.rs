//! Text rendering of a single image's quality diagnostics.
//!
//! Rendering is a pure function of its inputs; whether to colorize is passed
//! in rather than read from the terminal state.

use crate::color_utils::maybe_color;
use crate::insights::DatasetSummary;
use crate::quality_metrics::MetricSet;
use crate::verdict::Verdict;
use colored::Colorize;
use serde::Serialize;
use std::fmt::Write;

#[derive(Clone, Copy, Debug, Default)]
pub struct ReportStyle {
    pub color: bool,
}

/// One analyzed image, as emitted by `analyze --json`
#[derive(Debug, Clone, Serialize)]
pub struct ImageReport {
    pub image: String,
    #[serde(flatten)]
    pub metrics: MetricSet,
    pub verdict: Verdict,
}

struct MetricLine {
    name: &'static str,
    value: f64,
    help: &'static str,
}

fn metric_lines(metrics: &MetricSet) -> [MetricLine; 4] {
    [
        MetricLine {
            name: "Brightness",
            value: metrics.brightness,
            help: "Avg pixel intensity (target: 100-150)",
        },
        MetricLine {
            name: "Contrast",
            value: metrics.contrast,
            help: "Std dev of intensity (target: >40)",
        },
        MetricLine {
            name: "Sharpness",
            value: metrics.sharpness,
            help: "Laplacian variance, <500 usually implies blur",
        },
        MetricLine {
            name: "SNR",
            value: metrics.snr,
            help: "Signal/noise, higher is clearer",
        },
    ]
}

fn verdict_line(verdict: Verdict, style: ReportStyle) -> String {
    let text = verdict.to_string();
    match verdict {
        Verdict::Reject => maybe_color(&text, style.color, |s| s.red().bold()),
        Verdict::Warning => maybe_color(&text, style.color, |s| s.yellow().bold()),
        Verdict::Accept => maybe_color(&text, style.color, |s| s.green().bold()),
    }
}

/// Render the diagnostic block for one image
pub fn render_report(image: &str, metrics: &MetricSet, verdict: Verdict, style: ReportStyle) -> String {
    let mut out = String::new();
    let title = maybe_color(image, style.color, |s| s.bold());
    let _ = writeln!(out, "{title}");
    let _ = writeln!(out, "  Quality diagnostics");
    for line in metric_lines(metrics) {
        let _ = writeln!(
            out,
            "    {:<11}{:>12.2}   {}",
            line.name,
            line.value,
            maybe_color(line.help, style.color, |s| s.bright_black())
        );
    }
    let _ = writeln!(out, "  Verdict: {}", verdict_line(verdict, style));
    out
}

/// Render the dataset overview printed by `insights`
pub fn render_summary(summary: &DatasetSummary, style: ReportStyle) -> String {
    let mut out = String::new();
    let title = maybe_color("Dataset overview", style.color, |s| s.bold());
    let _ = writeln!(out, "{title}");
    let _ = writeln!(out, "  Records: {}", summary.record_count);

    if let Some(means) = &summary.means {
        let _ = writeln!(out, "  Mean metrics");
        for line in metric_lines(&MetricSet {
            brightness: means.brightness,
            contrast: means.contrast,
            sharpness: means.sharpness,
            snr: means.snr,
        }) {
            let _ = writeln!(out, "    {:<11}{:>12.2}", line.name, line.value);
        }
    }

    let _ = writeln!(out, "  Verdicts");
    for verdict in Verdict::all() {
        let count = summary
            .verdict_counts
            .get(verdict.label())
            .copied()
            .unwrap_or(0);
        let _ = writeln!(out, "    {:<11}{:>12}", verdict.label(), count);
    }

    if !summary.preview.is_empty() {
        let _ = writeln!(out, "  First {} rows", summary.preview.len());
        for row in &summary.preview {
            let _ = writeln!(
                out,
                "    {:<20} {:>8.2} {:>8.2} {:>10.2} {:>6.2}  {} | {} | {}",
                row.image_index,
                row.brightness,
                row.contrast,
                row.sharpness,
                row.snr,
                row.finding_labels,
                row.patient_age,
                row.patient_gender
            );
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch_pipeline::JoinedRecord;

    fn sample() -> MetricSet {
        MetricSet {
            brightness: 128.0,
            contrast: 0.0,
            sharpness: 0.0,
            snr: 0.0,
        }
    }

    #[test]
    fn test_plain_report_layout() {
        let text = render_report("flat.png", &sample(), Verdict::Reject, ReportStyle::default());
        let lines: Vec<_> = text.lines().collect();

        assert_eq!(lines[0], "flat.png");
        assert_eq!(lines.len(), 7);
        assert!(lines[2].contains("Brightness") && lines[2].contains("128.00"));
        assert!(lines[5].contains("SNR") && lines[5].contains("0.00"));
        assert_eq!(
            lines[6],
            "  Verdict: REJECT: Image quality too low for reliable diagnosis."
        );
    }

    #[test]
    fn test_plain_report_has_no_escape_codes() {
        let text = render_report("a.png", &sample(), Verdict::Accept, ReportStyle { color: false });
        assert!(!text.contains('\u{1b}'));
    }

    #[test]
    fn test_json_report_is_flat() {
        let report = ImageReport {
            image: "a.png".to_string(),
            metrics: sample(),
            verdict: Verdict::Reject,
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["image"], "a.png");
        assert_eq!(json["Brightness"], 128.0);
        assert_eq!(json["verdict"], "reject");
    }

    #[test]
    fn test_summary_rendering() {
        let row = JoinedRecord {
            image_index: "00000001_000.png".to_string(),
            brightness: 120.0,
            contrast: 50.0,
            sharpness: 900.0,
            snr: 2.4,
            finding_labels: "Cardiomegaly".to_string(),
            patient_age: "58".to_string(),
            patient_gender: "M".to_string(),
        };
        let summary = DatasetSummary::from_records(&[row], 5);
        let text = render_summary(&summary, ReportStyle::default());

        assert!(text.contains("Records: 1"));
        assert!(text.contains("Sharpness") && text.contains("900.00"));
        let has_row = |expected: [&str; 2]| {
            text.lines()
                .any(|l| l.split_whitespace().collect::<Vec<_>>() == expected)
        };
        assert!(has_row(["ACCEPT", "1"]));
        assert!(has_row(["REJECT", "0"]));
        assert!(text.contains("Cardiomegaly | 58 | M"));
    }

    #[test]
    fn test_empty_summary_has_no_means() {
        let summary = DatasetSummary::from_records(&[], 5);
        let text = render_summary(&summary, ReportStyle::default());
        assert!(text.contains("Records: 0"));
        assert!(!text.contains("Mean metrics"));
        assert!(!text.contains("First"));
    }
}
