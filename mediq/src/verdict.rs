//! Accept / warn / reject classification of a metric set.

use crate::quality_metrics::MetricSet;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Below this Laplacian variance a scan is too blurry to read
pub const REJECT_SHARPNESS: f64 = 100.0;
/// Below this intensity standard deviation a scan is too flat to read
pub const REJECT_CONTRAST: f64 = 20.0;
/// Below this Laplacian variance a scan is usable but suspect
pub const WARN_SHARPNESS: f64 = 500.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Reject,
    Warning,
    Accept,
}

impl Verdict {
    pub fn label(&self) -> &'static str {
        match self {
            Verdict::Reject => "REJECT",
            Verdict::Warning => "WARNING",
            Verdict::Accept => "ACCEPT",
        }
    }

    pub fn headline(&self) -> &'static str {
        match self {
            Verdict::Reject => "Image quality too low for reliable diagnosis.",
            Verdict::Warning => "Marginal quality. Check for motion blur.",
            Verdict::Accept => "High quality scan suitable for CAD analysis.",
        }
    }

    pub fn all() -> [Verdict; 3] {
        [Verdict::Reject, Verdict::Warning, Verdict::Accept]
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.label(), self.headline())
    }
}

/// First matching rule wins: reject, then warn, otherwise accept
pub fn classify(metrics: &MetricSet) -> Verdict {
    if metrics.sharpness < REJECT_SHARPNESS || metrics.contrast < REJECT_CONTRAST {
        Verdict::Reject
    } else if metrics.sharpness < WARN_SHARPNESS {
        Verdict::Warning
    } else {
        Verdict::Accept
    }
}
