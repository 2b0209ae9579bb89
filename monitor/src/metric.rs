//! Metric kinds, samples, and sampling schedules

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::rate::format_rate;

/// The fixed set of metric streams the panel reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    MemoryPercent,
    CpuTemperature,
    NetUploadRate,
    NetDownloadRate,
}

impl MetricKind {
    /// Every kind, in panel order
    pub const ALL: [MetricKind; 4] = [
        MetricKind::MemoryPercent,
        MetricKind::CpuTemperature,
        MetricKind::NetUploadRate,
        MetricKind::NetDownloadRate,
    ];

    /// Stable snake_case name, used in logs and configuration
    pub fn name(&self) -> &'static str {
        match self {
            MetricKind::MemoryPercent => "memory_percent",
            MetricKind::CpuTemperature => "cpu_temperature",
            MetricKind::NetUploadRate => "net_upload_rate",
            MetricKind::NetDownloadRate => "net_download_rate",
        }
    }

    /// Unit implied by the kind
    pub fn unit(&self) -> &'static str {
        match self {
            MetricKind::MemoryPercent => "%",
            MetricKind::CpuTemperature => "℃",
            MetricKind::NetUploadRate | MetricKind::NetDownloadRate => "B/s",
        }
    }

    /// Whether samples of this kind are computed from counter deltas
    pub fn is_throughput(&self) -> bool {
        matches!(self, MetricKind::NetUploadRate | MetricKind::NetDownloadRate)
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for MetricKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MetricKind::ALL
            .into_iter()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| format!("unknown metric kind: {}", s))
    }
}

/// One timestamped reading of a metric
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Which stream produced the reading
    pub kind: MetricKind,

    /// Normalized value; the unit is implied by `kind`
    pub value: f64,

    /// When the reading was taken
    pub taken_at: DateTime<Utc>,
}

impl Sample {
    /// Create a sample stamped with the current time
    pub fn new(kind: MetricKind, value: f64) -> Self {
        Self {
            kind,
            value,
            taken_at: Utc::now(),
        }
    }
}

impl fmt::Display for Sample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            MetricKind::MemoryPercent | MetricKind::CpuTemperature => {
                write!(f, "{}{}", self.value, self.kind.unit())
            }
            MetricKind::NetUploadRate | MetricKind::NetDownloadRate => {
                f.write_str(&format_rate(self.value))
            }
        }
    }
}

/// How often one stream is sampled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplingSchedule {
    pub kind: MetricKind,
    pub interval: Duration,
}

impl SamplingSchedule {
    pub fn new(kind: MetricKind, interval: Duration) -> Self {
        Self { kind, interval }
    }

    /// Reference cadences of the desktop panel
    pub fn defaults() -> Vec<SamplingSchedule> {
        vec![
            SamplingSchedule::new(MetricKind::MemoryPercent, Duration::from_secs(5)),
            SamplingSchedule::new(MetricKind::CpuTemperature, Duration::from_secs(30)),
            SamplingSchedule::new(MetricKind::NetUploadRate, Duration::from_secs(2)),
            SamplingSchedule::new(MetricKind::NetDownloadRate, Duration::from_secs(2)),
        ]
    }
}
