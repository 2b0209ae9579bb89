//! Headless panel model
//!
//! Holds what the gadget would show: the latest reading of each kind, the
//! memory gauge polygon and the temperature level. A memory sample rebuilds
//! the gauge on the spot.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::gauge::{GaugePath, GaugePathBuilder};
use crate::metric::{MetricKind, Sample};
use crate::rate::format_rate;

/// Temperature band used to colour the CPU label
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemperatureLevel {
    Normal,
    Warm,
    Hot,
}

impl TemperatureLevel {
    pub const WARM_CELSIUS: f64 = 45.0;
    pub const HOT_CELSIUS: f64 = 65.0;

    pub fn from_celsius(celsius: f64) -> Self {
        if celsius < Self::WARM_CELSIUS {
            TemperatureLevel::Normal
        } else if celsius < Self::HOT_CELSIUS {
            TemperatureLevel::Warm
        } else {
            TemperatureLevel::Hot
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TemperatureLevel::Normal => "normal",
            TemperatureLevel::Warm => "warm",
            TemperatureLevel::Hot => "hot",
        }
    }
}

impl fmt::Display for TemperatureLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Latest state of every panel element
#[derive(Debug, Clone, Default)]
pub struct PanelState {
    builder: GaugePathBuilder,
    latest: HashMap<MetricKind, Sample>,
    gauge: Option<GaugePath>,
    temperature_level: Option<TemperatureLevel>,
}

impl PanelState {
    pub fn new(builder: GaugePathBuilder) -> Self {
        Self {
            builder,
            ..Self::default()
        }
    }

    /// Take in one sample, replacing the previous reading of its kind
    pub fn apply(&mut self, sample: &Sample) {
        match sample.kind {
            MetricKind::MemoryPercent => {
                let percent = sample.value.clamp(0.0, 100.0) as u8;
                self.gauge = Some(self.builder.build(percent));
            }
            MetricKind::CpuTemperature => {
                self.temperature_level = Some(TemperatureLevel::from_celsius(sample.value));
            }
            MetricKind::NetUploadRate | MetricKind::NetDownloadRate => {}
        }
        self.latest.insert(sample.kind, sample.clone());
    }

    pub fn latest(&self, kind: MetricKind) -> Option<&Sample> {
        self.latest.get(&kind)
    }

    /// Gauge for the most recent memory reading
    pub fn gauge(&self) -> Option<&GaugePath> {
        self.gauge.as_ref()
    }

    pub fn temperature_level(&self) -> Option<TemperatureLevel> {
        self.temperature_level
    }

    /// Formatted rate for a throughput kind, if one has been reported
    pub fn rate_label(&self, kind: MetricKind) -> Option<String> {
        self.latest(kind)
            .filter(|sample| sample.kind.is_throughput())
            .map(|sample| format_rate(sample.value))
    }

    /// One-line status, `--` for kinds not reported yet
    pub fn summary(&self) -> String {
        let memory = self
            .latest(MetricKind::MemoryPercent)
            .map_or_else(missing, |sample| sample.to_string());
        let cpu = match (self.latest(MetricKind::CpuTemperature), self.temperature_level) {
            (Some(sample), Some(level)) => format!("{} ({})", sample, level),
            _ => missing(),
        };
        let up = self.rate_label(MetricKind::NetUploadRate).unwrap_or_else(missing);
        let down = self.rate_label(MetricKind::NetDownloadRate).unwrap_or_else(missing);

        format!("mem {} | cpu {} | up {} | down {}", memory, cpu, up, down)
    }
}

fn missing() -> String {
    "--".to_string()
}
