//! deskgauge monitor library
//!
//! Samples host telemetry (memory utilization, CPU temperature and network
//! throughput) on independent cadences and turns memory readings into the
//! wave-filled gauge polygon of the desktop panel.

pub mod bus;
pub mod config;
pub mod error;
pub mod gauge;
pub mod metric;
pub mod panel;
pub mod rate;
pub mod sampler;
pub mod source;

// Re-export commonly used types
pub use bus::{SampleBus, SampleHandler, SampleReceiver};
pub use config::MonitorConfig;
pub use error::{ConfigError, MonitorError, Result, SourceError};
pub use gauge::{build_gauge_path, GaugeGeometry, GaugePath, GaugePathBuilder, Point};
pub use metric::{MetricKind, Sample, SamplingSchedule};
pub use panel::{PanelState, TemperatureLevel};
pub use rate::format_rate;
pub use sampler::{MetricSampler, StreamState, StreamStatus};
pub use source::{MetricSource, MockSource, NetworkCounters, SysinfoSource};
