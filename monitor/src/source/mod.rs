//! Metric sources
//!
//! The sampler never talks to the operating system directly. Every reading
//! goes through a [`MetricSource`], which is free to block: the sampler runs
//! each call on the blocking thread pool so a slow sensor only delays its own
//! stream.

use serde::{Deserialize, Serialize};

use crate::error::SourceResult;
use crate::metric::MetricKind;

pub mod mock;
mod system;

pub use mock::MockSource;
pub use system::SysinfoSource;

/// Cumulative network byte counters, summed over all interfaces
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkCounters {
    pub bytes_sent: u64,
    pub bytes_received: u64,
}

impl NetworkCounters {
    pub fn new(bytes_sent: u64, bytes_received: u64) -> Self {
        Self { bytes_sent, bytes_received }
    }

    /// The counter a throughput stream of `kind` tracks
    pub fn counter_for(&self, kind: MetricKind) -> u64 {
        match kind {
            MetricKind::NetUploadRate => self.bytes_sent,
            _ => self.bytes_received,
        }
    }
}

/// A provider of raw host readings
pub trait MetricSource: Send + Sync + 'static {
    /// Check that the backend for `kind` can be used at all.
    ///
    /// Called once when a stream starts; an error here is fatal for that
    /// stream only.
    fn probe(&self, _kind: MetricKind) -> SourceResult<()> {
        Ok(())
    }

    /// Memory utilization in percent, unrounded
    fn read_memory_percent(&self) -> SourceResult<f64>;

    /// CPU temperature in degrees Celsius, `None` when no CPU sensor exists
    fn read_cpu_temperature(&self) -> SourceResult<Option<f64>>;

    /// Cumulative bytes sent and received since boot
    fn read_network_counters(&self) -> SourceResult<NetworkCounters>;
}
