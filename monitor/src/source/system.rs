//! sysinfo-backed host readings

use std::sync::Mutex;

use sysinfo::{Components, Networks, System};

use super::{MetricSource, NetworkCounters};
use crate::error::{SourceError, SourceResult};
use crate::metric::MetricKind;

/// Component label fragments that identify a CPU temperature sensor
const CPU_SENSOR_HINTS: [&str; 7] =
    ["cpu", "core", "package", "tctl", "tdie", "k10temp", "coretemp"];

/// Reads memory, temperature and network counters through `sysinfo`.
///
/// Each backend sits behind its own lock so a slow component refresh does not
/// hold up the memory or network streams.
pub struct SysinfoSource {
    system: Mutex<System>,
    networks: Mutex<Networks>,
    components: Mutex<Components>,
}

impl SysinfoSource {
    pub fn new() -> Self {
        Self {
            system: Mutex::new(System::new()),
            networks: Mutex::new(Networks::new_with_refreshed_list()),
            components: Mutex::new(Components::new_with_refreshed_list()),
        }
    }
}

impl Default for SysinfoSource {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricSource for SysinfoSource {
    fn probe(&self, kind: MetricKind) -> SourceResult<()> {
        if !sysinfo::IS_SUPPORTED_SYSTEM {
            return Err(SourceError::Unavailable {
                kind,
                reason: format!("sysinfo does not support {}", std::env::consts::OS),
            });
        }
        Ok(())
    }

    fn read_memory_percent(&self) -> SourceResult<f64> {
        let mut system = self.system.lock().map_err(|_| poisoned(MetricKind::MemoryPercent))?;
        system.refresh_memory();

        let total = system.total_memory();
        if total == 0 {
            return Err(SourceError::ReadFailed {
                kind: MetricKind::MemoryPercent,
                reason: "total memory reported as zero".to_string(),
            });
        }

        let used = total.saturating_sub(system.available_memory());
        Ok(used as f64 / total as f64 * 100.0)
    }

    fn read_cpu_temperature(&self) -> SourceResult<Option<f64>> {
        let mut components = self
            .components
            .lock()
            .map_err(|_| poisoned(MetricKind::CpuTemperature))?;
        components.refresh();

        let reading = components
            .list()
            .iter()
            .filter(|component| {
                let label = component.label().to_lowercase();
                CPU_SENSOR_HINTS.iter().any(|hint| label.contains(hint))
            })
            .map(|component| component.temperature())
            .find(|celsius| celsius.is_finite())
            .map(f64::from);

        if reading.is_none() {
            tracing::debug!(
                "No CPU temperature sensor among {} components",
                components.list().len()
            );
        }
        Ok(reading)
    }

    fn read_network_counters(&self) -> SourceResult<NetworkCounters> {
        let mut networks = self.networks.lock().map_err(|_| poisoned(MetricKind::NetDownloadRate))?;
        networks.refresh();

        let counters = networks
            .list()
            .values()
            .fold(NetworkCounters::default(), |acc, data| NetworkCounters {
                bytes_sent: acc.bytes_sent.saturating_add(data.total_transmitted()),
                bytes_received: acc.bytes_received.saturating_add(data.total_received()),
            });
        Ok(counters)
    }
}

fn poisoned(kind: MetricKind) -> SourceError {
    SourceError::ReadFailed {
        kind,
        reason: "source lock poisoned".to_string(),
    }
}
