//! A scripted metric source.
//!
//! Used by the test suites and by `deskgauge run --demo`, which needs live
//! looking numbers on hosts without usable sensors.

use std::collections::HashSet;
use std::sync::Mutex;
use std::time::Duration;

use super::{MetricSource, NetworkCounters};
use crate::error::{SourceError, SourceResult};
use crate::metric::MetricKind;

type Reader<T> = Box<dyn FnMut(u64) -> T + Send>;

/// One scripted query: the value generator plus injected faults
struct Query<T> {
    kind: MetricKind,
    reader: Reader<T>,
    calls: u64,
    failing_calls: HashSet<u64>,
    delay: Duration,
}

/// A [`MetricSource`] whose readings come from scripts or closures.
///
/// Scripts repeat their last value once exhausted. Call indices are counted
/// per query from zero; the upload and download streams share the network
/// query.
pub struct MockSource {
    memory: Mutex<Query<f64>>,
    temperature: Mutex<Query<Option<f64>>>,
    network: Mutex<Query<NetworkCounters>>,
    unavailable: HashSet<MetricKind>,
}

impl<T> Query<T> {
    fn new(kind: MetricKind, reader: Reader<T>) -> Self {
        Self {
            kind,
            reader,
            calls: 0,
            failing_calls: HashSet::new(),
            delay: Duration::ZERO,
        }
    }
}

impl MockSource {
    /// A source with constant readings: 50 %, 40 ℃, zeroed counters
    pub fn new() -> Self {
        Self {
            memory: Mutex::new(Query::new(MetricKind::MemoryPercent, Box::new(|_| 50.0))),
            temperature: Mutex::new(Query::new(
                MetricKind::CpuTemperature,
                Box::new(|_| Some(40.0)),
            )),
            network: Mutex::new(Query::new(
                MetricKind::NetDownloadRate,
                Box::new(|_| NetworkCounters::default()),
            )),
            unavailable: HashSet::new(),
        }
    }

    /// Synthetic, slowly varying readings for demo mode
    pub fn demo() -> Self {
        let mut sent = 0u64;
        let mut received = 0u64;
        Self::new()
            .with_memory_fn(|call| 55.0 + 30.0 * (call as f64 * 0.35).sin())
            .with_temperature_fn(|call| Some(52.0 + 18.0 * (call as f64 * 0.5).sin()))
            .with_counters_fn(move |call| {
                let phase = call as f64 * 0.4;
                sent += (40_000.0 * (1.0 + phase.sin())) as u64;
                received += (2_500_000.0 * (1.0 + phase.cos())) as u64;
                NetworkCounters::new(sent, received)
            })
    }

    pub fn with_memory(self, values: Vec<f64>) -> Self {
        self.with_memory_fn(scripted(values))
    }

    pub fn with_temperature(self, values: Vec<Option<f64>>) -> Self {
        self.with_temperature_fn(scripted(values))
    }

    pub fn with_counters(self, values: Vec<NetworkCounters>) -> Self {
        self.with_counters_fn(scripted(values))
    }

    pub fn with_memory_fn(mut self, reader: impl FnMut(u64) -> f64 + Send + 'static) -> Self {
        replace_reader(&mut self.memory, Box::new(reader));
        self
    }

    pub fn with_temperature_fn(
        mut self,
        reader: impl FnMut(u64) -> Option<f64> + Send + 'static,
    ) -> Self {
        replace_reader(&mut self.temperature, Box::new(reader));
        self
    }

    pub fn with_counters_fn(
        mut self,
        reader: impl FnMut(u64) -> NetworkCounters + Send + 'static,
    ) -> Self {
        replace_reader(&mut self.network, Box::new(reader));
        self
    }

    /// Make `probe(kind)` report the backend as unavailable
    pub fn unavailable(mut self, kind: MetricKind) -> Self {
        self.unavailable.insert(kind);
        self
    }

    /// Fail the query behind `kind` on the given zero-based calls
    pub fn failing_at(mut self, kind: MetricKind, calls: &[u64]) -> Self {
        match kind {
            MetricKind::MemoryPercent => extend_failures(&mut self.memory, calls),
            MetricKind::CpuTemperature => extend_failures(&mut self.temperature, calls),
            MetricKind::NetUploadRate | MetricKind::NetDownloadRate => {
                extend_failures(&mut self.network, calls)
            }
        }
        self
    }

    /// Block every call of the query behind `kind` for `delay`
    pub fn with_delay(mut self, kind: MetricKind, delay: Duration) -> Self {
        match kind {
            MetricKind::MemoryPercent => set_delay(&mut self.memory, delay),
            MetricKind::CpuTemperature => set_delay(&mut self.temperature, delay),
            MetricKind::NetUploadRate | MetricKind::NetDownloadRate => {
                set_delay(&mut self.network, delay)
            }
        }
        self
    }

    /// Number of calls made so far to the query behind `kind`
    pub fn reads(&self, kind: MetricKind) -> u64 {
        match kind {
            MetricKind::MemoryPercent => calls(&self.memory),
            MetricKind::CpuTemperature => calls(&self.temperature),
            MetricKind::NetUploadRate | MetricKind::NetDownloadRate => calls(&self.network),
        }
    }
}

impl Default for MockSource {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricSource for MockSource {
    fn probe(&self, kind: MetricKind) -> SourceResult<()> {
        if self.unavailable.contains(&kind) {
            return Err(SourceError::Unavailable {
                kind,
                reason: "mock backend marked unavailable".to_string(),
            });
        }
        Ok(())
    }

    fn read_memory_percent(&self) -> SourceResult<f64> {
        read(&self.memory)
    }

    fn read_cpu_temperature(&self) -> SourceResult<Option<f64>> {
        read(&self.temperature)
    }

    fn read_network_counters(&self) -> SourceResult<NetworkCounters> {
        read(&self.network)
    }
}

fn read<T>(query: &Mutex<Query<T>>) -> SourceResult<T> {
    let delay = query.lock().map(|q| q.delay).unwrap_or_default();
    if !delay.is_zero() {
        std::thread::sleep(delay);
    }

    let mut query = query.lock().map_err(|_| SourceError::TaskFailed {
        reason: "mock query lock poisoned".to_string(),
    })?;
    let call = query.calls;
    query.calls += 1;

    if query.failing_calls.contains(&call) {
        return Err(SourceError::ReadFailed {
            kind: query.kind,
            reason: format!("injected failure on call {}", call),
        });
    }
    Ok((query.reader)(call))
}

fn calls<T>(query: &Mutex<Query<T>>) -> u64 {
    query.lock().map(|q| q.calls).unwrap_or_default()
}

fn scripted<T>(values: Vec<T>) -> impl FnMut(u64) -> T + Send + 'static
where
    T: Clone + Default + Send + 'static,
{
    move |call| {
        let index = (call as usize).min(values.len().saturating_sub(1));
        values.get(index).cloned().unwrap_or_default()
    }
}

fn replace_reader<T>(query: &mut Mutex<Query<T>>, reader: Reader<T>) {
    if let Ok(query) = query.get_mut() {
        query.reader = reader;
    }
}

fn extend_failures<T>(query: &mut Mutex<Query<T>>, calls: &[u64]) {
    if let Ok(query) = query.get_mut() {
        query.failing_calls.extend(calls.iter().copied());
    }
}

fn set_delay<T>(query: &mut Mutex<Query<T>>, delay: Duration) {
    if let Ok(query) = query.get_mut() {
        query.delay = delay;
    }
}
