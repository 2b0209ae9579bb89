//! Multi-stream metric sampler
//!
//! The sampler owns one tokio task per [`SamplingSchedule`]. Each task loops
//! read → transform → publish → sleep on its own interval. Source calls run on
//! the blocking pool, so a sensor that hangs only stalls its own stream, and
//! the only state a stream carries between ticks (the previous counter
//! snapshot for throughput) lives inside that stream's task.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use futures::future::join_all;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::bus::{SampleBus, SampleHandler, SampleReceiver};
use crate::error::{MonitorError, Result, SourceError, SourceResult};
use crate::metric::{MetricKind, Sample, SamplingSchedule};
use crate::source::{MetricSource, NetworkCounters};

/// Lifecycle of one stream
#[derive(Debug, Clone, PartialEq)]
pub enum StreamStatus {
    /// Task spawned, source not yet probed
    Starting,
    Running,
    /// The source was unavailable at startup; the stream has terminated
    Failed(String),
    Stopped,
}

/// Health snapshot of one stream
#[derive(Debug, Clone)]
pub struct StreamState {
    pub status: StreamStatus,

    /// Sampling interval
    pub interval: Duration,

    /// Samples emitted so far
    pub ticks: u64,

    /// Ticks whose read failed
    pub failed_reads: u64,

    /// Most recent read error
    pub last_error: Option<String>,

    /// Most recent emitted sample
    pub last_sample: Option<Sample>,
}

type StreamStates = Arc<RwLock<HashMap<MetricKind, StreamState>>>;

/// Runs the metric streams and fans their samples out to subscribers
pub struct MetricSampler {
    /// Where raw readings come from
    sources: Arc<dyn MetricSource>,

    /// Subscriber registry
    bus: Arc<SampleBus>,

    /// Per-stream health, written by the stream tasks
    streams: StreamStates,

    /// Cancels every stream on stop
    cancel: CancellationToken,

    /// Running stream tasks
    tasks: Vec<(MetricKind, JoinHandle<()>)>,

    started: bool,
}

/// Everything a stream task needs, owned by that task
struct StreamContext {
    schedule: SamplingSchedule,
    sources: Arc<dyn MetricSource>,
    bus: Arc<SampleBus>,
    streams: StreamStates,
    cancel: CancellationToken,
}

/// Per-kind read and transform step
enum StreamReader {
    Memory,
    Temperature,
    Throughput {
        /// Counter value captured at the previous successful tick
        previous: Option<u64>,
    },
}

impl MetricSampler {
    /// Create a sampler over `sources`; no stream runs until [`start`](Self::start)
    pub fn new(sources: Arc<dyn MetricSource>) -> Self {
        Self {
            sources,
            bus: Arc::new(SampleBus::new()),
            streams: Arc::new(RwLock::new(HashMap::new())),
            cancel: CancellationToken::new(),
            tasks: Vec::new(),
            started: false,
        }
    }

    /// Receive every sample of `kind` produced after this call, in order
    pub fn subscribe(&self, kind: MetricKind) -> SampleReceiver {
        self.bus.subscribe(kind)
    }

    /// Invoke `handler` for every sample of `kind` produced after this call.
    ///
    /// The handler runs on the stream's task and must not block.
    pub fn subscribe_with<H: SampleHandler + 'static>(&self, kind: MetricKind, handler: H) {
        self.bus.subscribe_with(kind, handler);
    }

    /// Spawn one stream per schedule.
    ///
    /// Fails without spawning anything if a kind appears twice, an interval
    /// is zero, or the sampler was already started. A source that turns out
    /// to be unavailable fails only its own stream.
    pub fn start(&mut self, schedules: &[SamplingSchedule]) -> Result<()> {
        if self.started {
            return Err(MonitorError::Scheduling("sampler already started".to_string()));
        }
        validate_schedules(schedules)?;
        self.started = true;

        info!("Starting metric sampler with {} streams", schedules.len());

        {
            let mut streams = self.streams.write().unwrap_or_else(PoisonError::into_inner);
            for schedule in schedules {
                streams.insert(schedule.kind, StreamState::new(schedule.interval));
            }
        }

        for schedule in schedules {
            let context = StreamContext {
                schedule: *schedule,
                sources: self.sources.clone(),
                bus: self.bus.clone(),
                streams: self.streams.clone(),
                cancel: self.cancel.child_token(),
            };
            self.tasks.push((schedule.kind, tokio::spawn(context.run())));
        }

        Ok(())
    }

    /// Cancel every stream and wait for the tasks to finish.
    ///
    /// Subscriber channels are closed afterwards, so receivers yield the
    /// samples already delivered and then end.
    pub async fn stop(&mut self) -> Result<()> {
        if !self.started {
            return Ok(());
        }

        info!("Stopping metric sampler");
        self.cancel.cancel();

        let (kinds, handles): (Vec<_>, Vec<_>) = self.tasks.drain(..).unzip();
        let results = join_all(handles).await;

        {
            let mut streams = self.streams.write().unwrap_or_else(PoisonError::into_inner);
            for (kind, result) in kinds.into_iter().zip(results) {
                let Some(state) = streams.get_mut(&kind) else { continue };
                match result {
                    Err(e) => {
                        error!("Stream {} task ended abnormally: {}", kind, e);
                        state.status =
                            StreamStatus::Failed(format!("stream task ended abnormally: {}", e));
                    }
                    Ok(()) if !matches!(state.status, StreamStatus::Failed(_)) => {
                        state.status = StreamStatus::Stopped;
                    }
                    Ok(()) => {}
                }
            }
        }
        self.bus.close();

        info!("Metric sampler stopped");
        Ok(())
    }

    /// Whether streams have been started and not yet stopped
    pub fn is_running(&self) -> bool {
        self.started && !self.cancel.is_cancelled()
    }

    pub fn status(&self, kind: MetricKind) -> Option<StreamStatus> {
        self.stream(kind).map(|state| state.status)
    }

    /// Number of samples emitted by the stream for `kind`
    pub fn ticks(&self, kind: MetricKind) -> u64 {
        self.stream(kind).map_or(0, |state| state.ticks)
    }

    /// Snapshot of one stream's health.
    ///
    /// A running stream whose task has already exited reports `Failed`.
    pub fn stream(&self, kind: MetricKind) -> Option<StreamState> {
        let mut state = self
            .streams
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&kind)
            .cloned()?;

        let exited = self
            .tasks
            .iter()
            .any(|(task_kind, handle)| *task_kind == kind && handle.is_finished());
        if exited && state.status == StreamStatus::Running {
            state.status = StreamStatus::Failed("stream task exited unexpectedly".to_string());
        }
        Some(state)
    }
}

impl Drop for MetricSampler {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

fn validate_schedules(schedules: &[SamplingSchedule]) -> Result<()> {
    let mut seen = HashSet::new();
    for schedule in schedules {
        if schedule.interval.is_zero() {
            return Err(MonitorError::Scheduling(format!(
                "{} interval must be greater than zero",
                schedule.kind
            )));
        }
        if !seen.insert(schedule.kind) {
            return Err(MonitorError::Scheduling(format!(
                "{} is scheduled more than once",
                schedule.kind
            )));
        }
    }
    Ok(())
}

impl StreamState {
    fn new(interval: Duration) -> Self {
        Self {
            status: StreamStatus::Starting,
            interval,
            ticks: 0,
            failed_reads: 0,
            last_error: None,
            last_sample: None,
        }
    }
}

impl StreamContext {
    async fn run(self) {
        let kind = self.schedule.kind;

        let probe = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return,
            probe = self.read_blocking(move |source| source.probe(kind)) => probe,
        };
        if let Err(e) = probe {
            error!("Stream {} cannot start: {}", kind, e);
            self.update(|state| state.status = StreamStatus::Failed(e.to_string()));
            return;
        }

        self.update(|state| state.status = StreamStatus::Running);
        info!("Stream {} running every {:?}", kind, self.schedule.interval);

        let mut reader = StreamReader::for_kind(kind);
        loop {
            let outcome = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                outcome = reader.tick(&self) => outcome,
            };

            match outcome {
                Ok(Some(value)) => self.emit(value),
                Ok(None) => debug!("Stream {} captured its counter base", kind),
                Err(e) => self.record_failure(e),
            }

            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                _ = tokio::time::sleep(self.schedule.interval) => {}
            }
        }

        debug!("Stream {} cancelled", kind);
    }

    /// Run a source call on the blocking pool
    async fn read_blocking<T, F>(&self, read: F) -> SourceResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&dyn MetricSource) -> SourceResult<T> + Send + 'static,
    {
        let sources = self.sources.clone();
        tokio::task::spawn_blocking(move || read(sources.as_ref())).await?
    }

    fn emit(&self, value: f64) {
        let sample = Sample::new(self.schedule.kind, value);
        let delivered = self.bus.publish(&sample);
        debug!(kind = %sample.kind, value, delivered, "Sample emitted");

        self.update(|state| {
            state.ticks += 1;
            state.last_sample = Some(sample);
        });
    }

    fn record_failure(&self, error: SourceError) {
        warn!("Stream {} read failed, retrying next tick: {}", self.schedule.kind, error);
        self.update(|state| {
            state.failed_reads += 1;
            state.last_error = Some(error.to_string());
        });
    }

    fn update(&self, apply: impl FnOnce(&mut StreamState)) {
        let mut streams = self.streams.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(state) = streams.get_mut(&self.schedule.kind) {
            apply(state);
        }
    }
}

impl StreamReader {
    fn for_kind(kind: MetricKind) -> Self {
        match kind {
            MetricKind::MemoryPercent => StreamReader::Memory,
            MetricKind::CpuTemperature => StreamReader::Temperature,
            MetricKind::NetUploadRate | MetricKind::NetDownloadRate => {
                StreamReader::Throughput { previous: None }
            }
        }
    }

    /// One read; `Ok(None)` when there is nothing to emit yet
    async fn tick(&mut self, context: &StreamContext) -> SourceResult<Option<f64>> {
        let kind = context.schedule.kind;
        match self {
            StreamReader::Memory => {
                let raw = context.read_blocking(|source| source.read_memory_percent()).await?;
                memory_percent(raw).map(Some)
            }
            StreamReader::Temperature => {
                let raw = context.read_blocking(|source| source.read_cpu_temperature()).await?;
                Ok(Some(temperature_celsius(raw)))
            }
            StreamReader::Throughput { previous } => {
                let read = context.read_blocking(|source| source.read_network_counters());
                let counters = match read.await {
                    Ok(counters) => counters,
                    Err(e) => {
                        // The next good read starts a new base.
                        *previous = None;
                        return Err(e);
                    }
                };
                Ok(throughput(kind, previous, counters, context.schedule.interval))
            }
        }
    }
}

/// Round a raw memory reading half-to-even into [0, 100]
fn memory_percent(raw: f64) -> SourceResult<f64> {
    if !raw.is_finite() {
        return Err(SourceError::ReadFailed {
            kind: MetricKind::MemoryPercent,
            reason: format!("non-finite memory reading {}", raw),
        });
    }
    Ok(raw.round_ties_even().clamp(0.0, 100.0))
}

/// Round a temperature half-to-even; a missing sensor reads as 0
fn temperature_celsius(raw: Option<f64>) -> f64 {
    match raw {
        Some(celsius) if celsius.is_finite() => celsius.round_ties_even().max(0.0),
        _ => 0.0,
    }
}

/// Advance the counter base and compute the rate over one nominal interval.
///
/// A counter that went backwards (interface reset, wraparound) reports 0 and
/// becomes the new base.
fn throughput(
    kind: MetricKind,
    previous: &mut Option<u64>,
    counters: NetworkCounters,
    interval: Duration,
) -> Option<f64> {
    let current = counters.counter_for(kind);
    let base = previous.replace(current)?;

    if current < base {
        warn!("Stream {} counter went backwards ({} -> {}), reporting 0", kind, base, current);
    }
    let delta = current.saturating_sub(base);
    Some(delta as f64 / interval.as_secs_f64())
}
