//! Integration tests for the metric sampler

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time::{sleep, timeout};
use tokio_test::{assert_err, assert_ok};

use deskgauge_monitor::{
    bus::SampleReceiver,
    error::MonitorError,
    metric::{MetricKind, Sample, SamplingSchedule},
    panel::PanelState,
    sampler::{MetricSampler, StreamStatus},
    source::{MockSource, NetworkCounters},
};

fn schedule(kind: MetricKind, millis: u64) -> SamplingSchedule {
    SamplingSchedule::new(kind, Duration::from_millis(millis))
}

fn sampler_over(source: MockSource) -> MetricSampler {
    MetricSampler::new(Arc::new(source))
}

/// Wait for the next `n` sample values of one subscription
async fn next_values(rx: &mut SampleReceiver, n: usize) -> Vec<f64> {
    let collect = async {
        let mut values = Vec::with_capacity(n);
        while values.len() < n {
            match rx.recv().await {
                Some(sample) => values.push(sample.value),
                None => break,
            }
        }
        values
    };
    timeout(Duration::from_secs(5), collect)
        .await
        .expect("timed out waiting for samples")
}

async fn drain(rx: &mut SampleReceiver) -> Vec<Sample> {
    let mut samples = Vec::new();
    while let Some(sample) = rx.recv().await {
        samples.push(sample);
    }
    samples
}

#[tokio::test]
async fn test_throughput_rates_follow_counter_deltas() {
    let source = MockSource::new().with_counters(vec![
        NetworkCounters::new(0, 0),
        NetworkCounters::new(1_000, 0),
        NetworkCounters::new(3_000, 0),
        NetworkCounters::new(6_000, 0),
    ]);
    let mut sampler = sampler_over(source);
    let mut upload = sampler.subscribe(MetricKind::NetUploadRate);

    // 125 ms is exact in binary, so rate = delta * 8.
    assert_ok!(sampler.start(&[schedule(MetricKind::NetUploadRate, 125)]));
    let rates = next_values(&mut upload, 4).await;
    assert_ok!(sampler.stop().await);

    assert_eq!(rates, vec![8_000.0, 16_000.0, 24_000.0, 0.0]);
}

#[tokio::test]
async fn test_download_uses_received_counter() {
    let source = MockSource::new().with_counters(vec![
        NetworkCounters::new(999_999, 4_096),
        NetworkCounters::new(0, 12_288),
    ]);
    let mut sampler = sampler_over(source);
    let mut download = sampler.subscribe(MetricKind::NetDownloadRate);

    assert_ok!(sampler.start(&[schedule(MetricKind::NetDownloadRate, 250)]));
    let rates = next_values(&mut download, 1).await;
    assert_ok!(sampler.stop().await);

    assert_eq!(rates, vec![8_192.0 * 4.0]);
}

#[tokio::test]
async fn test_failed_counter_read_starts_a_new_base() {
    let source = MockSource::new()
        .with_counters(vec![
            NetworkCounters::new(0, 0),
            NetworkCounters::new(800, 0),
            NetworkCounters::new(1_000, 0),
            NetworkCounters::new(2_000, 0),
            NetworkCounters::new(2_400, 0),
        ])
        .failing_at(MetricKind::NetUploadRate, &[2]);
    let mut sampler = sampler_over(source);
    let mut upload = sampler.subscribe(MetricKind::NetUploadRate);

    assert_ok!(sampler.start(&[schedule(MetricKind::NetUploadRate, 125)]));
    let rates = next_values(&mut upload, 2).await;
    assert_ok!(sampler.stop().await);

    // No rate spans the failed read.
    assert_eq!(rates, vec![6_400.0, 3_200.0]);
    assert_eq!(sampler.stream(MetricKind::NetUploadRate).unwrap().failed_reads, 1);
}

#[tokio::test]
async fn test_stop_delivers_every_emitted_tick() {
    let mut sampler = sampler_over(MockSource::new());
    let mut memory = sampler.subscribe(MetricKind::MemoryPercent);
    let handled = Arc::new(Mutex::new(0u64));
    let counter = handled.clone();
    sampler.subscribe_with(MetricKind::MemoryPercent, move |_: &Sample| {
        *counter.lock().unwrap() += 1;
    });

    assert_ok!(sampler.start(&[schedule(MetricKind::MemoryPercent, 20)]));
    sleep(Duration::from_millis(150)).await;
    assert_ok!(sampler.stop().await);

    let ticks = sampler.ticks(MetricKind::MemoryPercent);
    let delivered = drain(&mut memory).await;

    assert!(ticks > 0);
    assert_eq!(delivered.len() as u64, ticks);
    assert_eq!(*handled.lock().unwrap(), ticks);
    assert_eq!(sampler.status(MetricKind::MemoryPercent), Some(StreamStatus::Stopped));
    assert!(!sampler.is_running());
}

#[tokio::test]
async fn test_panicking_handler_does_not_kill_its_stream() {
    let mut sampler = sampler_over(MockSource::new());
    sampler.subscribe_with(MetricKind::MemoryPercent, |_: &Sample| {
        panic!("handler bug");
    });
    let mut memory = sampler.subscribe(MetricKind::MemoryPercent);

    assert_ok!(sampler.start(&[schedule(MetricKind::MemoryPercent, 10)]));
    assert_eq!(next_values(&mut memory, 3).await, vec![50.0, 50.0, 50.0]);

    assert_eq!(sampler.status(MetricKind::MemoryPercent), Some(StreamStatus::Running));
    assert!(sampler.ticks(MetricKind::MemoryPercent) >= 3);

    assert_ok!(sampler.stop().await);
    let remaining = drain(&mut memory).await;
    assert_eq!(remaining.len() as u64 + 3, sampler.ticks(MetricKind::MemoryPercent));
    assert_eq!(sampler.status(MetricKind::MemoryPercent), Some(StreamStatus::Stopped));
}

#[tokio::test]
async fn test_no_samples_after_stop() {
    let source = Arc::new(MockSource::new());
    let mut sampler = MetricSampler::new(source.clone());
    let mut memory = sampler.subscribe(MetricKind::MemoryPercent);

    assert_ok!(sampler.start(&[schedule(MetricKind::MemoryPercent, 10)]));
    sleep(Duration::from_millis(50)).await;
    assert_ok!(sampler.stop().await);

    // Let a read already handed to the blocking pool finish.
    sleep(Duration::from_millis(20)).await;
    let reads = source.reads(MetricKind::MemoryPercent);
    sleep(Duration::from_millis(50)).await;
    assert_eq!(source.reads(MetricKind::MemoryPercent), reads);

    drain(&mut memory).await;
    assert!(memory.recv().await.is_none());
}

#[tokio::test]
async fn test_unavailable_source_fails_only_its_stream() {
    let source = MockSource::new().unavailable(MetricKind::CpuTemperature);
    let mut sampler = sampler_over(source);
    let mut temperature = sampler.subscribe(MetricKind::CpuTemperature);

    assert_ok!(sampler.start(&[
        schedule(MetricKind::MemoryPercent, 20),
        schedule(MetricKind::CpuTemperature, 20),
    ]));
    sleep(Duration::from_millis(150)).await;

    assert!(matches!(
        sampler.status(MetricKind::CpuTemperature),
        Some(StreamStatus::Failed(_))
    ));
    assert_eq!(sampler.status(MetricKind::MemoryPercent), Some(StreamStatus::Running));
    assert!(sampler.ticks(MetricKind::MemoryPercent) > 0);

    assert_ok!(sampler.stop().await);
    assert!(drain(&mut temperature).await.is_empty());
    assert!(matches!(
        sampler.status(MetricKind::CpuTemperature),
        Some(StreamStatus::Failed(_))
    ));
}

#[tokio::test]
async fn test_read_failure_does_not_block_other_streams() {
    let source = MockSource::new().failing_at(MetricKind::MemoryPercent, &[0, 1, 2]);
    let mut sampler = sampler_over(source);
    let mut memory = sampler.subscribe(MetricKind::MemoryPercent);

    assert_ok!(sampler.start(&[
        schedule(MetricKind::MemoryPercent, 25),
        schedule(MetricKind::CpuTemperature, 10),
    ]));

    // Memory recovers after its failed ticks.
    assert_eq!(next_values(&mut memory, 1).await, vec![50.0]);
    assert!(sampler.ticks(MetricKind::CpuTemperature) >= 3);
    assert_ok!(sampler.stop().await);

    let state = sampler.stream(MetricKind::MemoryPercent).unwrap();
    assert_eq!(state.failed_reads, 3);
    assert!(state.last_error.unwrap().contains("injected failure"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_blocking_read_does_not_stall_other_streams() {
    let source =
        MockSource::new().with_delay(MetricKind::CpuTemperature, Duration::from_millis(400));
    let mut sampler = sampler_over(source);

    assert_ok!(sampler.start(&[
        schedule(MetricKind::MemoryPercent, 20),
        schedule(MetricKind::CpuTemperature, 20),
    ]));
    sleep(Duration::from_millis(200)).await;

    assert!(sampler.ticks(MetricKind::MemoryPercent) >= 3);
    assert_eq!(sampler.ticks(MetricKind::CpuTemperature), 0);

    // Stop does not wait for the temperature read still in flight.
    assert_ok!(assert_ok!(timeout(Duration::from_millis(150), sampler.stop()).await));
}

#[tokio::test]
async fn test_memory_and_temperature_are_rounded() {
    let source = MockSource::new()
        .with_memory(vec![41.5, 42.5, 99.6])
        .with_temperature(vec![Some(54.5), None]);
    let mut sampler = sampler_over(source);
    let mut memory = sampler.subscribe(MetricKind::MemoryPercent);
    let mut temperature = sampler.subscribe(MetricKind::CpuTemperature);

    assert_ok!(sampler.start(&[
        schedule(MetricKind::MemoryPercent, 10),
        schedule(MetricKind::CpuTemperature, 10),
    ]));
    let memory_values = next_values(&mut memory, 3).await;
    let temperature_values = next_values(&mut temperature, 2).await;
    assert_ok!(sampler.stop().await);

    assert_eq!(memory_values, vec![42.0, 42.0, 100.0]);
    // A missing sensor reads as 0.
    assert_eq!(temperature_values, vec![54.0, 0.0]);
}

#[tokio::test]
async fn test_start_rejects_invalid_schedules() {
    let mut sampler = sampler_over(MockSource::new());

    let duplicate = sampler.start(&[
        schedule(MetricKind::MemoryPercent, 100),
        schedule(MetricKind::MemoryPercent, 200),
    ]);
    assert!(matches!(duplicate, Err(MonitorError::Scheduling(_))));
    assert_err!(sampler.start(&[schedule(MetricKind::CpuTemperature, 0)]));
    assert!(!sampler.is_running());
    assert!(sampler.status(MetricKind::MemoryPercent).is_none());

    assert_ok!(sampler.start(&SamplingSchedule::defaults()));
    assert!(sampler.is_running());
    assert_err!(sampler.start(&[schedule(MetricKind::MemoryPercent, 100)]));

    assert_ok!(sampler.stop().await);
}

#[tokio::test]
async fn test_panel_follows_every_stream() {
    let source = MockSource::new()
        .with_memory(vec![42.0])
        .with_temperature(vec![Some(51.0)]);
    let mut sampler = sampler_over(source);
    let panel = Arc::new(Mutex::new(PanelState::default()));

    for kind in MetricKind::ALL {
        let panel = panel.clone();
        sampler.subscribe_with(kind, move |sample: &Sample| {
            panel.lock().unwrap().apply(sample);
        });
    }

    let schedules: Vec<_> = MetricKind::ALL.iter().map(|&kind| schedule(kind, 25)).collect();
    assert_ok!(sampler.start(&schedules));
    sleep(Duration::from_millis(300)).await;
    assert_ok!(sampler.stop().await);

    let panel = panel.lock().unwrap();
    assert_eq!(panel.summary(), "mem 42% | cpu 51℃ (warm) | up 0 B/s | down 0 B/s");
    assert!(panel.gauge().is_some());
}
