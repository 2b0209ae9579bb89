//! Basic usage example for the deskgauge monitor
//!
//! Samples the host for a few seconds and prints the panel summary after
//! every reading.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use deskgauge_monitor::{
    metric::{MetricKind, Sample, SamplingSchedule},
    panel::PanelState,
    sampler::MetricSampler,
    source::SysinfoSource,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    println!("deskgauge - Basic Usage Example");
    println!("===============================");

    let mut sampler = MetricSampler::new(Arc::new(SysinfoSource::new()));
    let panel = Arc::new(Mutex::new(PanelState::default()));

    for kind in MetricKind::ALL {
        let panel = panel.clone();
        sampler.subscribe_with(kind, move |sample: &Sample| {
            if let Ok(mut panel) = panel.lock() {
                panel.apply(sample);
                println!("{}", panel.summary());
            }
        });
    }

    let schedules = vec![
        SamplingSchedule::new(MetricKind::MemoryPercent, Duration::from_secs(1)),
        SamplingSchedule::new(MetricKind::CpuTemperature, Duration::from_secs(2)),
        SamplingSchedule::new(MetricKind::NetUploadRate, Duration::from_secs(1)),
        SamplingSchedule::new(MetricKind::NetDownloadRate, Duration::from_secs(1)),
    ];
    sampler.start(&schedules)?;

    tokio::time::sleep(Duration::from_secs(5)).await;
    sampler.stop().await?;

    for schedule in &schedules {
        if let Some(state) = sampler.stream(schedule.kind) {
            println!(
                "{:<18} {:?}: {} samples, {} failed reads",
                schedule.kind.name(),
                state.status,
                state.ticks,
                state.failed_reads
            );
        }
    }

    if let Some(gauge) = panel.lock().ok().and_then(|panel| panel.gauge().cloned()) {
        println!("\nGauge path ({} points): {}", gauge.len(), gauge.to_svg_path());
    }

    Ok(())
}
