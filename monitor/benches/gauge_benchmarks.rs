//! Performance benchmarks for the gauge builder and the sample path

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use deskgauge_monitor::{
    bus::SampleBus,
    gauge::GaugePathBuilder,
    metric::{MetricKind, Sample},
    panel::PanelState,
    rate::format_rate,
};

/// Benchmark gauge construction across fill levels
fn bench_gauge_build(c: &mut Criterion) {
    let builder = GaugePathBuilder::default();
    let mut group = c.benchmark_group("gauge_build");

    for percent in [0u8, 25, 50, 75, 100] {
        group.bench_with_input(BenchmarkId::new("build", percent), &percent, |b, &percent| {
            b.iter(|| black_box(builder.build(black_box(percent))));
        });
    }

    group.bench_function("sweep_0_to_100", |b| {
        b.iter(|| {
            for percent in 0..=100u8 {
                black_box(builder.build(percent));
            }
        });
    });

    group.finish();
}

/// Benchmark derived gauge outputs
fn bench_gauge_outputs(c: &mut Criterion) {
    let path = GaugePathBuilder::default().build(75);
    let mut group = c.benchmark_group("gauge_outputs");
    group.throughput(Throughput::Elements(path.len() as u64));

    group.bench_function("area", |b| b.iter(|| black_box(path.area())));
    group.bench_function("svg_path", |b| b.iter(|| black_box(path.to_svg_path())));

    group.finish();
}

/// Benchmark rate formatting across every suffix
fn bench_format_rate(c: &mut Criterion) {
    let rates = [0.0, 1023.0, 1536.0, 3.5 * 1024.0 * 1024.0, 2.0 * 1024.0 * 1024.0 * 1024.0];

    c.bench_function("format_rate", |b| {
        b.iter(|| {
            for rate in rates {
                black_box(format_rate(black_box(rate)));
            }
        });
    });
}

/// Benchmark fan-out and panel updates for one sample
fn bench_sample_delivery(c: &mut Criterion) {
    let mut group = c.benchmark_group("sample_delivery");

    for subscribers in [1usize, 4, 16] {
        let bus = SampleBus::new();
        for _ in 0..subscribers {
            bus.subscribe_with(MetricKind::NetDownloadRate, |sample: &Sample| {
                black_box(sample.value);
            });
        }
        let sample = Sample::new(MetricKind::NetDownloadRate, 4096.0);

        group.throughput(Throughput::Elements(subscribers as u64));
        group.bench_with_input(BenchmarkId::new("publish", subscribers), &sample, |b, sample| {
            b.iter(|| black_box(bus.publish(sample)));
        });
    }

    let mut panel = PanelState::default();
    let memory = Sample::new(MetricKind::MemoryPercent, 63.0);
    group.bench_function("panel_apply_memory", |b| {
        b.iter(|| panel.apply(black_box(&memory)));
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_gauge_build,
    bench_gauge_outputs,
    bench_format_rate,
    bench_sample_delivery
);
criterion_main!(benches);
