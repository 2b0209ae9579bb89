//! Byte-rate formatting for the throughput labels

const KIB: f64 = 1024.0;
const MIB: f64 = 1_048_576.0;
const GIB: f64 = 1_073_741_824.0;

/// Format a byte rate with a `B/s`, `K/s`, `M/s` or `G/s` suffix.
///
/// The scaled value is rounded half-to-even, so `1536 B/s` shows as `2 K/s`
/// and `2560 B/s` as `2 K/s`. Negative input is a caller bug.
pub fn format_rate(rate: f64) -> String {
    debug_assert!(rate >= 0.0, "byte rate must be non-negative, got {}", rate);
    let rate = if rate >= 0.0 { rate } else { 0.0 };

    let (scaled, suffix) = if rate < KIB {
        (rate, "B/s")
    } else if rate < MIB {
        (rate / KIB, "K/s")
    } else if rate < GIB {
        (rate / MIB, "M/s")
    } else {
        (rate / GIB, "G/s")
    };

    format!("{} {}", scaled.round_ties_even() as u64, suffix)
}
