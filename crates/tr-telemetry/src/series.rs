//! Lossy streaming compaction of utilization time series.
//!
//! Samples arrive one at a time over the life of a process. A series keeps
//! only the points needed to redraw the signal within a caller-chosen
//! precision: a flat run collapses into a start point plus an end point whose
//! timestamp keeps moving forward.
//!
//! # Transport form
//!
//! [`TelemetrySeries::to_transport_form`] emits `[time, value]` pairs:
//!
//! - `time` of the first pair is the absolute timestamp in milliseconds;
//!   every later `time` is the non-negative delta from the previous point.
//! - `value` is the percentage rounded to two decimal digits.
//!
//! A consumer recovers absolute timestamps with a running sum over `time`.
//! [`decode_transport_form`] does exactly that.

use serde::{Deserialize, Serialize};
use tr_common::TransportPoint;

/// Lower bound of a utilization value.
pub const MIN_VALUE: f64 = 0.0;

/// Upper bound of a utilization value.
pub const MAX_VALUE: f64 = 100.0;

/// One utilization sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TelemetryPoint {
    /// Milliseconds since the Unix epoch.
    pub timestamp: u64,
    /// Percentage in `[0, 100]`.
    pub value: f64,
}

impl TelemetryPoint {
    /// Create a point, clamping the value into `[0, 100]`.
    ///
    /// NaN is treated as 0.
    pub fn new(timestamp: u64, value: f64) -> Self {
        let value = if value.is_nan() {
            MIN_VALUE
        } else {
            value.clamp(MIN_VALUE, MAX_VALUE)
        };
        Self { timestamp, value }
    }
}

/// Ordered-by-time compacted series.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySeries {
    points: Vec<TelemetryPoint>,
}

impl TelemetrySeries {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a sample.
    ///
    /// When the last two stored values and the new value are all within
    /// `precision` of the last stored value, the last point's timestamp moves
    /// to the new timestamp and the new value is dropped. Otherwise the sample
    /// is appended. Only the last two points are ever inspected.
    pub fn add_point(&mut self, point: TelemetryPoint, precision: f64) {
        let point = TelemetryPoint::new(point.timestamp, point.value);
        if let [.., prev, last] = self.points.as_mut_slice() {
            if (last.value - prev.value).abs() < precision
                && (last.value - point.value).abs() < precision
            {
                last.timestamp = point.timestamp;
                return;
            }
        }
        self.points.push(point);
    }

    pub fn points(&self) -> &[TelemetryPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Delta-encoded transport form; see the module docs for the layout.
    pub fn to_transport_form(&self) -> Vec<TransportPoint> {
        let mut previous: Option<u64> = None;
        self.points
            .iter()
            .map(|p| {
                let time = match previous {
                    None => p.timestamp,
                    Some(prev) => p.timestamp.saturating_sub(prev),
                };
                previous = Some(p.timestamp);
                TransportPoint(time, round_to_hundredths(p.value))
            })
            .collect()
    }
}

/// Rebuild absolute points from a transport form.
pub fn decode_transport_form(encoded: &[TransportPoint]) -> Vec<TelemetryPoint> {
    let mut timestamp = 0u64;
    encoded
        .iter()
        .enumerate()
        .map(|(i, TransportPoint(time, value))| {
            timestamp = if i == 0 { *time } else { timestamp + time };
            TelemetryPoint {
                timestamp,
                value: *value,
            }
        })
        .collect()
}

fn round_to_hundredths(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
