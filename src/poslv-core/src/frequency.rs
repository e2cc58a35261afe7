// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Per-stream arrival rate tracking.
//!
//! A [`FrequencyMonitor`] records packet arrival timestamps for one stream
//! and judges the most recent inter-arrival interval against the configured
//! frequency band.

use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use crate::packet::StreamKind;
use crate::status::Severity;

/// Rates outside `[min / BAND, max * BAND]` are errors, inside but off-band warnings.
const WARN_BAND_FACTOR: f64 = 10.0;

/// Acceptable frequency band for a stream.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrequencyBounds {
    pub min_hz: f64,
    pub max_hz: f64,
    /// Longest silence tolerated before the stream is declared dead.
    pub liveness: Duration,
}

impl FrequencyBounds {
    pub fn new(min_hz: f64, max_hz: f64, liveness: Duration) -> Self {
        Self {
            min_hz,
            max_hz,
            liveness,
        }
    }
}

impl Default for FrequencyBounds {
    fn default() -> Self {
        Self {
            min_hz: 1.0,
            max_hz: 200.0,
            liveness: Duration::from_secs(5),
        }
    }
}

/// A timestamp older than the previous sample was recorded.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
#[error("{stream}: timestamp {timestamp:.6} precedes previous sample {previous:.6}")]
pub struct ClockOrderError {
    pub stream: StreamKind,
    pub previous: f64,
    pub timestamp: f64,
}

/// Mutable arrival history of one stream.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StreamState {
    pub last_timestamp: Option<f64>,
    pub last_interval: Option<f64>,
    pub emitted_count: u64,
    pub clock_faults: u64,
}

/// Verdict for one stream as exposed in the health report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StreamVerdict {
    pub severity: Severity,
    pub message: &'static str,
    /// Rate derived from the last valid interval.
    pub rate_hz: Option<f64>,
    pub emitted_count: u64,
    pub clock_faults: u64,
}

#[derive(Debug, Clone)]
pub struct FrequencyMonitor {
    stream: StreamKind,
    bounds: FrequencyBounds,
    state: StreamState,
}

impl FrequencyMonitor {
    pub fn new(stream: StreamKind, bounds: FrequencyBounds) -> Self {
        Self {
            stream,
            bounds,
            state: StreamState::default(),
        }
    }

    pub fn stream(&self) -> StreamKind {
        self.stream
    }

    pub fn bounds(&self) -> &FrequencyBounds {
        &self.bounds
    }

    pub fn state(&self) -> &StreamState {
        &self.state
    }

    /// Record one arrival.
    ///
    /// A timestamp earlier than the previous one is counted but leaves the
    /// interval history untouched, so the verdict does not change.
    pub fn record(&mut self, timestamp: f64) -> Result<(), ClockOrderError> {
        self.state.emitted_count += 1;
        let Some(previous) = self.state.last_timestamp else {
            self.state.last_timestamp = Some(timestamp);
            return Ok(());
        };

        let interval = timestamp - previous;
        if interval < 0.0 {
            self.state.clock_faults += 1;
            return Err(ClockOrderError {
                stream: self.stream,
                previous,
                timestamp,
            });
        }

        self.state.last_timestamp = Some(timestamp);
        self.state.last_interval = Some(interval);
        Ok(())
    }

    /// Verdict from the recorded history alone.
    pub fn current_verdict(&self) -> Severity {
        self.evaluate().0
    }

    /// Verdict including the liveness window, evaluated at `now`.
    pub fn verdict_at(&self, now: f64) -> StreamVerdict {
        let (mut severity, mut message) = self.evaluate();
        if let Some(last) = self.state.last_timestamp {
            if now - last > self.bounds.liveness.as_secs_f64() {
                severity = Severity::Error;
                message = "No events within liveness window";
            }
        }
        StreamVerdict {
            severity,
            message,
            rate_hz: self.state.last_interval.map(rate_from_interval),
            emitted_count: self.state.emitted_count,
            clock_faults: self.state.clock_faults,
        }
    }

    fn evaluate(&self) -> (Severity, &'static str) {
        if self.state.last_timestamp.is_none() {
            return (Severity::Error, "No events recorded");
        }
        let Some(interval) = self.state.last_interval else {
            return (Severity::Ok, "Awaiting second event");
        };

        let rate = rate_from_interval(interval);
        let FrequencyBounds { min_hz, max_hz, .. } = self.bounds;
        if rate < min_hz {
            let severity = if rate >= min_hz / WARN_BAND_FACTOR {
                Severity::Warn
            } else {
                Severity::Error
            };
            (severity, "Frequency too low")
        } else if rate > max_hz {
            let severity = if rate <= max_hz * WARN_BAND_FACTOR {
                Severity::Warn
            } else {
                Severity::Error
            };
            (severity, "Frequency too high")
        } else {
            (Severity::Ok, "Desired frequency met")
        }
    }
}

fn rate_from_interval(interval: f64) -> f64 {
    if interval > 0.0 {
        1.0 / interval
    } else {
        f64::INFINITY
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn monitor(min_hz: f64, max_hz: f64) -> FrequencyMonitor {
        FrequencyMonitor::new(
            StreamKind::NavigationSolution,
            FrequencyBounds::new(min_hz, max_hz, Duration::from_secs(5)),
        )
    }

    #[test]
    fn test_no_events_is_error() {
        let m = monitor(1.0, 200.0);
        assert_eq!(m.current_verdict(), Severity::Error);
        assert_eq!(m.verdict_at(100.0).message, "No events recorded");
    }

    #[test]
    fn test_first_event_is_ok() {
        let mut m = monitor(1.0, 200.0);
        m.record(10.0).unwrap();
        assert_eq!(m.current_verdict(), Severity::Ok);
        assert_eq!(m.state().emitted_count, 1);
    }

    #[test]
    fn test_constant_rate_in_band_stays_ok() {
        let mut m = monitor(1.0, 200.0);
        for i in 0..20 {
            m.record(100.0 + i as f64 * 0.05).unwrap();
            assert_eq!(m.current_verdict(), Severity::Ok, "sample {}", i);
        }
        let verdict = m.verdict_at(101.0);
        assert_eq!(verdict.severity, Severity::Ok);
        let rate = verdict.rate_hz.unwrap();
        assert!((rate - 20.0).abs() < 1e-6);
    }

    #[test]
    fn test_bounds_are_inclusive() {
        let mut m = monitor(2.0, 4.0);
        m.record(0.0).unwrap();
        m.record(0.5).unwrap();
        assert_eq!(m.current_verdict(), Severity::Ok);
        m.record(0.75).unwrap();
        assert_eq!(m.current_verdict(), Severity::Ok);
    }

    #[test]
    fn test_warn_within_order_of_magnitude() {
        let mut m = monitor(1.0, 10.0);
        m.record(0.0).unwrap();
        // 0.5 Hz
        m.record(2.0).unwrap();
        assert_eq!(m.current_verdict(), Severity::Warn);
        assert_eq!(m.verdict_at(2.0).message, "Frequency too low");
        // 50 Hz
        m.record(2.02).unwrap();
        assert_eq!(m.current_verdict(), Severity::Warn);
        assert_eq!(m.verdict_at(2.02).message, "Frequency too high");
    }

    #[test]
    fn test_error_beyond_order_of_magnitude() {
        let mut m = monitor(1.0, 10.0);
        m.record(0.0).unwrap();
        // 0.05 Hz
        m.record(20.0).unwrap();
        assert_eq!(m.current_verdict(), Severity::Error);
        // 1 kHz
        m.record(20.001).unwrap();
        assert_eq!(m.current_verdict(), Severity::Error);
        // identical timestamps mean an unbounded rate
        m.record(20.001).unwrap();
        assert_eq!(m.current_verdict(), Severity::Error);
    }

    #[test]
    fn test_out_of_order_sample_is_rejected_without_changing_verdict() {
        let mut m = monitor(1.0, 200.0);
        m.record(5.0).unwrap();
        m.record(5.1).unwrap();
        let before = m.current_verdict();
        let before_state = m.state().clone();

        let err = m.record(4.0).unwrap_err();
        assert_eq!(err.stream, StreamKind::NavigationSolution);
        assert_eq!(err.previous, 5.1);
        assert_eq!(err.timestamp, 4.0);

        assert_eq!(m.current_verdict(), before);
        assert_eq!(m.state().last_timestamp, before_state.last_timestamp);
        assert_eq!(m.state().last_interval, before_state.last_interval);
        assert_eq!(m.state().emitted_count, before_state.emitted_count + 1);
        assert_eq!(m.state().clock_faults, 1);
    }

    #[test]
    fn test_liveness_window_expires() {
        let mut m = monitor(1.0, 200.0);
        m.record(0.0).unwrap();
        m.record(0.1).unwrap();
        assert_eq!(m.verdict_at(1.0).severity, Severity::Ok);
        let stale = m.verdict_at(10.0);
        assert_eq!(stale.severity, Severity::Error);
        assert_eq!(stale.message, "No events within liveness window");
        // The history-only verdict is unaffected.
        assert_eq!(m.current_verdict(), Severity::Ok);
    }
}
