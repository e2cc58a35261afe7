// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Packet dispatch.
//!
//! The router classifies each decoded packet, records arrival timing for
//! monitored streams, forwards stream packets to the [`EventSink`] and keeps
//! the latest status codes for the health report.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use crate::frequency::{ClockOrderError, FrequencyBounds, FrequencyMonitor};
use crate::packet::{DecodedPacket, StreamKind};
use crate::sink::{Event, EventPayload, EventSink};
use crate::status::GPS_NOT_RECEIVED;

/// Counter key for packets of groups the router does not model.
pub const UNHANDLED: &str = "unhandled";

/// Latest general status and FDIR words.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GeneralStatusWords {
    pub general_status_a: u32,
    pub general_status_b: u32,
    pub general_status_c: u32,
    pub fdir_level1_status: u32,
    pub fdir_level2_status: u16,
    pub fdir_level4_status: u16,
    pub fdir_level5_status: u16,
}

/// Latest status codes reported by the sensor.
///
/// `None` and [`GPS_NOT_RECEIVED`] mark values that have not arrived yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusSnapshot {
    pub alignment: Option<u8>,
    pub primary_gps: i8,
    pub secondary_gps: i8,
    pub gams: Option<u8>,
    pub iin: Option<u8>,
    pub general: Option<GeneralStatusWords>,
}

impl Default for StatusSnapshot {
    fn default() -> Self {
        Self {
            alignment: None,
            primary_gps: GPS_NOT_RECEIVED,
            secondary_gps: GPS_NOT_RECEIVED,
            gams: None,
            iin: None,
            general: None,
        }
    }
}

/// What the router did with a packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOutcome {
    Published(StreamKind),
    StatusUpdated,
    Unhandled,
}

/// Frequency bounds for each monitored stream.
#[derive(Debug, Clone)]
pub struct StreamBounds {
    pub navigation_solution: FrequencyBounds,
    pub navigation_performance: FrequencyBounds,
    pub dmi_data: FrequencyBounds,
}

impl StreamBounds {
    pub fn get(&self, stream: StreamKind) -> FrequencyBounds {
        match stream {
            StreamKind::NavigationSolution => self.navigation_solution,
            StreamKind::NavigationPerformance => self.navigation_performance,
            StreamKind::DmiData => self.dmi_data,
        }
    }
}

impl Default for StreamBounds {
    fn default() -> Self {
        let liveness = FrequencyBounds::default().liveness;
        Self {
            navigation_solution: FrequencyBounds::new(1.0, 200.0, liveness),
            navigation_performance: FrequencyBounds::new(0.5, 1.0, liveness),
            dmi_data: FrequencyBounds::new(1.0, 200.0, liveness),
        }
    }
}

pub struct PacketRouter {
    frame_id: String,
    sink: Arc<dyn EventSink>,
    monitors: BTreeMap<StreamKind, FrequencyMonitor>,
    status: StatusSnapshot,
    counters: BTreeMap<&'static str, u64>,
    last_clock_fault: Option<ClockOrderError>,
}

impl PacketRouter {
    pub fn new(frame_id: impl Into<String>, bounds: &StreamBounds, sink: Arc<dyn EventSink>) -> Self {
        let monitors = StreamKind::ALL
            .iter()
            .map(|stream| (*stream, FrequencyMonitor::new(*stream, bounds.get(*stream))))
            .collect();
        Self {
            frame_id: frame_id.into(),
            sink,
            monitors,
            status: StatusSnapshot::default(),
            counters: BTreeMap::new(),
            last_clock_fault: None,
        }
    }

    pub fn frame_id(&self) -> &str {
        &self.frame_id
    }

    pub fn status(&self) -> &StatusSnapshot {
        &self.status
    }

    pub fn monitors(&self) -> impl Iterator<Item = &FrequencyMonitor> {
        self.monitors.values()
    }

    pub fn monitor(&self, stream: StreamKind) -> Option<&FrequencyMonitor> {
        self.monitors.get(&stream)
    }

    pub fn counters(&self) -> &BTreeMap<&'static str, u64> {
        &self.counters
    }

    pub fn counter(&self, key: &str) -> u64 {
        self.counters.get(key).copied().unwrap_or(0)
    }

    pub fn last_clock_fault(&self) -> Option<&ClockOrderError> {
        self.last_clock_fault.as_ref()
    }

    /// Dispatch one packet that arrived at `now` (seconds since the epoch).
    pub fn route(&mut self, packet: DecodedPacket, now: f64) -> RouteOutcome {
        *self.counters.entry(packet.label()).or_insert(0) += 1;

        match packet {
            DecodedPacket::NavigationSolution(vns) => {
                self.status.alignment = Some(vns.alignment_status);
                self.emit(
                    StreamKind::NavigationSolution,
                    now,
                    EventPayload::NavigationSolution(vns),
                )
            }
            DecodedPacket::NavigationPerformance(vnp) => self.emit(
                StreamKind::NavigationPerformance,
                now,
                EventPayload::NavigationPerformance(vnp),
            ),
            DecodedPacket::DmiData(dmi) => {
                self.emit(StreamKind::DmiData, now, EventPayload::DmiData(dmi))
            }
            DecodedPacket::PrimaryGpsStatus(gps) => {
                self.status.primary_gps = gps.navigation_solution_status;
                RouteOutcome::StatusUpdated
            }
            DecodedPacket::SecondaryGpsStatus(gps) => {
                self.status.secondary_gps = gps.navigation_solution_status;
                RouteOutcome::StatusUpdated
            }
            DecodedPacket::GamsSolution(gams) => {
                self.status.gams = Some(gams.solution_status);
                RouteOutcome::StatusUpdated
            }
            DecodedPacket::IinSolution(iin) => {
                self.status.iin = Some(iin.processing_status);
                RouteOutcome::StatusUpdated
            }
            DecodedPacket::GeneralStatus(general) => {
                self.status.general = Some(GeneralStatusWords {
                    general_status_a: general.general_status_a,
                    general_status_b: general.general_status_b,
                    general_status_c: general.general_status_c,
                    fdir_level1_status: general.fdir_level1_status,
                    fdir_level2_status: general.fdir_level2_status,
                    fdir_level4_status: general.fdir_level4_status,
                    fdir_level5_status: general.fdir_level5_status,
                });
                RouteOutcome::StatusUpdated
            }
            DecodedPacket::Unrecognized { group_id } => {
                debug!("Ignoring unhandled group {}", group_id);
                RouteOutcome::Unhandled
            }
        }
    }

    fn emit(&mut self, stream: StreamKind, now: f64, payload: EventPayload) -> RouteOutcome {
        if let Some(monitor) = self.monitors.get_mut(&stream) {
            if let Err(e) = monitor.record(now) {
                warn!("Clock order violation: {}", e);
                self.last_clock_fault = Some(e);
            }
        }
        self.sink.publish(Event {
            kind: stream,
            stamp: now,
            frame_id: self.frame_id.clone(),
            payload,
        });
        RouteOutcome::Published(stream)
    }
}
