// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Simulated packet source for development and testing.
//!
//! Generates every modeled group at fixed rates from an in-memory vehicle
//! moving on a circle. No sensor or network required.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::{self, Instant};
use tracing::warn;

use poslv_core::packet::{
    DmiData, GamsSolution, GeneralStatus, GpsStatus, IinSolution, NavigationPerformance,
    NavigationSolution, TimeDistance,
};
use poslv_core::source::SourceFuture;
use poslv_core::{DecodedPacket, Endpoint, PacketSource, PacketTransport};

/// Rates and reported status codes of the simulated sensor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationProfile {
    pub navigation_solution_hz: f64,
    pub navigation_performance_hz: f64,
    pub dmi_hz: f64,
    /// Rate of the GPS, GAMS, IIN and general status groups.
    pub status_hz: f64,
    pub alignment_status: u8,
    pub primary_gps_status: i8,
    pub secondary_gps_status: i8,
    pub gams_status: u8,
    pub iin_status: u8,
    /// Center of the simulated track, degrees.
    pub latitude: f64,
    pub longitude: f64,
}

impl Default for SimulationProfile {
    fn default() -> Self {
        Self {
            navigation_solution_hz: 100.0,
            navigation_performance_hz: 1.0,
            dmi_hz: 100.0,
            status_hz: 1.0,
            alignment_status: 0,
            primary_gps_status: 6,
            secondary_gps_status: 3,
            gams_status: 0,
            iin_status: 1,
            latitude: 47.3769,
            longitude: 8.5417,
        }
    }
}

/// Slowest schedulable rate; a positive rate below it is rejected.
pub const MIN_RATE_HZ: f64 = 1e-3;
/// Fastest schedulable rate.
pub const MAX_RATE_HZ: f64 = 10_000.0;

impl SimulationProfile {
    fn rates(&self) -> [(&'static str, f64); 4] {
        [
            ("navigation_solution_hz", self.navigation_solution_hz),
            ("navigation_performance_hz", self.navigation_performance_hz),
            ("dmi_hz", self.dmi_hz),
            ("status_hz", self.status_hz),
        ]
    }

    /// Every rate must be 0 (disabled) or within `MIN_RATE_HZ..=MAX_RATE_HZ`.
    pub fn validate(&self) -> Result<(), String> {
        for (name, hz) in self.rates() {
            if hz != 0.0 && schedule_period(hz).is_none() {
                return Err(format!(
                    "[source.simulation].{} must be 0 or within {}..={} Hz (got {})",
                    name, MIN_RATE_HZ, MAX_RATE_HZ, hz
                ));
            }
        }
        Ok(())
    }
}

fn schedule_period(hz: f64) -> Option<Duration> {
    if !(MIN_RATE_HZ..=MAX_RATE_HZ).contains(&hz) {
        return None;
    }
    Duration::try_from_secs_f64(1.0 / hz).ok()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    NavigationSolution,
    NavigationPerformance,
    Dmi,
    Status,
}

#[derive(Debug, Default)]
pub struct SimulatedSource {
    profile: SimulationProfile,
}

impl SimulatedSource {
    pub fn new(profile: SimulationProfile) -> Self {
        Self { profile }
    }
}

impl PacketSource for SimulatedSource {
    fn name(&self) -> &str {
        "simulated"
    }

    fn connect<'a>(
        &'a mut self,
        endpoint: &'a Endpoint,
    ) -> SourceFuture<'a, Box<dyn PacketTransport>> {
        let transport: Box<dyn PacketTransport> =
            Box::new(SimulatedTransport::new(endpoint.clone(), self.profile.clone()));
        Box::pin(async move { Ok(transport) })
    }
}

/// One simulated connection.
pub struct SimulatedTransport {
    peer: Endpoint,
    profile: SimulationProfile,
    started: Instant,
    schedule: Vec<(Slot, Duration, Instant)>,
    /// Status groups are emitted as a burst; this is the pending remainder.
    status_burst: Vec<DecodedPacket>,
    distance: f64,
}

impl SimulatedTransport {
    fn new(peer: Endpoint, profile: SimulationProfile) -> Self {
        let started = Instant::now();
        let schedule = [
            (Slot::NavigationSolution, profile.navigation_solution_hz),
            (Slot::NavigationPerformance, profile.navigation_performance_hz),
            (Slot::Dmi, profile.dmi_hz),
            (Slot::Status, profile.status_hz),
        ]
        .into_iter()
        .filter(|(_, hz)| *hz != 0.0)
        .filter_map(|(slot, hz)| match schedule_period(hz) {
            Some(period) => Some((slot, period, started)),
            None => {
                warn!("Simulated {:?} rate {} Hz out of range, stream disabled", slot, hz);
                None
            }
        })
        .collect();
        Self {
            peer,
            profile,
            started,
            schedule,
            status_burst: Vec::new(),
            distance: 0.0,
        }
    }

    async fn produce(&mut self) -> DecodedPacket {
        if let Some(packet) = self.status_burst.pop() {
            return packet;
        }
        let Some(idx) = self
            .schedule
            .iter()
            .enumerate()
            .min_by_key(|(_, (_, _, due))| *due)
            .map(|(idx, _)| idx)
        else {
            return std::future::pending().await;
        };

        time::sleep_until(self.schedule[idx].2).await;
        let (slot, period, due) = self.schedule[idx];
        self.schedule[idx].2 = due + period;

        let tag = self.time_tag();
        match slot {
            Slot::NavigationSolution => DecodedPacket::NavigationSolution(self.navigation(tag)),
            Slot::NavigationPerformance => {
                DecodedPacket::NavigationPerformance(NavigationPerformance {
                    time_distance: tag,
                    north_position_rms_error: 0.02,
                    east_position_rms_error: 0.02,
                    down_position_rms_error: 0.05,
                    roll_rms_error: 0.01,
                    pitch_rms_error: 0.01,
                    heading_rms_error: 0.05,
                    ..Default::default()
                })
            }
            Slot::Dmi => {
                self.distance += 0.1;
                DecodedPacket::DmiData(DmiData {
                    time_distance: tag,
                    signed_distance_traveled: self.distance,
                    unsigned_distance_traveled: self.distance,
                    dmi_scale_factor: 1,
                    ..Default::default()
                })
            }
            Slot::Status => {
                let (first, rest) = self.status_packets(tag);
                self.status_burst = rest;
                first
            }
        }
    }

    fn time_tag(&self) -> TimeDistance {
        TimeDistance {
            time1: self.started.elapsed().as_secs_f64(),
            distance_tag: self.distance,
            ..Default::default()
        }
    }

    fn navigation(&self, tag: TimeDistance) -> NavigationSolution {
        // One lap of a ~100 m circle per minute.
        let angle = tag.time1 * std::f64::consts::TAU / 60.0;
        let offset = 0.001;
        NavigationSolution {
            time_distance: tag,
            latitude: self.profile.latitude + offset * angle.sin(),
            longitude: self.profile.longitude + offset * angle.cos(),
            altitude: 408.0,
            heading: (angle.to_degrees() + 90.0).rem_euclid(360.0),
            speed: 10.0,
            alignment_status: self.profile.alignment_status,
            ..Default::default()
        }
    }

    /// Primary GPS status first, the rest in reverse emission order.
    fn status_packets(&self, tag: TimeDistance) -> (DecodedPacket, Vec<DecodedPacket>) {
        let primary = DecodedPacket::PrimaryGpsStatus(GpsStatus {
            time_distance: tag,
            navigation_solution_status: self.profile.primary_gps_status,
            number_of_sv_tracked: 11,
        });
        let rest = vec![
            DecodedPacket::GeneralStatus(GeneralStatus {
                time_distance: tag,
                ..Default::default()
            }),
            DecodedPacket::IinSolution(IinSolution {
                time_distance: tag,
                number_of_satellites: 9,
                processing_status: self.profile.iin_status,
            }),
            DecodedPacket::GamsSolution(GamsSolution {
                time_distance: tag,
                number_of_satellites: 9,
                solution_status: self.profile.gams_status,
            }),
            DecodedPacket::SecondaryGpsStatus(GpsStatus {
                time_distance: tag,
                navigation_solution_status: self.profile.secondary_gps_status,
                number_of_sv_tracked: 9,
            }),
        ];
        (primary, rest)
    }
}

impl PacketTransport for SimulatedTransport {
    fn peer(&self) -> &Endpoint {
        &self.peer
    }

    fn next_packet<'a>(&'a mut self) -> SourceFuture<'a, DecodedPacket> {
        Box::pin(async move { Ok(self.produce().await) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn transport(profile: SimulationProfile) -> Box<dyn PacketTransport> {
        let mut source = SimulatedSource::new(profile);
        match source.connect(&Endpoint::new("sim", 0)).await {
            Ok(transport) => transport,
            Err(e) => panic!("simulated connect failed: {}", e),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_status_burst_covers_every_status_group() {
        let profile = SimulationProfile {
            navigation_solution_hz: 0.0,
            navigation_performance_hz: 0.0,
            dmi_hz: 0.0,
            status_hz: 1.0,
            primary_gps_status: 7,
            ..Default::default()
        };
        let mut transport = transport(profile).await;
        let mut groups = Vec::new();
        for _ in 0..5 {
            groups.push(transport.next_packet().await.unwrap());
        }
        assert!(matches!(
            groups[0],
            DecodedPacket::PrimaryGpsStatus(GpsStatus { navigation_solution_status: 7, .. })
        ));
        let mut ids: Vec<u16> = groups.iter().map(|p| p.group_id()).collect();
        ids.sort();
        assert_eq!(ids, vec![3, 9, 10, 11, 20]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_streams_follow_configured_rates() {
        let profile = SimulationProfile {
            navigation_solution_hz: 10.0,
            navigation_performance_hz: 1.0,
            dmi_hz: 0.0,
            status_hz: 0.0,
            ..Default::default()
        };
        let mut transport = transport(profile).await;
        let started = Instant::now();
        let mut vns = 0;
        let mut vnp = 0;
        loop {
            let packet = transport.next_packet().await.unwrap();
            if started.elapsed() > Duration::from_millis(1_950) {
                break;
            }
            match packet {
                DecodedPacket::NavigationSolution(_) => vns += 1,
                DecodedPacket::NavigationPerformance(_) => vnp += 1,
                other => panic!("unexpected packet {:?}", other),
            }
        }
        // t = 0.0 ..= 1.9 for 10 Hz, t = 0 and 1 for 1 Hz
        assert_eq!(vns, 20);
        assert_eq!(vnp, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_out_of_range_rate_disables_stream() {
        let profile = SimulationProfile {
            navigation_solution_hz: 10.0,
            navigation_performance_hz: f64::NAN,
            dmi_hz: 0.0,
            status_hz: 1e-30,
            ..Default::default()
        };
        let mut transport = transport(profile).await;
        for _ in 0..3 {
            let packet = transport.next_packet().await.unwrap();
            assert!(matches!(packet, DecodedPacket::NavigationSolution(_)));
        }
    }

    #[test]
    fn test_profile_validation() {
        assert!(SimulationProfile::default().validate().is_ok());
        let disabled = SimulationProfile {
            dmi_hz: 0.0,
            ..Default::default()
        };
        assert!(disabled.validate().is_ok());

        for bad in [1e-30, -1.0, f64::NAN, f64::INFINITY, 1e9] {
            let profile = SimulationProfile {
                status_hz: bad,
                ..Default::default()
            };
            let err = profile.validate().unwrap_err();
            assert!(err.contains("status_hz"), "{}", err);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_navigation_solution_carries_alignment() {
        let profile = SimulationProfile {
            alignment_status: 7,
            status_hz: 0.0,
            dmi_hz: 0.0,
            navigation_performance_hz: 0.0,
            ..Default::default()
        };
        let mut transport = transport(profile).await;
        match transport.next_packet().await.unwrap() {
            DecodedPacket::NavigationSolution(vns) => {
                assert_eq!(vns.alignment_status, 7);
                assert!((vns.latitude - 47.3769).abs() < 0.01);
            }
            other => panic!("unexpected packet {:?}", other),
        }
    }
}
