// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Decoded packet types.
//!
//! These are the typed groups produced by a packet decoder. Only the groups
//! the driver acts on are modeled; everything else arrives as
//! [`DecodedPacket::Unrecognized`] carrying its group number.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Group numbers as assigned by the sensor's output protocol.
pub mod group {
    pub const NAVIGATION_SOLUTION: u16 = 1;
    pub const NAVIGATION_PERFORMANCE: u16 = 2;
    pub const PRIMARY_GPS_STATUS: u16 = 3;
    pub const GAMS_SOLUTION: u16 = 9;
    pub const GENERAL_STATUS: u16 = 10;
    pub const SECONDARY_GPS_STATUS: u16 = 11;
    pub const DMI_DATA: u16 = 15;
    pub const IIN_SOLUTION: u16 = 20;
}

/// Time and distance tag shared by every group.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeDistance {
    pub time1: f64,
    pub time2: f64,
    pub distance_tag: f64,
    pub time_type: u8,
    pub distance_type: u8,
}

/// Vehicle navigation solution (group 1).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NavigationSolution {
    pub time_distance: TimeDistance,
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
    pub north_velocity: f32,
    pub east_velocity: f32,
    pub down_velocity: f32,
    pub roll: f64,
    pub pitch: f64,
    pub heading: f64,
    pub wander_angle: f64,
    pub track_angle: f32,
    pub speed: f32,
    pub angular_rate_long: f32,
    pub angular_rate_trans: f32,
    pub angular_rate_down: f32,
    pub acc_long: f32,
    pub acc_trans: f32,
    pub acc_down: f32,
    pub alignment_status: u8,
}

/// Vehicle navigation performance (group 2).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NavigationPerformance {
    pub time_distance: TimeDistance,
    pub north_position_rms_error: f32,
    pub east_position_rms_error: f32,
    pub down_position_rms_error: f32,
    pub north_velocity_rms_error: f32,
    pub east_velocity_rms_error: f32,
    pub down_velocity_rms_error: f32,
    pub roll_rms_error: f32,
    pub pitch_rms_error: f32,
    pub heading_rms_error: f32,
    pub error_ellipsoid_semi_major: f32,
    pub error_ellipsoid_semi_minor: f32,
    pub error_ellipsoid_orientation: f32,
}

/// Time-tagged DMI data (group 15).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DmiData {
    pub time_distance: TimeDistance,
    pub signed_distance_traveled: f64,
    pub unsigned_distance_traveled: f64,
    pub dmi_scale_factor: u16,
    pub data_status: u8,
    pub dmi_type: u8,
    pub dmi_data_rate: u8,
}

/// Primary or secondary GPS receiver status (groups 3 and 11).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GpsStatus {
    pub time_distance: TimeDistance,
    pub navigation_solution_status: i8,
    pub number_of_sv_tracked: u8,
}

/// GAMS solution status (group 9).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GamsSolution {
    pub time_distance: TimeDistance,
    pub number_of_satellites: u8,
    pub solution_status: u8,
}

/// IIN solution status (group 20).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IinSolution {
    pub time_distance: TimeDistance,
    pub number_of_satellites: u8,
    pub processing_status: u8,
}

/// General and FDIR status words (group 10).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralStatus {
    pub time_distance: TimeDistance,
    pub general_status_a: u32,
    pub general_status_b: u32,
    pub general_status_c: u32,
    pub fdir_level1_status: u32,
    pub fdir_level2_status: u16,
    pub fdir_level4_status: u16,
    pub fdir_level5_status: u16,
}

/// One decoded unit of sensor telemetry or status.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedPacket {
    NavigationSolution(NavigationSolution),
    NavigationPerformance(NavigationPerformance),
    DmiData(DmiData),
    PrimaryGpsStatus(GpsStatus),
    SecondaryGpsStatus(GpsStatus),
    GamsSolution(GamsSolution),
    IinSolution(IinSolution),
    GeneralStatus(GeneralStatus),
    /// A group the driver does not model yet.
    Unrecognized { group_id: u16 },
}

impl DecodedPacket {
    pub fn group_id(&self) -> u16 {
        match self {
            Self::NavigationSolution(_) => group::NAVIGATION_SOLUTION,
            Self::NavigationPerformance(_) => group::NAVIGATION_PERFORMANCE,
            Self::DmiData(_) => group::DMI_DATA,
            Self::PrimaryGpsStatus(_) => group::PRIMARY_GPS_STATUS,
            Self::SecondaryGpsStatus(_) => group::SECONDARY_GPS_STATUS,
            Self::GamsSolution(_) => group::GAMS_SOLUTION,
            Self::IinSolution(_) => group::IIN_SOLUTION,
            Self::GeneralStatus(_) => group::GENERAL_STATUS,
            Self::Unrecognized { group_id } => *group_id,
        }
    }

    /// Stable label used as the counter key for this packet.
    pub fn label(&self) -> &'static str {
        match self {
            Self::NavigationSolution(_) => "navigation_solution",
            Self::NavigationPerformance(_) => "navigation_performance",
            Self::DmiData(_) => "dmi_data",
            Self::PrimaryGpsStatus(_) => "primary_gps_status",
            Self::SecondaryGpsStatus(_) => "secondary_gps_status",
            Self::GamsSolution(_) => "gams_solution",
            Self::IinSolution(_) => "iin_solution",
            Self::GeneralStatus(_) => "general_status",
            Self::Unrecognized { .. } => "unhandled",
        }
    }
}

/// Packet categories whose arrival rate is monitored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamKind {
    NavigationSolution,
    NavigationPerformance,
    DmiData,
}

impl StreamKind {
    pub const ALL: [StreamKind; 3] = [
        StreamKind::NavigationSolution,
        StreamKind::NavigationPerformance,
        StreamKind::DmiData,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NavigationSolution => "navigation_solution",
            Self::NavigationPerformance => "navigation_performance",
            Self::DmiData => "dmi_data",
        }
    }
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
