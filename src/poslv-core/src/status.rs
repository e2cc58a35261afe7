// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Status code interpretation tables.
//!
//! Each table maps the small integer enumerations reported by the sensor to
//! an operator-facing severity and description. Lookups are total: codes
//! outside a table resolve to an `Error` fallback instead of failing.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Health verdict level. Ordered so that `max` yields the worst verdict.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Ok,
    Warn,
    Error,
}

impl Severity {
    /// Returns a short symbol for display.
    pub fn symbol(&self) -> &'static str {
        match self {
            Severity::Ok => "OK",
            Severity::Warn => "WARN",
            Severity::Error => "ERROR",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Status tables known to the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusCategory {
    /// Inertial alignment state carried in the navigation solution.
    Alignment,
    /// Navigation solution mode of a GPS receiver.
    GpsNavigation,
    /// GNSS azimuth measurement subsystem solution status.
    GamsSolution,
    /// Integrated inertial navigation processing status.
    IinSolution,
}

impl fmt::Display for StatusCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Alignment => "alignment",
            Self::GpsNavigation => "GPS navigation",
            Self::GamsSolution => "GAMS solution",
            Self::IinSolution => "IIN solution",
        };
        f.write_str(name)
    }
}

/// Result of a table lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatusDescription {
    pub severity: Severity,
    pub message: &'static str,
    /// False when the code was outside the documented table.
    pub mapped: bool,
}

impl StatusDescription {
    const fn mapped(severity: Severity, message: &'static str) -> Self {
        Self {
            severity,
            message,
            mapped: true,
        }
    }

    const fn unmapped() -> Self {
        Self {
            severity: Severity::Error,
            message: UNMAPPED_MESSAGE,
            mapped: false,
        }
    }
}

/// Raised by [`describe_checked`] for codes no table documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("no mapping for {category} status code {code}")]
pub struct UnmappedStatusCode {
    pub category: StatusCategory,
    pub code: i32,
}

pub const UNMAPPED_MESSAGE: &str = "No mapping for status code";

/// Sentinel for a GPS navigation mode that has not been received yet.
pub const GPS_NOT_RECEIVED: i8 = -1;

use Severity::{Error as E, Ok as O, Warn as W};

static ALIGNMENT: [(Severity, &str); 9] = [
    (O, "Full navigation"),
    (W, "Fine alignment is active"),
    (W, "GC CHI 2"),
    (W, "PC CHI 2"),
    (W, "GC CHI 1"),
    (W, "PC CHI 1"),
    (W, "Coarse leveling is active"),
    (W, "Initial solution assigned"),
    (E, "No valid solution"),
];

// Indexed by code + 1; -1 means nothing received yet.
static GPS_NAVIGATION: [(Severity, &str); 10] = [
    (E, "Unknown"),
    (E, "No data from receiver"),
    (W, "Horizontal C/A mode"),
    (W, "3-dimension C/A mode"),
    (W, "Horizontal DGPS mode"),
    (W, "3-dimension DGPS mode"),
    (W, "Float RTK mode"),
    (W, "Integer wide lane RTK mode"),
    (E, "Integer narrow lane RTK mode"),
    (E, "P-Code"),
];

static GAMS_SOLUTION: [(Severity, &str); 8] = [
    (O, "Fixed integer"),
    (O, "Fixed integer test install data"),
    (W, "Degraded fixed integer"),
    (W, "Floated ambiguity"),
    (W, "Degraded floated ambiguity"),
    (W, "Solution without install data"),
    (W, "Solution from navigator attitude and install data"),
    (E, "No solution"),
];

// Indexed by code - 1; the IIN table starts at 1.
static IIN_SOLUTION: [(Severity, &str); 8] = [
    (O, "Fixed narrow lane RTK"),
    (O, "Fixed wide lane RTK"),
    (W, "Float RTK"),
    (W, "Code DGPS"),
    (W, "RTCM DGPS"),
    (W, "Autonomous (C/A)"),
    (W, "GNSS navigation solution"),
    (E, "No solution"),
];

fn table(category: StatusCategory) -> (&'static [(Severity, &'static str)], i32) {
    match category {
        StatusCategory::Alignment => (&ALIGNMENT[..], 0),
        StatusCategory::GpsNavigation => (&GPS_NAVIGATION[..], -1),
        StatusCategory::GamsSolution => (&GAMS_SOLUTION[..], 0),
        StatusCategory::IinSolution => (&IIN_SOLUTION[..], 1),
    }
}

/// Look up a status code, failing for codes outside the table.
pub fn describe_checked(
    category: StatusCategory,
    code: i32,
) -> Result<StatusDescription, UnmappedStatusCode> {
    let (entries, first) = table(category);
    code.checked_sub(first)
        .and_then(|idx| usize::try_from(idx).ok())
        .and_then(|idx| entries.get(idx))
        .map(|(severity, message)| StatusDescription::mapped(*severity, *message))
        .ok_or(UnmappedStatusCode { category, code })
}

/// Look up a status code. Undocumented codes yield the `Error` fallback.
pub fn describe(category: StatusCategory, code: i32) -> StatusDescription {
    describe_checked(category, code).unwrap_or_else(|_| StatusDescription::unmapped())
}

/// Description for a category whose status has never been reported.
pub fn unknown() -> StatusDescription {
    StatusDescription::mapped(Severity::Error, "Unknown")
}
