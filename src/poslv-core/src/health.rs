// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Health aggregation.
//!
//! [`HealthAggregator::snapshot`] folds the connection state, the stream
//! monitors and the status tables into one [`HealthReport`]. It only reads
//! its inputs.

use std::collections::BTreeMap;

use serde::Serialize;
use tokio::sync::watch;

use crate::driver::machine::{ConnectionFault, ConnectionMachine, ConnectionState};
use crate::frequency::StreamVerdict;
use crate::packet::StreamKind;
use crate::router::{GeneralStatusWords, PacketRouter};
use crate::source::Endpoint;
use crate::status::{self, Severity, StatusCategory, StatusDescription, GPS_NOT_RECEIVED};

/// Status fields reported by the sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusField {
    Alignment,
    PrimaryGps,
    SecondaryGps,
    Gams,
    Iin,
}

impl StatusField {
    pub fn category(&self) -> StatusCategory {
        match self {
            Self::Alignment => StatusCategory::Alignment,
            Self::PrimaryGps | Self::SecondaryGps => StatusCategory::GpsNavigation,
            Self::Gams => StatusCategory::GamsSolution,
            Self::Iin => StatusCategory::IinSolution,
        }
    }

    /// Label used by operator-facing reports.
    pub fn title(&self) -> &'static str {
        match self {
            Self::Alignment => "Alignment status",
            Self::PrimaryGps => "Navigation status (primary GPS)",
            Self::SecondaryGps => "Navigation status (secondary GPS)",
            Self::Gams => "GAMS solution status",
            Self::Iin => "IIN solution status",
        }
    }
}

/// Interpreted value of one status field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusVerdict {
    /// Raw code, absent until the sensor reported one.
    pub code: Option<i32>,
    pub severity: Severity,
    pub message: &'static str,
    /// False when the code is outside the documented table.
    pub mapped: bool,
}

impl StatusVerdict {
    fn from_description(code: Option<i32>, desc: StatusDescription) -> Self {
        Self {
            code,
            severity: desc.severity,
            message: desc.message,
            mapped: desc.mapped,
        }
    }
}

/// Connection part of the report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConnectionHealth {
    pub state: String,
    pub severity: Severity,
    pub message: String,
    pub endpoint: Option<Endpoint>,
    pub reconnects: u64,
    pub last_fault: Option<ConnectionFault>,
}

/// Aggregated diagnostics, rebuilt on every loop iteration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthReport {
    /// Evaluation time in seconds since the Unix epoch.
    pub generated_at: f64,
    pub overall: Severity,
    pub connection: ConnectionHealth,
    pub frequency: BTreeMap<StreamKind, StreamVerdict>,
    pub status: BTreeMap<StatusField, StatusVerdict>,
    pub general_status: Option<GeneralStatusWords>,
    pub counters: BTreeMap<&'static str, u64>,
    pub last_clock_fault: Option<String>,
}

impl HealthReport {
    /// Codes that fell outside their tables, as (field, code).
    pub fn unmapped_status_codes(&self) -> Vec<(StatusField, i32)> {
        self.status
            .iter()
            .filter(|(_, verdict)| !verdict.mapped)
            .filter_map(|(field, verdict)| verdict.code.map(|code| (*field, code)))
            .collect()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct HealthAggregator;

impl HealthAggregator {
    /// Build a report from the current state, evaluated at `now`.
    pub fn snapshot(
        &self,
        machine: &ConnectionMachine,
        last_fault: Option<&ConnectionFault>,
        router: &PacketRouter,
        now: f64,
    ) -> HealthReport {
        let connection = connection_health(machine, last_fault);

        let frequency: BTreeMap<StreamKind, StreamVerdict> = router
            .monitors()
            .map(|monitor| (monitor.stream(), monitor.verdict_at(now)))
            .collect();

        let snapshot = router.status();
        let mut status = BTreeMap::new();
        status.insert(
            StatusField::Alignment,
            optional_verdict(StatusField::Alignment, snapshot.alignment.map(i32::from)),
        );
        status.insert(
            StatusField::PrimaryGps,
            gps_verdict(StatusField::PrimaryGps, snapshot.primary_gps),
        );
        status.insert(
            StatusField::SecondaryGps,
            gps_verdict(StatusField::SecondaryGps, snapshot.secondary_gps),
        );
        status.insert(
            StatusField::Gams,
            optional_verdict(StatusField::Gams, snapshot.gams.map(i32::from)),
        );
        status.insert(
            StatusField::Iin,
            optional_verdict(StatusField::Iin, snapshot.iin.map(i32::from)),
        );

        let overall = std::iter::once(connection.severity)
            .chain(frequency.values().map(|v| v.severity))
            .chain(status.values().map(|v| v.severity))
            .max()
            .unwrap_or_default();

        HealthReport {
            generated_at: now,
            overall,
            connection,
            frequency,
            status,
            general_status: snapshot.general,
            counters: router.counters().clone(),
            last_clock_fault: router.last_clock_fault().map(|e| e.to_string()),
        }
    }
}

fn connection_health(
    machine: &ConnectionMachine,
    last_fault: Option<&ConnectionFault>,
) -> ConnectionHealth {
    let state = machine.state();
    let (severity, message) = match state {
        ConnectionState::Connected { endpoint, .. } => {
            (Severity::Ok, format!("Connection opened on {}", endpoint))
        }
        ConnectionState::Connecting { endpoint, .. } => {
            (Severity::Error, format!("Connecting to {}", endpoint))
        }
        ConnectionState::Failed { fault, attempt } => (
            Severity::Error,
            format!("Connection closed ({} consecutive failures): {}", attempt, fault.message),
        ),
        ConnectionState::Disconnected => (Severity::Error, "Connection closed".to_string()),
    };
    ConnectionHealth {
        state: state.to_string(),
        severity,
        message,
        endpoint: state
            .is_connected()
            .then(|| state.endpoint().cloned())
            .flatten(),
        reconnects: machine.reconnect_count(),
        last_fault: last_fault.cloned(),
    }
}

fn gps_verdict(field: StatusField, code: i8) -> StatusVerdict {
    let code = i32::from(code);
    let desc = status::describe(field.category(), code);
    let code = (code != i32::from(GPS_NOT_RECEIVED)).then_some(code);
    StatusVerdict::from_description(code, desc)
}

fn optional_verdict(field: StatusField, code: Option<i32>) -> StatusVerdict {
    match code {
        Some(code) => StatusVerdict::from_description(Some(code), status::describe(field.category(), code)),
        None => StatusVerdict::from_description(None, status::unknown()),
    }
}

/// Read side of the published health report.
#[derive(Debug, Clone)]
pub struct HealthHandle {
    rx: watch::Receiver<HealthReport>,
}

impl HealthHandle {
    pub fn new(rx: watch::Receiver<HealthReport>) -> Self {
        Self { rx }
    }

    /// Latest report; never more than one loop iteration stale.
    pub fn get_health_report(&self) -> HealthReport {
        self.rx.borrow().clone()
    }
}
