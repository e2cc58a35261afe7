// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Driver task: builds the connection supervisor and runs it.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::info;

use poslv_backend::{RegistrationContext, SourceAccess};
use poslv_core::driver::{ConnectionSupervisor, RetryPolicy, SupervisorConfig};
use poslv_core::{DynResult, EventSink};

/// Configuration for the driver task.
pub struct DriverTaskConfig {
    pub registry: Arc<RegistrationContext>,
    pub backend: String,
    pub access: SourceAccess,
    pub supervisor: SupervisorConfig,
    pub retry: Box<dyn RetryPolicy>,
}

/// Instantiate the packet source and wrap it in a supervisor.
pub fn build_supervisor(
    config: DriverTaskConfig,
    sink: Arc<dyn EventSink>,
) -> DynResult<ConnectionSupervisor> {
    let source = config
        .registry
        .build_source(&config.backend, &config.access)?;
    info!(
        "Packet source {} for {} (frame {})",
        source.name(),
        config.supervisor.endpoint,
        config.supervisor.frame_id
    );
    Ok(ConnectionSupervisor::new(
        config.supervisor,
        source,
        config.retry,
        sink,
    ))
}

/// Run the supervisor until shutdown.
pub async fn run_driver_task(
    mut supervisor: ConnectionSupervisor,
    shutdown_rx: watch::Receiver<bool>,
) {
    supervisor.run(shutdown_rx).await;
    let router = supervisor.router();
    info!(
        "Driver task stopped after {} connects, counters: {:?}",
        supervisor.machine().reconnect_count() + 1,
        router.counters()
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    use poslv_backend::{register_builtin_sources_on, SimulationProfile};
    use poslv_core::driver::FixedDelay;
    use poslv_core::health::StatusField;
    use poslv_core::sink::NullSink;
    use poslv_core::{Endpoint, Severity, StreamKind};

    fn registry() -> Arc<RegistrationContext> {
        let mut registry = RegistrationContext::new();
        register_builtin_sources_on(&mut registry);
        Arc::new(registry)
    }

    fn config(backend: &str) -> DriverTaskConfig {
        DriverTaskConfig {
            registry: registry(),
            backend: backend.to_string(),
            access: SourceAccess {
                simulation: SimulationProfile {
                    navigation_solution_hz: 50.0,
                    navigation_performance_hz: 1.0,
                    dmi_hz: 20.0,
                    status_hz: 1.0,
                    primary_gps_status: 7,
                    ..Default::default()
                },
            },
            supervisor: SupervisorConfig {
                endpoint: Endpoint::new("simulator", 0),
                ..Default::default()
            },
            retry: Box::new(FixedDelay::default()),
        }
    }

    #[test]
    fn test_unknown_backend_fails_to_build() {
        let err = match build_supervisor(config("serial"), Arc::new(NullSink)) {
            Ok(_) => panic!("built a supervisor for an unknown backend"),
            Err(e) => e,
        };
        assert!(err.to_string().contains("serial"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_simulated_backend_drives_health_report() {
        let supervisor = build_supervisor(config("simulated"), Arc::new(NullSink)).unwrap();
        let handle = supervisor.health_handle();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(run_driver_task(supervisor, shutdown_rx));

        tokio::time::sleep(Duration::from_millis(2_500)).await;
        let report = handle.get_health_report();
        assert_eq!(report.connection.severity, Severity::Ok);
        assert_eq!(
            report.frequency[&StreamKind::NavigationSolution].severity,
            Severity::Ok
        );
        assert_eq!(
            report.status[&StatusField::PrimaryGps].message,
            "Integer narrow lane RTK mode"
        );
        assert_eq!(report.status[&StatusField::Alignment].message, "Full navigation");
        assert!(report.counters["navigation_solution"] > 50);

        shutdown_tx.send(true).unwrap();
        task.await.unwrap();
        assert_eq!(handle.get_health_report().connection.state, "Disconnected");
    }
}
