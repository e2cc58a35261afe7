// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Connection supervisor.
//!
//! Owns the transport and drives connect, read and reconnect on a single
//! task. Every iteration ends with one health refresh published through a
//! watch channel.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::sync::watch;
use tokio::time;
use tracing::{debug, info, warn};

use crate::driver::machine::{ConnectionEvent, ConnectionFault, ConnectionMachine, ConnectionState};
use crate::driver::policies::RetryPolicy;
use crate::error::SourceError;
use crate::health::{HealthAggregator, HealthHandle, HealthReport};
use crate::router::{PacketRouter, RouteOutcome, StreamBounds};
use crate::sink::EventSink;
use crate::source::{Endpoint, PacketSource, PacketTransport};

/// Wall clock in seconds since the Unix epoch.
pub type Clock = Arc<dyn Fn() -> f64 + Send + Sync>;

/// Wall time sampled once, then advanced by the monotonic runtime clock so
/// stamps never step backwards.
pub fn system_clock() -> Clock {
    let epoch = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0);
    let base = time::Instant::now();
    Arc::new(move || epoch + base.elapsed().as_secs_f64())
}

/// Configuration for the supervisor loop.
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    pub endpoint: Endpoint,
    pub frame_id: String,
    /// Upper bound for a single read; expiry means "no packet this iteration".
    pub read_timeout: Duration,
    pub connect_timeout: Duration,
    pub bounds: StreamBounds,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            endpoint: Endpoint::new("129.132.39.171", 5602),
            frame_id: "vehicle_base_link".to_string(),
            read_timeout: Duration::from_secs(1),
            connect_timeout: Duration::from_secs(5),
            bounds: StreamBounds::default(),
        }
    }
}

/// What a single iteration did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Connected,
    ConnectFailed,
    Packet(RouteOutcome),
    Timeout,
    ReadFailed,
    Shutdown,
}

pub struct ConnectionSupervisor {
    config: SupervisorConfig,
    source: Box<dyn PacketSource>,
    retry: Box<dyn RetryPolicy>,
    machine: ConnectionMachine,
    router: PacketRouter,
    transport: Option<Box<dyn PacketTransport>>,
    last_fault: Option<ConnectionFault>,
    clock: Clock,
    health_tx: watch::Sender<HealthReport>,
}

impl ConnectionSupervisor {
    pub fn new(
        config: SupervisorConfig,
        source: Box<dyn PacketSource>,
        retry: Box<dyn RetryPolicy>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        Self::with_clock(config, source, retry, sink, system_clock())
    }

    pub fn with_clock(
        config: SupervisorConfig,
        source: Box<dyn PacketSource>,
        retry: Box<dyn RetryPolicy>,
        sink: Arc<dyn EventSink>,
        clock: Clock,
    ) -> Self {
        let router = PacketRouter::new(config.frame_id.clone(), &config.bounds, sink);
        let machine = ConnectionMachine::new();
        let initial = HealthAggregator.snapshot(&machine, None, &router, clock());
        let (health_tx, _) = watch::channel(initial);
        Self {
            config,
            source,
            retry,
            machine,
            router,
            transport: None,
            last_fault: None,
            clock,
            health_tx,
        }
    }

    pub fn health_handle(&self) -> HealthHandle {
        HealthHandle::new(self.health_tx.subscribe())
    }

    pub fn state(&self) -> &ConnectionState {
        self.machine.state()
    }

    pub fn machine(&self) -> &ConnectionMachine {
        &self.machine
    }

    pub fn router(&self) -> &PacketRouter {
        &self.router
    }

    pub fn last_fault(&self) -> Option<&ConnectionFault> {
        self.last_fault.as_ref()
    }

    /// Run until `shutdown` turns true or its sender is dropped.
    ///
    /// Internal errors never end the loop.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) {
        info!(
            "Supervising {} via {} source",
            self.config.endpoint,
            self.source.name()
        );
        loop {
            if *shutdown.borrow() {
                break;
            }
            if self.step(&mut shutdown).await == StepOutcome::Shutdown {
                break;
            }
            tokio::task::yield_now().await;
        }
        self.close();
        self.refresh_health();
        info!("Connection supervisor stopped");
    }

    /// One loop iteration: connect or read once, then refresh health.
    pub async fn step(&mut self, shutdown: &mut watch::Receiver<bool>) -> StepOutcome {
        let outcome = if self.transport.is_some() {
            self.read(shutdown).await
        } else {
            self.connect(shutdown).await
        };
        self.refresh_health();
        outcome
    }

    async fn connect(&mut self, shutdown: &mut watch::Receiver<bool>) -> StepOutcome {
        let endpoint = self.config.endpoint.clone();
        self.transition(ConnectionEvent::ConnectAttempt(endpoint.clone()));
        debug!("Connecting to {}", endpoint);

        let connect_timeout = self.config.connect_timeout;
        let result = tokio::select! {
            res = time::timeout(connect_timeout, self.source.connect(&endpoint)) => res,
            _ = shutdown.wait_for(|stop| *stop) => return StepOutcome::Shutdown,
        };
        let result = result.unwrap_or_else(|_| {
            Err(SourceError::connect(
                &endpoint,
                format!("timed out after {:?}", connect_timeout),
            ))
        });

        match result {
            Ok(transport) => {
                info!("Connection opened on {}", transport.peer());
                self.transport = Some(transport);
                self.transition(ConnectionEvent::Connected(endpoint));
                StepOutcome::Connected
            }
            Err(e) => {
                if self.fail(e, shutdown).await {
                    StepOutcome::Shutdown
                } else {
                    StepOutcome::ConnectFailed
                }
            }
        }
    }

    async fn read(&mut self, shutdown: &mut watch::Receiver<bool>) -> StepOutcome {
        let Some(transport) = self.transport.as_mut() else {
            return StepOutcome::Timeout;
        };
        let read_timeout = self.config.read_timeout;
        let result = tokio::select! {
            res = time::timeout(read_timeout, transport.next_packet()) => res,
            _ = shutdown.wait_for(|stop| *stop) => return StepOutcome::Shutdown,
        };

        match result {
            Err(_) => {
                debug!("No packet within {:?}", read_timeout);
                StepOutcome::Timeout
            }
            Ok(Ok(packet)) => {
                debug!("Received group {}", packet.group_id());
                let now = (self.clock)();
                StepOutcome::Packet(self.router.route(packet, now))
            }
            Ok(Err(e)) => {
                if self.fail(e, shutdown).await {
                    StepOutcome::Shutdown
                } else {
                    StepOutcome::ReadFailed
                }
            }
        }
    }

    /// Record a fault, drop the transport and wait out the retry delay.
    /// Returns true when shutdown was requested during the wait.
    async fn fail(&mut self, err: SourceError, shutdown: &mut watch::Receiver<bool>) -> bool {
        if self.transport.take().is_some() {
            info!("Connection to {} closed", self.config.endpoint);
        }
        let fault = ConnectionFault::from(&err);
        self.transition(ConnectionEvent::Fault(fault.clone()));
        self.last_fault = Some(fault);

        let failures = match self.machine.state() {
            ConnectionState::Failed { attempt, .. } => *attempt,
            _ => 1,
        };
        let delay = self.retry.delay(failures);
        warn!("{} (failure {}), retrying in {:?}", err, failures, delay);
        self.refresh_health();

        tokio::select! {
            _ = time::sleep(delay) => false,
            _ = shutdown.wait_for(|stop| *stop) => true,
        }
    }

    fn close(&mut self) {
        if self.transport.take().is_some() {
            info!("Closing connection to {}", self.config.endpoint);
        }
        self.transition(ConnectionEvent::Disconnected);
    }

    fn transition(&mut self, event: ConnectionEvent) {
        if self.machine.process_event(event) {
            debug!("Connection state -> {}", self.machine.state());
        }
    }

    fn refresh_health(&self) {
        let report = HealthAggregator.snapshot(
            &self.machine,
            self.last_fault.as_ref(),
            &self.router,
            (self.clock)(),
        );
        self.health_tx.send_replace(report);
    }
}
