// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! JSON-lines publisher for poslv-server.
//!
//! Every published event and every periodic health report is serialized
//! once and fanned out to all connected TCP subscribers. Slow subscribers
//! skip lines instead of blocking the driver.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, watch};
use tokio::time;
use tracing::{debug, error, info, warn};

use poslv_core::health::HealthHandle;
use poslv_core::{Event, EventSink, HealthReport, Severity};

/// One line on the wire.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundMessage<'a> {
    Event(&'a Event),
    Health(&'a HealthReport),
}

impl OutboundMessage<'_> {
    fn to_line(&self) -> Result<Arc<str>, serde_json::Error> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(Arc::from(line))
    }
}

/// [`EventSink`] that forwards events to the broadcast channel.
#[derive(Debug, Clone)]
pub struct BroadcastSink {
    tx: broadcast::Sender<Arc<str>>,
}

impl BroadcastSink {
    pub fn new(tx: broadcast::Sender<Arc<str>>) -> Self {
        Self { tx }
    }
}

impl EventSink for BroadcastSink {
    fn publish(&self, event: Event) {
        match OutboundMessage::Event(&event).to_line() {
            // no subscribers is not an error
            Ok(line) => {
                let _ = self.tx.send(line);
            }
            Err(e) => warn!("Failed to serialize {} event: {}", event.kind, e),
        }
    }
}

/// Publish the health report every `interval` until shutdown.
///
/// Changes of the overall severity are logged.
pub async fn run_health_ticker(
    health: HealthHandle,
    tx: broadcast::Sender<Arc<str>>,
    interval: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut ticker = time::interval(interval);
    ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);
    let mut last_overall: Option<Severity> = None;

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = shutdown_rx.wait_for(|stop| *stop) => break,
        }

        let report = health.get_health_report();
        if last_overall != Some(report.overall) {
            log_overall(&report);
            last_overall = Some(report.overall);
        }
        for (field, code) in report.unmapped_status_codes() {
            debug!("No mapping for {} code {}", field.title(), code);
        }
        match OutboundMessage::Health(&report).to_line() {
            Ok(line) => {
                let _ = tx.send(line);
            }
            Err(e) => warn!("Failed to serialize health report: {}", e),
        }
    }
}

fn log_overall(report: &HealthReport) {
    let degraded: Vec<String> = report
        .frequency
        .iter()
        .filter(|(_, v)| v.severity != Severity::Ok)
        .map(|(stream, v)| format!("{}: {}", stream, v.message))
        .chain(
            report
                .status
                .iter()
                .filter(|(_, v)| v.severity != Severity::Ok)
                .map(|(field, v)| format!("{}: {}", field.title(), v.message)),
        )
        .collect();
    match report.overall {
        Severity::Ok => info!("Health OK ({})", report.connection.message),
        Severity::Warn => warn!("Health degraded: {}", degraded.join("; ")),
        Severity::Error => warn!(
            "Health error ({}): {}",
            report.connection.message,
            degraded.join("; ")
        ),
    }
}

/// Run the JSON-lines TCP publisher, accepting subscriber connections.
pub async fn run_publisher(
    addr: SocketAddr,
    tx: broadcast::Sender<Arc<str>>,
    shutdown_rx: watch::Receiver<bool>,
) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!("Publishing on {}", addr);
    serve(listener, tx, shutdown_rx).await
}

async fn serve(
    listener: TcpListener,
    tx: broadcast::Sender<Arc<str>>,
    mut shutdown_rx: watch::Receiver<bool>,
) -> std::io::Result<()> {
    loop {
        let (socket, peer) = tokio::select! {
            accepted = listener.accept() => accepted?,
            _ = shutdown_rx.wait_for(|stop| *stop) => break,
        };
        info!("Subscriber connected: {}", peer);

        let rx = tx.subscribe();
        let client_shutdown = shutdown_rx.clone();
        tokio::spawn(async move {
            if let Err(e) = handle_subscriber(socket, peer, rx, client_shutdown).await {
                error!("Subscriber {} error: {:?}", peer, e);
            }
        });
    }
    info!("Publisher shutting down");
    Ok(())
}

async fn handle_subscriber(
    mut socket: TcpStream,
    peer: SocketAddr,
    mut rx: broadcast::Receiver<Arc<str>>,
    mut shutdown_rx: watch::Receiver<bool>,
) -> std::io::Result<()> {
    loop {
        let line = tokio::select! {
            msg = rx.recv() => msg,
            _ = shutdown_rx.wait_for(|stop| *stop) => break,
        };
        match line {
            Ok(line) => {
                if let Err(e) = socket.write_all(line.as_bytes()).await {
                    if matches!(
                        e.kind(),
                        std::io::ErrorKind::BrokenPipe | std::io::ErrorKind::ConnectionReset
                    ) {
                        info!("Subscriber {} disconnected", peer);
                        return Ok(());
                    }
                    return Err(e);
                }
            }
            Err(broadcast::error::RecvError::Lagged(n)) => {
                warn!("Subscriber {} lagged, skipped {} lines", peer, n);
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
    socket.shutdown().await.ok();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use tokio::io::{AsyncBufReadExt, BufReader};

    use poslv_core::packet::{NavigationSolution, StreamKind};
    use poslv_core::sink::EventPayload;

    fn event() -> Event {
        Event {
            kind: StreamKind::NavigationSolution,
            stamp: 1_700_000_000.25,
            frame_id: "vehicle_base_link".to_string(),
            payload: EventPayload::NavigationSolution(NavigationSolution {
                latitude: 47.3769,
                ..Default::default()
            }),
        }
    }

    #[test]
    fn test_event_line_format() {
        let (tx, mut rx) = broadcast::channel(8);
        BroadcastSink::new(tx).publish(event());
        let line = rx.try_recv().unwrap();
        assert!(line.ends_with('\n'));

        let value: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value["type"], "event");
        assert_eq!(value["kind"], "navigation_solution");
        assert_eq!(value["frame_id"], "vehicle_base_link");
        assert_eq!(value["payload"]["latitude"], 47.3769);
    }

    #[test]
    fn test_publish_without_subscribers_is_silent() {
        let (tx, rx) = broadcast::channel::<Arc<str>>(8);
        drop(rx);
        BroadcastSink::new(tx).publish(event());
    }

    #[tokio::test]
    async fn test_subscriber_receives_published_lines() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, _) = broadcast::channel(16);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let server = tokio::spawn(serve(listener, tx.clone(), shutdown_rx));

        let stream = TcpStream::connect(addr).await.unwrap();
        let mut lines = BufReader::new(stream).lines();

        // the subscription is created after accept; retry until it exists
        let sink = BroadcastSink::new(tx.clone());
        while tx.receiver_count() == 0 {
            tokio::task::yield_now().await;
        }
        sink.publish(event());

        let line = lines.next_line().await.unwrap().unwrap();
        let value: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value["type"], "event");
        assert_eq!(value["stamp"], 1_700_000_000.25);

        shutdown_tx.send(true).unwrap();
        server.await.unwrap().unwrap();
        assert_eq!(lines.next_line().await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_health_ticker_emits_reports() {
        use poslv_core::driver::machine::ConnectionMachine;
        use poslv_core::router::PacketRouter;
        use poslv_core::sink::NullSink;
        use poslv_core::{HealthAggregator, StreamBounds};

        let router = PacketRouter::new("base", &StreamBounds::default(), Arc::new(NullSink));
        let report = HealthAggregator.snapshot(&ConnectionMachine::new(), None, &router, 0.0);
        let (_health_tx, health_rx) = watch::channel(report);

        let (tx, mut rx) = broadcast::channel(16);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let ticker = tokio::spawn(run_health_ticker(
            HealthHandle::new(health_rx),
            tx,
            Duration::from_secs(1),
            shutdown_rx,
        ));

        for _ in 0..2 {
            let line = rx.recv().await.unwrap();
            let value: serde_json::Value = serde_json::from_str(&line).unwrap();
            assert_eq!(value["type"], "health");
            assert_eq!(value["overall"], "error");
            assert_eq!(value["status"]["primary_gps"]["message"], "Unknown");
        }

        shutdown_tx.send(true).unwrap();
        ticker.await.unwrap();
    }
}
