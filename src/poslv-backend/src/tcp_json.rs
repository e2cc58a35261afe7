// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! TCP source speaking newline-delimited JSON frames.

use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::net::TcpStream;
use tracing::debug;

use poslv_core::source::SourceFuture;
use poslv_core::{DecodedPacket, Endpoint, PacketSource, PacketTransport, SourceError};

use crate::codec::decode_line;

/// Longest frame accepted before the stream is considered corrupt.
const MAX_FRAME_LEN: usize = 64 * 1024;

#[derive(Debug, Default)]
pub struct TcpJsonSource;

impl TcpJsonSource {
    pub fn new() -> Self {
        Self
    }
}

impl PacketSource for TcpJsonSource {
    fn name(&self) -> &str {
        "tcp-json"
    }

    fn connect<'a>(
        &'a mut self,
        endpoint: &'a Endpoint,
    ) -> SourceFuture<'a, Box<dyn PacketTransport>> {
        Box::pin(async move {
            let stream = TcpStream::connect((endpoint.host.as_str(), endpoint.port))
                .await
                .map_err(|e| SourceError::connect(endpoint, e.to_string()))?;
            if let Err(e) = stream.set_nodelay(true) {
                debug!("Failed to set TCP_NODELAY on {}: {}", endpoint, e);
            }
            let transport: Box<dyn PacketTransport> = Box::new(TcpJsonTransport {
                peer: endpoint.clone(),
                reader: BufReader::new(stream),
                buf: Vec::new(),
            });
            Ok(transport)
        })
    }
}

struct TcpJsonTransport {
    peer: Endpoint,
    reader: BufReader<TcpStream>,
    /// Bytes of the frame being assembled; survives cancelled reads.
    buf: Vec<u8>,
}

impl TcpJsonTransport {
    async fn read_frame(&mut self) -> Result<DecodedPacket, SourceError> {
        loop {
            // one byte past the cap is enough to detect an oversized frame
            let budget = (MAX_FRAME_LEN + 1).saturating_sub(self.buf.len()) as u64;
            let n = (&mut self.reader)
                .take(budget)
                .read_until(b'\n', &mut self.buf)
                .await
                .map_err(|e| SourceError::stream_io(e.to_string()))?;
            if n == 0 {
                let pending = self.buf.len();
                self.buf.clear();
                return Err(SourceError::stream_io(if pending > 0 {
                    format!("connection closed mid-frame ({} bytes pending)", pending)
                } else {
                    "connection closed by peer".to_string()
                }));
            }
            if self.buf.len() > MAX_FRAME_LEN {
                self.buf.clear();
                return Err(SourceError::decode(format!(
                    "frame exceeds {} bytes",
                    MAX_FRAME_LEN
                )));
            }
            if self.buf.last() != Some(&b'\n') {
                continue;
            }

            let line = std::mem::take(&mut self.buf);
            let line = String::from_utf8(line)
                .map_err(|e| SourceError::decode(format!("frame is not UTF-8: {}", e)))?;
            if line.trim().is_empty() {
                continue;
            }
            return decode_line(&line);
        }
    }
}

impl PacketTransport for TcpJsonTransport {
    fn peer(&self) -> &Endpoint {
        &self.peer
    }

    fn next_packet<'a>(&'a mut self) -> SourceFuture<'a, DecodedPacket> {
        Box::pin(self.read_frame())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpListener;

    use poslv_core::FaultClass;

    async fn listener() -> (TcpListener, Endpoint) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        (listener, Endpoint::new("127.0.0.1", port))
    }

    #[tokio::test]
    async fn test_reads_frames_over_loopback() {
        let (listener, endpoint) = listener().await;
        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            socket
                .write_all(b"{\"group\":3,\"data\":{\"navigation_solution_status\":7}}\n\n")
                .await
                .unwrap();
            socket.write_all(b"{\"group\":42}\n").await.unwrap();
        });

        let mut source = TcpJsonSource::new();
        let mut transport = source.connect(&endpoint).await.unwrap();
        assert_eq!(transport.peer(), &endpoint);

        let first = transport.next_packet().await.unwrap();
        assert!(matches!(first, DecodedPacket::PrimaryGpsStatus(_)));
        let second = transport.next_packet().await.unwrap();
        assert_eq!(second, DecodedPacket::Unrecognized { group_id: 42 });

        server.await.unwrap();
        let closed = transport.next_packet().await.unwrap_err();
        assert_eq!(closed.class(), FaultClass::StreamIo);
    }

    #[tokio::test]
    async fn test_partial_frame_survives_cancelled_read() {
        let (listener, endpoint) = listener().await;
        let (go_tx, go_rx) = tokio::sync::oneshot::channel::<()>();
        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            socket.write_all(b"{\"group\":15,").await.unwrap();
            go_rx.await.unwrap();
            socket.write_all(b"\"data\":{\"dmi_data_rate\":5}}\n").await.unwrap();
            socket
        });

        let mut source = TcpJsonSource::new();
        let mut transport = source.connect(&endpoint).await.unwrap();
        let timed_out =
            tokio::time::timeout(Duration::from_millis(100), transport.next_packet()).await;
        assert!(timed_out.is_err());

        go_tx.send(()).unwrap();
        let packet = transport.next_packet().await.unwrap();
        match packet {
            DecodedPacket::DmiData(dmi) => assert_eq!(dmi.dmi_data_rate, 5),
            other => panic!("unexpected packet {:?}", other),
        }
        drop(server);
    }

    #[tokio::test]
    async fn test_oversized_frame_is_rejected_without_unbounded_buffering() {
        let (listener, endpoint) = listener().await;
        let (done_tx, done_rx) = tokio::sync::oneshot::channel::<()>();
        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let chunk = vec![b'x'; 64 * 1024];
            // keeps writing until the client hangs up or gives up
            for _ in 0..128 {
                if socket.write_all(&chunk).await.is_err() {
                    return;
                }
            }
            let _ = done_rx.await;
        });

        let stream = TcpStream::connect((endpoint.host.as_str(), endpoint.port))
            .await
            .unwrap();
        let mut transport = TcpJsonTransport {
            peer: endpoint.clone(),
            reader: BufReader::new(stream),
            buf: Vec::new(),
        };
        let err = tokio::time::timeout(Duration::from_secs(5), transport.read_frame())
            .await
            .expect("oversized frame was not rejected")
            .unwrap_err();
        assert_eq!(err.class(), FaultClass::Decode);
        assert!(err.to_string().contains("65536"));
        assert!(transport.buf.is_empty());
        assert!(transport.buf.capacity() <= 4 * (MAX_FRAME_LEN + 1));

        drop(transport);
        let _ = done_tx.send(());
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_malformed_frame_is_decode_error() {
        let (listener, endpoint) = listener().await;
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            socket.write_all(b"garbage\n").await.unwrap();
        });

        let mut source = TcpJsonSource::new();
        let mut transport = source.connect(&endpoint).await.unwrap();
        let err = transport.next_packet().await.unwrap_err();
        assert_eq!(err.class(), FaultClass::Decode);
    }

    #[tokio::test]
    async fn test_refused_connection_is_connect_error() {
        let (listener, endpoint) = listener().await;
        drop(listener);

        let mut source = TcpJsonSource::new();
        let err = match source.connect(&endpoint).await {
            Ok(_) => panic!("connect to a closed port succeeded"),
            Err(e) => e,
        };
        assert_eq!(err.class(), FaultClass::Connect);
        assert!(err.to_string().contains("127.0.0.1"));
    }
}
