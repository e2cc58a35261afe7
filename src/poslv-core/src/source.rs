// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Inbound packet acquisition.
//!
//! A [`PacketSource`] opens transports; a [`PacketTransport`] yields decoded
//! packets until it fails. Timeouts are applied by the caller.

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};

use crate::error::SourceError;
use crate::packet::DecodedPacket;

/// Alias to reduce type complexity in the source traits.
pub type SourceFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, SourceError>> + Send + 'a>>;

/// Network address of the sensor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// An open connection delivering decoded packets.
pub trait PacketTransport: Send {
    /// Endpoint this transport is connected to.
    fn peer(&self) -> &Endpoint;

    /// Wait for the next decoded packet.
    ///
    /// Must be cancel-safe with respect to packet boundaries: dropping the
    /// future before completion must not corrupt the stream.
    fn next_packet<'a>(&'a mut self) -> SourceFuture<'a, DecodedPacket>;
}

/// Factory for packet transports.
pub trait PacketSource: Send {
    /// Short name used in logs.
    fn name(&self) -> &str;

    fn connect<'a>(&'a mut self, endpoint: &'a Endpoint) -> SourceFuture<'a, Box<dyn PacketTransport>>;
}

impl<T: PacketSource + ?Sized> PacketSource for Box<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn connect<'a>(&'a mut self, endpoint: &'a Endpoint) -> SourceFuture<'a, Box<dyn PacketTransport>> {
        (**self).connect(endpoint)
    }
}
