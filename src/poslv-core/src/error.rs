// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Recoverable connection faults.

use serde::Serialize;
use thiserror::Error;

use crate::source::Endpoint;

/// Error returned by a [`PacketSource`](crate::source::PacketSource) or its transport.
///
/// Every variant is recoverable: the supervisor drops the transport and
/// reconnects after the retry delay.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    #[error("failed to connect to {endpoint}: {message}")]
    Connect { endpoint: Endpoint, message: String },

    #[error("stream I/O error: {0}")]
    StreamIo(String),

    #[error("decode error: {0}")]
    Decode(String),
}

impl SourceError {
    pub fn connect(endpoint: &Endpoint, message: impl Into<String>) -> Self {
        Self::Connect {
            endpoint: endpoint.clone(),
            message: message.into(),
        }
    }

    pub fn stream_io(message: impl Into<String>) -> Self {
        Self::StreamIo(message.into())
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode(message.into())
    }

    pub fn class(&self) -> FaultClass {
        match self {
            Self::Connect { .. } => FaultClass::Connect,
            Self::StreamIo(_) => FaultClass::StreamIo,
            Self::Decode(_) => FaultClass::Decode,
        }
    }
}

/// Failure class of a connection fault, kept for reporting only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultClass {
    Connect,
    StreamIo,
    Decode,
}
