// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Connection state machine.
//!
//! Makes the connect/read/reconnect lifecycle explicit. Transitions that do
//! not apply to the current state are ignored.

use std::fmt;

use serde::Serialize;

use crate::error::{FaultClass, SourceError};
use crate::source::Endpoint;

/// Fault information kept while the connection is down.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConnectionFault {
    pub class: FaultClass,
    pub message: String,
    pub occurred_at: Option<u64>, // Unix timestamp, Option for serialization
}

impl ConnectionFault {
    pub fn new(class: FaultClass, message: impl Into<String>) -> Self {
        Self {
            class,
            message: message.into(),
            occurred_at: Some(unix_seconds()),
        }
    }
}

impl From<&SourceError> for ConnectionFault {
    fn from(err: &SourceError) -> Self {
        Self::new(err.class(), err.to_string())
    }
}

/// Events that can trigger state transitions.
#[derive(Debug, Clone)]
pub enum ConnectionEvent {
    /// A connect attempt is starting
    ConnectAttempt(Endpoint),
    /// Transport opened
    Connected(Endpoint),
    /// Connect, read or decode failure
    Fault(ConnectionFault),
    /// Transport closed on request
    Disconnected,
}

/// The current state of the connection.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(tag = "state", content = "data")]
pub enum ConnectionState {
    /// No transport and no fault pending
    #[default]
    Disconnected,
    /// Opening the transport
    Connecting { endpoint: Endpoint, attempt: u32 },
    /// Transport open, reading packets
    Connected { endpoint: Endpoint, since: Option<u64> },
    /// Last attempt or read failed, waiting to retry
    Failed { fault: ConnectionFault, attempt: u32 },
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "Disconnected"),
            Self::Connecting { .. } => write!(f, "Connecting"),
            Self::Connected { .. } => write!(f, "Connected"),
            Self::Failed { fault, .. } => write!(f, "Failed({})", fault.message),
        }
    }
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected { .. })
    }

    pub fn endpoint(&self) -> Option<&Endpoint> {
        match self {
            Self::Connecting { endpoint, .. } | Self::Connected { endpoint, .. } => Some(endpoint),
            _ => None,
        }
    }

    pub fn fault(&self) -> Option<&ConnectionFault> {
        match self {
            Self::Failed { fault, .. } => Some(fault),
            _ => None,
        }
    }

    /// Consecutive failed attempts leading to this state.
    fn attempt(&self) -> u32 {
        match self {
            Self::Connecting { attempt, .. } | Self::Failed { attempt, .. } => *attempt,
            _ => 0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConnectionMachine {
    state: ConnectionState,
    transition_count: u64,
    reconnect_count: u64,
    connected_once: bool,
}

impl Default for ConnectionMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionMachine {
    /// Create a new state machine in the Disconnected state.
    pub fn new() -> Self {
        Self {
            state: ConnectionState::Disconnected,
            transition_count: 0,
            reconnect_count: 0,
            connected_once: false,
        }
    }

    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    pub fn transition_count(&self) -> u64 {
        self.transition_count
    }

    /// Number of successful connects after the first one.
    pub fn reconnect_count(&self) -> u64 {
        self.reconnect_count
    }

    /// Process an event and potentially transition to a new state.
    /// Returns true if a transition occurred.
    pub fn process_event(&mut self, event: ConnectionEvent) -> bool {
        let Some(state) = self.next_state(event) else {
            return false;
        };
        if state.is_connected() {
            if self.connected_once {
                self.reconnect_count += 1;
            }
            self.connected_once = true;
        }
        self.state = state;
        self.transition_count += 1;
        true
    }

    fn next_state(&self, event: ConnectionEvent) -> Option<ConnectionState> {
        match (&self.state, event) {
            (
                ConnectionState::Disconnected | ConnectionState::Failed { .. },
                ConnectionEvent::ConnectAttempt(endpoint),
            ) => Some(ConnectionState::Connecting {
                endpoint,
                attempt: self.state.attempt(),
            }),

            (ConnectionState::Connecting { .. }, ConnectionEvent::Connected(endpoint)) => {
                Some(ConnectionState::Connected {
                    endpoint,
                    since: Some(unix_seconds()),
                })
            }

            (ConnectionState::Connecting { attempt, .. }, ConnectionEvent::Fault(fault)) => {
                Some(ConnectionState::Failed {
                    fault,
                    attempt: attempt + 1,
                })
            }
            (ConnectionState::Connected { .. }, ConnectionEvent::Fault(fault)) => {
                Some(ConnectionState::Failed { fault, attempt: 1 })
            }

            (ConnectionState::Disconnected, ConnectionEvent::Disconnected) => None,
            (_, ConnectionEvent::Disconnected) => Some(ConnectionState::Disconnected),

            _ => None,
        }
    }
}

fn unix_seconds() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
