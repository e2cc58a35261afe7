// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Sensor connection driver.
//!
//! This module contains the connection lifecycle: the state machine, the
//! reconnect policies and the supervisor loop that ties them to a
//! packet source.

pub mod machine;
pub mod policies;
pub mod supervisor;

pub use machine::{ConnectionEvent, ConnectionFault, ConnectionMachine, ConnectionState};
pub use policies::{ExponentialBackoff, FixedDelay, RetryPolicy};
pub use supervisor::{
    system_clock, Clock, ConnectionSupervisor, StepOutcome, SupervisorConfig,
};
