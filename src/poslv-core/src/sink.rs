// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Outbound event delivery.

use std::sync::Arc;

use serde::Serialize;

use crate::packet::{DmiData, NavigationPerformance, NavigationSolution, StreamKind};

/// Decoded fields forwarded downstream.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum EventPayload {
    NavigationSolution(NavigationSolution),
    NavigationPerformance(NavigationPerformance),
    DmiData(DmiData),
}

/// One published event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Event {
    pub kind: StreamKind,
    /// Arrival time in seconds since the Unix epoch.
    pub stamp: f64,
    pub frame_id: String,
    pub payload: EventPayload,
}

/// Destination for published events.
///
/// Publishing is fire-and-forget: implementations must not block and the
/// router never retries.
pub trait EventSink: Send + Sync {
    fn publish(&self, event: Event);
}

impl<T: EventSink + ?Sized> EventSink for Arc<T> {
    fn publish(&self, event: Event) {
        (**self).publish(event)
    }
}

/// Sink that drops everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn publish(&self, _event: Event) {}
}
