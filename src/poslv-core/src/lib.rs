// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

pub mod driver;
pub mod error;
pub mod frequency;
pub mod health;
pub mod packet;
pub mod router;
pub mod sink;
pub mod source;
pub mod status;

pub type DynResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

pub use driver::{ConnectionSupervisor, SupervisorConfig};
pub use error::{FaultClass, SourceError};
pub use frequency::{ClockOrderError, FrequencyBounds, FrequencyMonitor};
pub use health::{HealthAggregator, HealthHandle, HealthReport};
pub use packet::{DecodedPacket, StreamKind};
pub use router::{PacketRouter, StreamBounds};
pub use sink::{Event, EventSink};
pub use source::{Endpoint, PacketSource, PacketTransport, SourceFuture};
pub use status::Severity;
