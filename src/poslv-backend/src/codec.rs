// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Line codec for JSON framed packets.
//!
//! Each frame is one JSON object `{"group": <u16>, "data": {...}}` on its
//! own line. Groups the driver does not model decode to
//! [`DecodedPacket::Unrecognized`].

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use poslv_core::packet::group;
use poslv_core::{DecodedPacket, SourceError};

#[derive(Debug, Deserialize)]
struct Frame {
    group: u16,
    #[serde(default)]
    data: Option<Value>,
}

#[derive(Debug, Serialize)]
struct FrameRef<'a, T: Serialize> {
    group: u16,
    data: &'a T,
}

/// Decode one frame. Surrounding whitespace is ignored.
pub fn decode_line(line: &str) -> Result<DecodedPacket, SourceError> {
    let frame: Frame = serde_json::from_str(line.trim())
        .map_err(|e| SourceError::decode(format!("malformed frame: {}", e)))?;
    let data = frame
        .data
        .unwrap_or_else(|| Value::Object(Default::default()));

    let packet = match frame.group {
        group::NAVIGATION_SOLUTION => DecodedPacket::NavigationSolution(body(frame.group, data)?),
        group::NAVIGATION_PERFORMANCE => {
            DecodedPacket::NavigationPerformance(body(frame.group, data)?)
        }
        group::PRIMARY_GPS_STATUS => DecodedPacket::PrimaryGpsStatus(body(frame.group, data)?),
        group::SECONDARY_GPS_STATUS => DecodedPacket::SecondaryGpsStatus(body(frame.group, data)?),
        group::GAMS_SOLUTION => DecodedPacket::GamsSolution(body(frame.group, data)?),
        group::IIN_SOLUTION => DecodedPacket::IinSolution(body(frame.group, data)?),
        group::GENERAL_STATUS => DecodedPacket::GeneralStatus(body(frame.group, data)?),
        group::DMI_DATA => DecodedPacket::DmiData(body(frame.group, data)?),
        group_id => DecodedPacket::Unrecognized { group_id },
    };
    Ok(packet)
}

fn body<T: DeserializeOwned>(group_id: u16, data: Value) -> Result<T, SourceError> {
    serde_json::from_value(data)
        .map_err(|e| SourceError::decode(format!("group {}: {}", group_id, e)))
}

/// Encode a packet as one frame, without the trailing newline.
pub fn encode_packet(packet: &DecodedPacket) -> Result<String, serde_json::Error> {
    let group = packet.group_id();
    match packet {
        DecodedPacket::NavigationSolution(p) => frame(group, p),
        DecodedPacket::NavigationPerformance(p) => frame(group, p),
        DecodedPacket::DmiData(p) => frame(group, p),
        DecodedPacket::PrimaryGpsStatus(p) | DecodedPacket::SecondaryGpsStatus(p) => {
            frame(group, p)
        }
        DecodedPacket::GamsSolution(p) => frame(group, p),
        DecodedPacket::IinSolution(p) => frame(group, p),
        DecodedPacket::GeneralStatus(p) => frame(group, p),
        DecodedPacket::Unrecognized { .. } => frame(group, &Value::Object(Default::default())),
    }
}

fn frame<T: Serialize>(group: u16, data: &T) -> Result<String, serde_json::Error> {
    serde_json::to_string(&FrameRef { group, data })
}
