// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wire frames for the live channel (§6): inbound schemas, outbound
//! schemas, and the two-stage parse that distinguishes malformed JSON,
//! missing required fields, and unknown `type` tags (§4.6, §7) — a plain
//! `#[serde(tag = "type")]` enum collapses all three into one error.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatLon {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Point {
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SiteEdit {
    pub id: i64,
    pub name: String,
    pub location: LatLon,
    pub site_passenger: u32,
    pub is_used: bool,
    pub site_note: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RouteEdit {
    pub id: i64,
    pub path: Vec<(f64, f64)>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RouteRef {
    pub id: i64,
}

/// One recognized inbound frame (§4.6 table, §6 schemas). Each field list is
/// the *required* set; extra fields in the source JSON are ignored by
/// `serde_json::from_value`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum InboundFrame {
    #[serde(rename = "connections")]
    Connections { driver_id: String },
    #[serde(rename = "car_conn")]
    CarConn { car_id: String },
    #[serde(rename = "driver_gps")]
    DriverGps { driver_id: String, car_id: String, location: LatLon },
    #[serde(rename = "vehicle_call")]
    VehicleCall {
        from: Point,
        to: Point,
        from_str: String,
        to_str: String,
        passenger_id: String,
    },
    #[serde(rename = "call_accept")]
    CallAccept {
        passenger_id: Option<String>,
        driver_id: String,
        car_id: String,
    },
    #[serde(rename = "payment_user_count")]
    PaymentUserCount { car_id: String, count: u32 },
    #[serde(rename = "boardingMessage")]
    BoardingMessage { car_id: String, #[serde(rename = "boardingCount")] boarding_count: u32 },
    #[serde(rename = "alightingMessage")]
    AlightingMessage { car_id: String, #[serde(rename = "alightingCount")] alighting_count: u32 },
    #[serde(rename = "update_sites")]
    UpdateSites { sites: Vec<SiteEdit> },
    #[serde(rename = "update_routes")]
    UpdateRoutes { routes: Vec<RouteEdit> },
    #[serde(rename = "delete_route")]
    DeleteRoute { routes: Vec<RouteRef> },
}

/// Why a frame could not be turned into an `InboundFrame`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// Not valid JSON at all — closes the session (§7 "Protocol errors").
    MalformedJson(String),
    /// Valid JSON but no string `type` field — closes the session, since
    /// `type` is the required discriminator (§6).
    MissingType,
    /// `type` is a recognized tag but required fields are absent or of the
    /// wrong shape — closes the session (§7 "Protocol errors").
    InvalidPayload { frame_type: String, detail: String },
    /// `type` is outside the closed set — logged and dropped, session stays
    /// open (§4.6, §7 "Unknown type").
    UnknownType(String),
}

impl std::fmt::Display for FrameError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MalformedJson(detail) => write!(f, "malformed JSON: {detail}"),
            Self::MissingType => write!(f, "frame missing \"type\" field"),
            Self::InvalidPayload { frame_type, detail } => {
                write!(f, "invalid payload for {frame_type}: {detail}")
            }
            Self::UnknownType(tag) => write!(f, "unknown frame type: {tag}"),
        }
    }
}

impl std::error::Error for FrameError {}

/// Parse one inbound text frame in two stages so the three distinct §7
/// error classes can be told apart: a raw JSON parse, then a `type`-driven
/// dispatch into the typed variant.
pub fn parse_inbound(text: &str) -> Result<InboundFrame, FrameError> {
    let value: Value =
        serde_json::from_str(text).map_err(|e| FrameError::MalformedJson(e.to_string()))?;
    let frame_type = value
        .get("type")
        .and_then(Value::as_str)
        .ok_or(FrameError::MissingType)?
        .to_owned();

    match frame_type.as_str() {
        "connections" | "car_conn" | "driver_gps" | "vehicle_call" | "call_accept"
        | "payment_user_count" | "boardingMessage" | "alightingMessage" | "update_sites"
        | "update_routes" | "delete_route" => serde_json::from_value(value).map_err(|e| {
            FrameError::InvalidPayload { frame_type: frame_type.clone(), detail: e.to_string() }
        }),
        other => Err(FrameError::UnknownType(other.to_owned())),
    }
}

/// One entry of the periodic `driver_positions` snapshot (§6).
#[derive(Debug, Clone, Serialize)]
pub struct DriverPositionEntry {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub id: String,
    pub location: LatLon,
}

impl DriverPositionEntry {
    pub fn new(id: String, location: LatLon) -> Self {
        Self { kind: "driver_gps", id, location }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SiteFrameEntry {
    pub id: i64,
    pub name: String,
    pub location: LatLon,
    pub site_passenger: u32,
    pub is_used: bool,
    pub site_note: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RouteFrameEntry {
    pub id: i64,
    pub path: Vec<(f64, f64)>,
}

/// Outbound frames (§6): tagged for the wire, constructed only by the
/// Broadcaster and Geometry Persistence (forwards pass the original text
/// through unchanged, see `router::send_to`).
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum OutboundFrame {
    #[serde(rename = "driver_positions")]
    DriverPositions { positions: Vec<DriverPositionEntry> },
    #[serde(rename = "site")]
    Site { sites: Vec<SiteFrameEntry> },
    #[serde(rename = "route")]
    Route { routes: Vec<RouteFrameEntry> },
}

impl OutboundFrame {
    /// Serialize to the text sent over the wire. Only fails if a type
    /// carries a non-finite float, which the callers here never produce.
    pub fn to_text(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_json_is_distinguished_from_missing_type() {
        assert!(matches!(parse_inbound("not json"), Err(FrameError::MalformedJson(_))));
        assert!(matches!(parse_inbound("{}"), Err(FrameError::MissingType)));
    }

    #[test]
    fn unknown_type_does_not_touch_payload_validation() {
        let err = parse_inbound(r#"{"type":"frobnicate","whatever":1}"#).unwrap_err();
        assert_eq!(err, FrameError::UnknownType("frobnicate".to_owned()));
    }

    #[test]
    fn known_type_missing_required_field_is_invalid_payload() {
        let result = parse_inbound(r#"{"type":"driver_gps","driver_id":"7"}"#);
        assert!(matches!(
            result,
            Err(FrameError::InvalidPayload { ref frame_type, .. }) if frame_type == "driver_gps"
        ));
    }

    #[test]
    fn driver_gps_parses_into_typed_variant() -> anyhow::Result<()> {
        let parsed = parse_inbound(
            r#"{"type":"driver_gps","driver_id":"7","car_id":"car-1","location":{"latitude":22.5,"longitude":113.9}}"#,
        )?;
        match parsed {
            InboundFrame::DriverGps { driver_id, car_id, location } => {
                assert_eq!(driver_id, "7");
                assert_eq!(car_id, "car-1");
                assert_eq!(location, LatLon { latitude: 22.5, longitude: 113.9 });
                Ok(())
            }
            other => Err(anyhow::anyhow!("unexpected variant: {other:?}")),
        }
    }

    #[test]
    fn call_accept_passenger_id_is_optional() -> anyhow::Result<()> {
        let parsed = parse_inbound(r#"{"type":"call_accept","driver_id":"7","car_id":"car-1"}"#)?;
        assert!(matches!(parsed, InboundFrame::CallAccept { passenger_id: None, .. }));
        Ok(())
    }

    #[test]
    fn camel_case_boarding_fields_round_trip() -> anyhow::Result<()> {
        let parsed = parse_inbound(r#"{"type":"boardingMessage","car_id":"car-1","boardingCount":3}"#)?;
        assert!(matches!(parsed, InboundFrame::BoardingMessage { boarding_count: 3, .. }));
        Ok(())
    }
}
