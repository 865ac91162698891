/*!
 * Everything observable flows through one event stream: inbound
 * frames, per-aircraft state changes, lifecycle markers and log
 * lines. Sinks receive events in the order the owning shard produced
 * them; there is no ordering across aircraft.
 */
use crate::decode::Icao;
use crate::source::SourceTag;
use serde::{Serialize, Serializer};
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// One unit of raw input as produced by a source
    Frame(FrameEvent),
    /// A frame that survived duplicate suppression
    DedupedFrame(DedupedFrameEvent),
    /// Coalesced positional update for one aircraft
    PlaneLocation(PlaneLocationEvent),
    /// A non-positional identity or status change
    PlaneInfo(PlaneInfoEvent),
    /// Terminal event of a pruned aircraft
    PlaneGone(PlaneGoneEvent),
    Log(LogEvent),
}

#[derive(Debug, Clone, Serialize)]
pub struct FrameEvent {
    /// Raw wire bytes: an ASCII line for AVR and SBS1, an unescaped
    /// record for Beast
    #[serde(serialize_with = "hex_bytes")]
    pub data: Vec<u8>,
    /// Unix seconds at reception
    pub received_at: f64,
    pub tag: Arc<SourceTag>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DedupedFrameEvent {
    #[serde(serialize_with = "hex_bytes")]
    pub data: Vec<u8>,
    pub received_at: f64,
    /// How many copies of this frame arrived inside the suppression
    /// window
    pub duplicates: u32,
}

/// The reference record every location sink consumes; field names are
/// part of the schema.
#[derive(Debug, Clone, Serialize)]
pub struct PlaneLocationEvent {
    pub icao: Icao,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub callsign: Option<String>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub altitude: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heading: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ground_speed: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vertical_rate: Option<i32>,
    pub on_ground: Option<bool>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "squawk_digits"
    )]
    pub squawk: Option<u16>,
    pub t: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlaneInfoEvent {
    pub icao: Icao,
    pub t: f64,
    #[serde(flatten)]
    pub change: InfoChange,
}

/// One identity/status field that just changed
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "field", content = "value", rename_all = "snake_case")]
pub enum InfoChange {
    Callsign(String),
    Category(String),
    Squawk(#[serde(serialize_with = "squawk_value")] u16),
    Alert(bool),
    Spi(bool),
    FlightStatus(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct PlaneGoneEvent {
    pub icao: Icao,
    pub t: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LogEvent {
    pub level: LogLevel,
    pub msg: String,
}

impl Event {
    pub fn log(level: LogLevel, msg: impl Into<String>) -> Self {
        Event::Log(LogEvent {
            level,
            msg: msg.into(),
        })
    }

    /// The aircraft an event is about, None for frame and log events
    pub fn icao24(&self) -> Option<Icao> {
        match self {
            Event::PlaneLocation(e) => Some(e.icao),
            Event::PlaneInfo(e) => Some(e.icao),
            Event::PlaneGone(e) => Some(e.icao),
            _ => None,
        }
    }
}

fn hex_bytes<S: Serializer>(
    bytes: &[u8],
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&hex::encode(bytes))
}

fn squawk_digits<S: Serializer>(
    squawk: &Option<u16>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match squawk {
        Some(code) => serializer.serialize_str(&format!("{code:04x}")),
        None => serializer.serialize_none(),
    }
}

fn squawk_value<S: Serializer>(
    squawk: &u16,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&format!("{squawk:04x}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn location_event_schema() {
        let event = Event::PlaneLocation(PlaneLocationEvent {
            icao: Icao(0x7c6b2d),
            callsign: Some("QFA421".to_string()),
            lat: Some(-34.8654),
            lon: Some(138.5358),
            altitude: Some(2850),
            heading: None,
            ground_speed: Some(288.6),
            vertical_rate: Some(-1832),
            on_ground: Some(false),
            squawk: Some(0x3601),
            t: 1673512267.5,
        });
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "plane_location");
        assert_eq!(json["icao"], "7c6b2d");
        assert_eq!(json["squawk"], "3601");
        assert_eq!(json["altitude"], 2850);
        assert!(json.get("heading").is_none());
    }

    #[test]
    fn info_event_schema() {
        let event = Event::PlaneInfo(PlaneInfoEvent {
            icao: Icao(0x7c6b2d),
            t: 0.0,
            change: InfoChange::Squawk(0x7700),
        });
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["field"], "squawk");
        assert_eq!(json["value"], "7700");
    }
}
