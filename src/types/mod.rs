//! Core data types shared by the parser, the directory and the processor.

use chrono::{DateTime, FixedOffset};
use serde::Serialize;

/// One parsed poll result from a single target.
///
/// Events keep the order in which they appeared in the document; the
/// processor sorts them before applying the watermark.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Snapshot {
    /// Where the log was polled from.
    pub source: String,
    /// Log type label taken from the page title (node log, room log, ...).
    pub log_type: String,
    /// Node or room this log belongs to, formatted as `"<name>, <id>(<dtmf>)"`.
    pub id: String,
    /// Wires-X software version banner of the server.
    pub wires_version: String,
    /// Node or room the repeater is connected to (node logs only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connected_to: Option<String>,
    pub events: Vec<Event>,
}

impl Snapshot {
    /// Whether the parser recognized anything at all in the document.
    pub fn is_empty(&self) -> bool {
        self.log_type.is_empty()
            && self.id.is_empty()
            && self.wires_version.is_empty()
            && self.connected_to.is_none()
            && self.events.is_empty()
    }
}

/// One timestamped log line.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Event {
    /// Original line, kept for diagnostics.
    pub raw: String,
    /// Timestamp interpreted in the configured time zone.
    pub ts: DateTime<FixedOffset>,
    /// Message text trimmed of decoration.
    pub msg: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Location {
    pub city: String,
    pub state: String,
    pub country: String,
    pub lat: f64,
    pub lon: f64,
}

impl Location {
    /// `"city, state, country"` as shown in notifications.
    pub fn label(&self) -> String {
        format!("{}, {}, {}", self.city, self.state, self.country)
    }

    /// Coordinates are only meaningful when both are set.
    pub fn has_coordinates(&self) -> bool {
        self.lat != 0.0 && self.lon != 0.0
    }
}

/// An active node from the directory listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Node {
    pub id: String,
    pub dtmf_id: String,
    pub callsign: String,
    /// Analog/digital mode column.
    pub mode: String,
    pub location: Location,
    pub freq: String,
    pub sql: String,
    pub comment: String,
}

/// An active room from the directory listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Room {
    pub id: String,
    pub dtmf_id: String,
    pub name: String,
    pub location: Location,
    pub comment: String,
}

/// Result of a directory lookup.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Entity {
    Node(Node),
    Room(Room),
}
