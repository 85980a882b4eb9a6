//! Message enrichment from the node/room directory.
//!
//! A priority-ordered table of patterns is evaluated against the event
//! message. The first pattern that matches decides which directory lookups
//! run; if one of them finds a record the notification gets a title and a
//! body describing it. Later patterns are not tried.

use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::directory::{DirectoryCache, EntityKind, LookupKey};
use crate::types::{Entity, Location, Node, Room};

/// How the captures of a rule map to lookup keys.
#[derive(Debug, Clone, Copy)]
enum KeyShape {
    /// One number, tried as both id and DTMF id.
    Number,
    /// A name (id) followed by a number (DTMF id).
    NameAndNumber,
}

struct EnrichRule {
    name: &'static str,
    pattern: Regex,
    shape: KeyShape,
    /// Lookup order; the first hit wins.
    kinds: &'static [EntityKind],
}

impl EnrichRule {
    fn new(name: &'static str, pattern: &str, shape: KeyShape, kinds: &'static [EntityKind]) -> Self {
        Self {
            name,
            pattern: Regex::new(pattern).expect("valid enrichment pattern"),
            shape,
            kinds,
        }
    }

    fn key<'c>(&self, caps: &'c Captures<'_>) -> LookupKey<'c> {
        let group = |i: usize| caps.get(i).map(|m| m.as_str().trim());
        match self.shape {
            KeyShape::Number => LookupKey {
                id: group(1),
                secondary_id: group(1),
                name: None,
            },
            KeyShape::NameAndNumber => LookupKey {
                id: group(1),
                secondary_id: group(2),
                name: None,
            },
        }
    }
}

static RULES: LazyLock<Vec<EnrichRule>> = LazyLock::new(|| {
    use EntityKind::{Node, Room};
    vec![
        EnrichRule::new("in-call", r"In-Call from No\.([0-9]+)", KeyShape::Number, &[Node]),
        EnrichRule::new(
            "call-start",
            r"Call Start No\.([0-9]+)",
            KeyShape::Number,
            &[Room, Node],
        ),
        EnrichRule::new(
            "connected",
            r"Connected to (.+?)\(([0-9]+)\)",
            KeyShape::NameAndNumber,
            &[Room, Node],
        ),
        EnrichRule::new(
            "in-out",
            r"(.+?)\(([0-9]+)\) (?:IN|OUT)\b",
            KeyShape::NameAndNumber,
            &[Node, Room],
        ),
    ]
});

/// Directory details attached to a notification.
#[derive(Debug, Clone, PartialEq)]
pub struct Enrichment {
    /// Header line naming the entity.
    pub title: String,
    /// Location, frequency and comment lines.
    pub text: String,
    pub entity: Entity,
}

/// Look up the entity a message refers to.
///
/// Returns `None` if no rule matches, or the first matching rule's lookups
/// find nothing.
pub fn enrich(msg: &str, directory: &DirectoryCache) -> Option<Enrichment> {
    let (rule, caps) = RULES
        .iter()
        .find_map(|rule| rule.pattern.captures(msg).map(|caps| (rule, caps)))?;
    let key = rule.key(&caps);

    let entity = rule
        .kinds
        .iter()
        .find_map(|kind| directory.lookup(*kind, &key))?;
    crate::debug_event!("enrich", rule.name, "{msg}");

    let (title, lines) = match &entity {
        Entity::Node(node) => describe_node(node),
        Entity::Room(room) => describe_room(room),
    };
    Some(Enrichment {
        title,
        text: lines.join("\n"),
        entity,
    })
}

fn describe_node(node: &Node) -> (String, Vec<String>) {
    let mut lines = vec![format!("Location: {}", location_line(&node.location))];
    if !node.freq.is_empty() {
        lines.push(format!("Frequency: {} ({})", node.freq, node.sql));
    }
    if !node.comment.is_empty() {
        lines.push(format!("Comment: {}", node.comment));
    }
    (format!("{} ({})", node.id, node.mode), lines)
}

fn describe_room(room: &Room) -> (String, Vec<String>) {
    let mut lines = vec![format!("Location: {}", location_line(&room.location))];
    if !room.comment.is_empty() {
        lines.push(format!("Comment: {}", room.comment));
    }
    (format!("{}: {}", room.id, room.name), lines)
}

fn location_line(location: &Location) -> String {
    let label = location.label();
    if location.has_coordinates() {
        format!(
            "<https://www.google.com/maps/@{:.6},{:.6}|{label}>",
            location.lat, location.lon
        )
    } else {
        label
    }
}
