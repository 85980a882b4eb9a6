//! Background-refreshed directory of active nodes and rooms.
//!
//! The published directory is an immutable [`Directory`] behind an `Arc`.
//! A refresh fetches and parses everything without holding the lock, then
//! takes the write lock only to swap the pointer. Readers clone the `Arc`
//! under the read lock and scan outside of it, so a lookup sees either the
//! old or the new directory as a whole.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::error::Result;
use crate::fetch::Source;
use crate::types::{Entity, Node, Room};

use super::listing::{self, LongitudeConvention};

/// One fully built directory generation.
#[derive(Debug, Clone)]
pub struct Directory {
    /// Update time from the listing banner, or the local fetch time.
    pub last_update: DateTime<Utc>,
    pub nodes: Vec<Node>,
    pub rooms: Vec<Room>,
}

/// Which part of the directory a lookup searches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Node,
    Room,
}

/// Optional match keys for a lookup. Empty keys never match.
#[derive(Debug, Clone, Copy, Default)]
pub struct LookupKey<'a> {
    /// Node or room id (e.g. `HB9TF-ND`).
    pub id: Option<&'a str>,
    /// DTMF id (e.g. `12345`).
    pub secondary_id: Option<&'a str>,
    /// Callsign for nodes, room name for rooms.
    pub name: Option<&'a str>,
}

impl<'a> LookupKey<'a> {
    pub fn id(id: &'a str) -> Self {
        Self {
            id: Some(id),
            ..Self::default()
        }
    }

    pub fn secondary_id(secondary_id: &'a str) -> Self {
        Self {
            secondary_id: Some(secondary_id),
            ..Self::default()
        }
    }

    fn matches(&self, id: &str, secondary_id: &str, name: &str) -> bool {
        let eq = |key: Option<&str>, field: &str| key.is_some_and(|k| !k.is_empty() && k == field);
        eq(self.id, id) || eq(self.secondary_id, secondary_id) || eq(self.name, name)
    }
}

/// Where the directory listings come from.
#[derive(Debug, Clone)]
pub struct DirectorySources {
    pub nodes: Source,
    pub rooms: Option<Source>,
    pub convention: LongitudeConvention,
}

/// Process-wide cache of the active node and room directory.
#[derive(Debug)]
pub struct DirectoryCache {
    sources: DirectorySources,
    current: RwLock<Option<Arc<Directory>>>,
}

impl DirectoryCache {
    pub fn new(sources: DirectorySources) -> Self {
        Self {
            sources,
            current: RwLock::new(None),
        }
    }

    /// Fetch and parse the listings, then publish them as one generation.
    ///
    /// On any fetch or format failure the previous generation stays
    /// published.
    pub async fn refresh(&self) -> Result<Arc<Directory>> {
        let fetched_at = Utc::now();

        let document = self.sources.nodes.fetch().await?;
        crate::debug_event!(
            "directory",
            "read",
            "{} bytes from {}",
            document.len(),
            self.sources.nodes.url()
        );
        let nodes = listing::parse_nodes(
            &document,
            self.sources.convention,
            self.sources.nodes.url(),
        )?;

        let rooms = match &self.sources.rooms {
            Some(source) => {
                let document = source.fetch().await?;
                crate::debug_event!(
                    "directory",
                    "read",
                    "{} bytes from {}",
                    document.len(),
                    source.url()
                );
                listing::parse_rooms(&document, source.url())?.records
            }
            None => Vec::new(),
        };

        let directory = Arc::new(Directory {
            last_update: nodes.last_update.unwrap_or(fetched_at),
            nodes: nodes.records,
            rooms,
        });
        self.publish(directory.clone());
        Ok(directory)
    }

    /// Swap in a new generation.
    pub fn publish(&self, directory: Arc<Directory>) {
        *self.current.write() = Some(directory);
    }

    /// The currently published generation, if any refresh has succeeded.
    pub fn current(&self) -> Option<Arc<Directory>> {
        self.current.read().clone()
    }

    /// Find the first record of `kind` matching any of the provided keys.
    ///
    /// Returns `None` if the directory was never populated.
    pub fn lookup(&self, kind: EntityKind, key: &LookupKey<'_>) -> Option<Entity> {
        let directory = self.current()?;
        match kind {
            EntityKind::Node => directory
                .nodes
                .iter()
                .find(|n| key.matches(&n.id, &n.dtmf_id, &n.callsign))
                .cloned()
                .map(Entity::Node),
            EntityKind::Room => directory
                .rooms
                .iter()
                .find(|r| key.matches(&r.id, &r.dtmf_id, &r.name))
                .cloned()
                .map(Entity::Room),
        }
    }

    pub fn find_node(&self, key: &LookupKey<'_>) -> Option<Node> {
        match self.lookup(EntityKind::Node, key)? {
            Entity::Node(node) => Some(node),
            Entity::Room(_) => None,
        }
    }

    pub fn find_room(&self, key: &LookupKey<'_>) -> Option<Room> {
        match self.lookup(EntityKind::Room, key)? {
            Entity::Room(room) => Some(room),
            Entity::Node(_) => None,
        }
    }
}
