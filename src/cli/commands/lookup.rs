//! Lookup command - resolve one entity against a fresh directory.

use std::process::ExitCode;

use crate::config::Settings;
use crate::directory::{EntityKind, LookupKey};
use crate::error::Result;
use crate::orchestrator::directory_cache;

pub struct LookupQuery {
    pub id: Option<String>,
    pub dtmf: Option<String>,
    pub name: Option<String>,
    pub room: bool,
}

pub async fn run(query: &LookupQuery, settings: &Settings) -> Result<ExitCode> {
    // The directory may be disabled for the relay; lookups always use it.
    let mut settings = settings.clone();
    settings.directory.enabled = true;
    let Some(cache) = directory_cache(&settings)? else {
        return Ok(ExitCode::FAILURE);
    };

    let directory = cache.refresh().await?;
    crate::debug_event!(
        "lookup",
        "directory",
        "{} nodes, {} rooms, updated {}",
        directory.nodes.len(),
        directory.rooms.len(),
        directory.last_update
    );

    let key = LookupKey {
        id: query.id.as_deref(),
        secondary_id: query.dtmf.as_deref(),
        name: query.name.as_deref(),
    };
    let kind = if query.room {
        EntityKind::Room
    } else {
        EntityKind::Node
    };

    match cache.lookup(kind, &key) {
        Some(entity) => {
            println!("{}", serde_json::to_string_pretty(&entity)?);
            Ok(ExitCode::SUCCESS)
        }
        None => {
            eprintln!("No matching {} found", if query.room { "room" } else { "node" });
            Ok(ExitCode::FAILURE)
        }
    }
}
