//! Delivery watermarks.

use std::collections::HashMap;

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

/// Whether all targets share one watermark or each target keeps its own.
///
/// With a shared watermark a target whose clock runs ahead suppresses
/// events from every other target; `PerSource` isolates them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WatermarkScope {
    #[default]
    Global,
    PerSource,
}

/// Timestamp boundary below which events count as already delivered.
///
/// Never decreases. Every boundary starts at the processor's start time so
/// the backlog present at the first poll is never sent.
#[derive(Debug, Clone)]
pub struct Watermarks {
    scope: WatermarkScope,
    start: DateTime<FixedOffset>,
    global: DateTime<FixedOffset>,
    per_source: HashMap<String, DateTime<FixedOffset>>,
}

impl Watermarks {
    pub fn new(scope: WatermarkScope, start: DateTime<FixedOffset>) -> Self {
        Self {
            scope,
            start,
            global: start,
            per_source: HashMap::new(),
        }
    }

    pub fn scope(&self) -> WatermarkScope {
        self.scope
    }

    /// Current boundary for events from `source`.
    pub fn get(&self, source: &str) -> DateTime<FixedOffset> {
        match self.scope {
            WatermarkScope::Global => self.global,
            WatermarkScope::PerSource => self.per_source.get(source).copied().unwrap_or(self.start),
        }
    }

    /// Move the boundary for `source` forward to `ts`.
    ///
    /// Returns false and leaves the boundary untouched if `ts` is not later.
    pub fn advance(&mut self, source: &str, ts: DateTime<FixedOffset>) -> bool {
        if ts <= self.get(source) {
            return false;
        }
        match self.scope {
            WatermarkScope::Global => self.global = ts,
            WatermarkScope::PerSource => {
                self.per_source.insert(source.to_string(), ts);
            }
        }
        true
    }
}
