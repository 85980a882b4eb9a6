pub mod cli;
pub mod config;
pub mod directory;
pub mod error;
pub mod fetch;
pub mod logging;
pub mod orchestrator;
pub mod parser;
pub mod poller;
pub mod processor;
pub mod sink;
pub mod types;

#[cfg(test)]
mod test_support;

pub use config::Settings;
pub use directory::{Directory, DirectoryCache, EntityKind, LookupKey};
pub use error::{ConfigError, DispatchError, Error, FetchError, FormatError, Result};
pub use fetch::{Fetch, Source};
pub use orchestrator::{Relay, RunSummary};
pub use processor::{ProcessReport, Processor, ProcessorOptions};
pub use sink::{Message, NotificationSink, SlackWebhook};
pub use types::{Entity, Event, Location, Node, Room, Snapshot};
