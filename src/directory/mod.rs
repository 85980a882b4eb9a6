//! Directory of active Wires-X nodes and rooms.

mod cache;
mod listing;
mod refresher;

pub use cache::{Directory, DirectoryCache, DirectorySources, EntityKind, LookupKey};
pub use listing::{Listing, LongitudeConvention, coordinates, parse_nodes, parse_rooms};
pub use refresher::DirectoryRefresher;
