//! Parsing of the active node and room listings.
//!
//! The listings are machine-rendered pages with an "Update every ..." banner
//! followed by one JavaScript object literal per entity:
//!
//! ```text
//! dataList[0] = {id:"HB9TF-ND", dtmf_id:"12345", call_sign:"HB9TF", ...};
//! ```
//!
//! Every captured field is HTML-unescaped before use.

use std::sync::LazyLock;

use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::FormatError;
use crate::types::{Location, Node, Room};

/// Date/time format of the update banner, without the zone abbreviation.
const UPDATE_TIME_FORMAT: &str = "%d %b %Y %H:%M:%S";

static UPDATE_TIME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<p class=.*><span>Update every .*</span> <span>(.*)</span></p>")
        .expect("valid update banner pattern")
});

static NODE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r#"dataList\[[0-9]+\] = \{id:"(.*?)", dtmf_id:"([0-9]+)", call_sign:"(.*?)", "#,
        r#"ana_dig:"(.*?)", city:"(.*?)", state:"(.*?)", country:"(.*?)", freq:"(.*?)", "#,
        r#"sql:"(.*?)", lat:"(.*?)", lon:"(.*?)", comment:"(.*?)"\};"#,
    ))
    .expect("valid node record pattern")
});

static ROOM_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r#"dataList\[[0-9]+\] = \{id:"(.*?)", dtmf_id:"([0-9]+)", room_name:"(.*?)", "#,
        r#"city:"(.*?)", state:"(.*?)", country:"(.*?)", comment:"(.*?)"\};"#,
    ))
    .expect("valid room record pattern")
});

static LAT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([NS]):([0-9]+) ([0-9]+)' ([0-9]+(?:\.[0-9]+)?)").expect("valid latitude pattern")
});

static LON_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([EW]):([0-9]+) ([0-9]+)' ([0-9]+(?:\.[0-9]+)?)").expect("valid longitude pattern")
});

/// Which longitude hemisphere is negated.
///
/// The default negates eastern longitudes, the reverse of the usual
/// convention. Map links for consumers that expect standard coordinates
/// need `WestNegative`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LongitudeConvention {
    #[default]
    EastNegative,
    WestNegative,
}

/// Records parsed from one listing document.
#[derive(Debug, Clone)]
pub struct Listing<T> {
    /// Time from the update banner, if present and readable.
    pub last_update: Option<DateTime<Utc>>,
    pub records: Vec<T>,
}

/// Parse the active node listing.
pub fn parse_nodes(
    document: &str,
    convention: LongitudeConvention,
    source: &str,
) -> Result<Listing<Node>, FormatError> {
    let mut listing = Listing {
        last_update: None,
        records: Vec::new(),
    };

    for line in document.lines() {
        if let Some(ts) = parse_banner(line) {
            listing.last_update = Some(ts);
            continue;
        }
        let Some(caps) = NODE_RE.captures(line) else {
            continue;
        };
        let field = |i: usize| unescape(&caps[i]);

        let (lat, lon) = match coordinates(&field(10), &field(11), convention) {
            Ok(coords) => coords,
            Err(e) => {
                tracing::trace!("[directory] node {}: {e}", field(1));
                (0.0, 0.0)
            }
        };
        listing.records.push(Node {
            id: field(1),
            dtmf_id: field(2),
            callsign: field(3),
            mode: field(4),
            location: Location {
                city: field(5),
                state: field(6),
                country: field(7),
                lat,
                lon,
            },
            freq: field(8),
            sql: field(9),
            comment: field(12),
        });
    }

    if listing.records.is_empty() {
        return Err(FormatError::EmptyListing {
            kind: "node",
            source_id: source.to_string(),
        });
    }
    Ok(listing)
}

/// Parse the active room listing.
pub fn parse_rooms(document: &str, source: &str) -> Result<Listing<Room>, FormatError> {
    let mut listing = Listing {
        last_update: None,
        records: Vec::new(),
    };

    for line in document.lines() {
        if let Some(ts) = parse_banner(line) {
            listing.last_update = Some(ts);
            continue;
        }
        if let Some(caps) = ROOM_RE.captures(line) {
            let field = |i: usize| unescape(&caps[i]);
            listing.records.push(Room {
                id: field(1),
                dtmf_id: field(2),
                name: field(3),
                location: Location {
                    city: field(4),
                    state: field(5),
                    country: field(6),
                    lat: 0.0,
                    lon: 0.0,
                },
                comment: field(7),
            });
        }
    }

    if listing.records.is_empty() {
        return Err(FormatError::EmptyListing {
            kind: "room",
            source_id: source.to_string(),
        });
    }
    Ok(listing)
}

/// Read the "Update every ..." banner, e.g. `19 Oct 2026 09:20:01 JST`.
///
/// Known abbreviations map to their offset; any other abbreviation is read
/// as UTC.
fn parse_banner(line: &str) -> Option<DateTime<Utc>> {
    let caps = UPDATE_TIME_RE.captures(line)?;
    let value = caps[1].trim();
    let (stamp, zone) = value.rsplit_once(' ')?;
    let naive = NaiveDateTime::parse_from_str(stamp, UPDATE_TIME_FORMAT).ok()?;
    let offset_hours = match zone {
        "JST" => 9,
        _ => 0,
    };
    let offset = FixedOffset::east_opt(offset_hours * 3600)?;
    offset
        .from_local_datetime(&naive)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Convert `N:47 22' 35` style coordinates into signed decimal degrees.
pub fn coordinates(
    lat: &str,
    lon: &str,
    convention: LongitudeConvention,
) -> Result<(f64, f64), FormatError> {
    let (lat_hemisphere, lat_abs) = sexagesimal(&LAT_RE, lat)?;
    let (lon_hemisphere, lon_abs) = sexagesimal(&LON_RE, lon)?;

    let lat = if lat_hemisphere == "S" { -lat_abs } else { lat_abs };
    let negated = match convention {
        LongitudeConvention::EastNegative => "E",
        LongitudeConvention::WestNegative => "W",
    };
    let lon = if lon_hemisphere == negated { -lon_abs } else { lon_abs };
    Ok((lat, lon))
}

fn sexagesimal<'a>(re: &Regex, value: &'a str) -> Result<(&'a str, f64), FormatError> {
    let invalid = |reason: &str| FormatError::Coordinate {
        value: value.to_string(),
        reason: reason.to_string(),
    };
    let caps = re.captures(value).ok_or_else(|| invalid("unrecognized format"))?;
    let hemisphere = caps.get(1).map_or("", |m| m.as_str());

    let mut parts = [0.0f64; 3];
    for (slot, i) in parts.iter_mut().zip(2usize..=4) {
        *slot = caps[i].parse().map_err(|_| invalid("not a number"))?;
    }
    let [deg, min, sec] = parts;
    Ok((hemisphere, deg + (min + sec / 60.0) / 60.0))
}

fn unescape(value: &str) -> String {
    html_escape::decode_html_entities(value).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    const NODES: &str = r#"<html><body>
<p class="update"><span>Update every 20 minutes</span> <span>01 Jan 2023 18:00:00 JST</span></p>
<script>
dataList[0] = {id:"HB9TF-ND", dtmf_id:"12345", call_sign:"HB9TF", ana_dig:"DN", city:"Z&uuml;rich", state:"ZH", country:"Switzerland", freq:"438.900", sql:"CSQ", lat:"N:47 22&#39; 12", lon:"E:8 32&#39; 24", comment:"Hello &amp; welcome"};
dataList[1] = {id:"W1AW-ND", dtmf_id:"54321", call_sign:"W1AW", ana_dig:"DV", city:"Newington", state:"CT", country:"USA", freq:"", sql:"", lat:"", lon:"", comment:""};
</script></body></html>"#;

    const ROOMS: &str = r#"dataList[0] = {id:"CH-SWISS-ROOM", dtmf_id:"21139", room_name:"Swiss &quot;Room&quot;", city:"Bern", state:"BE", country:"Switzerland", comment:"All welcome"};"#;

    #[test]
    fn test_parse_nodes_fields_and_banner() {
        let listing = parse_nodes(NODES, LongitudeConvention::EastNegative, "t").unwrap();
        assert_eq!(listing.records.len(), 2);

        let node = &listing.records[0];
        assert_eq!(node.id, "HB9TF-ND");
        assert_eq!(node.dtmf_id, "12345");
        assert_eq!(node.callsign, "HB9TF");
        assert_eq!(node.mode, "DN");
        assert_eq!(node.location.city, "Zürich");
        assert_eq!(node.freq, "438.900");
        assert_eq!(node.comment, "Hello & welcome");

        let update = listing.last_update.unwrap();
        assert_eq!(update.hour(), 9, "JST banner converts to UTC");
    }

    #[test]
    fn test_unparsable_coordinates_default_to_zero() {
        let listing = parse_nodes(NODES, LongitudeConvention::EastNegative, "t").unwrap();
        let node = &listing.records[1];
        assert_eq!((node.location.lat, node.location.lon), (0.0, 0.0));
        assert!(!node.location.has_coordinates());
    }

    #[test]
    fn test_longitude_conventions() {
        let (lat, lon) = coordinates("N:47 22' 12", "E:8 32' 24", LongitudeConvention::EastNegative)
            .unwrap();
        assert!((lat - 47.37).abs() < 1e-9);
        assert!((lon + 8.54).abs() < 1e-9);

        let (_, lon) = coordinates("N:47 22' 12", "E:8 32' 24", LongitudeConvention::WestNegative)
            .unwrap();
        assert!((lon - 8.54).abs() < 1e-9);

        let (lat, lon) = coordinates("S:33 52' 0", "W:70 0' 0", LongitudeConvention::WestNegative)
            .unwrap();
        assert!(lat < 0.0 && lon < 0.0);
    }

    #[test]
    fn test_bad_coordinate_is_format_error() {
        let err = coordinates("X:1 2' 3", "E:1 2' 3", LongitudeConvention::EastNegative);
        assert!(matches!(err, Err(FormatError::Coordinate { .. })));
    }

    #[test]
    fn test_parse_rooms() {
        let listing = parse_rooms(ROOMS, "t").unwrap();
        assert!(listing.last_update.is_none());
        let room = &listing.records[0];
        assert_eq!(room.id, "CH-SWISS-ROOM");
        assert_eq!(room.dtmf_id, "21139");
        assert_eq!(room.name, "Swiss \"Room\"");
        assert_eq!(room.location.label(), "Bern, BE, Switzerland");
    }

    #[test]
    fn test_listing_without_records_is_format_error() {
        let err = parse_nodes("<html>down for maintenance</html>", LongitudeConvention::default(), "t");
        assert!(matches!(err, Err(FormatError::EmptyListing { kind: "node", .. })));
    }
}
