//! Wires-X log page parser.
//!
//! The status page is HTML meant for browsers, not machines. The document is
//! split into lines and every line is run through a priority-ordered rule
//! table; the first rule whose pattern matches handles the line and the rest
//! are skipped. Lines no rule recognizes are decoration and are ignored, as
//! are timestamped lines whose timestamp does not parse.

use std::sync::LazyLock;

use chrono::{FixedOffset, NaiveDateTime, TimeZone};
use chrono_tz::Tz;
use regex::{Captures, Regex};

use crate::error::FormatError;
use crate::types::{Event, Snapshot};

/// Date/time format used in Wires-X logs.
pub const TIME_FORMAT: &str = "%Y/%m/%d %H:%M:%S";

/// Characters trimmed on either side of an event message.
const MSG_TRIM_SET: &[char] = &[' ', '*', '-'];

static LINE_BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<br\s*/?>|\r?\n").expect("valid line break pattern"));

type Handler = fn(&mut Snapshot, &Captures<'_>, &str, Tz);

struct Rule {
    name: &'static str,
    pattern: Regex,
    handle: Handler,
}

impl Rule {
    fn new(name: &'static str, pattern: &str, handle: Handler) -> Self {
        Self {
            name,
            pattern: Regex::new(pattern).expect("valid log rule pattern"),
            handle,
        }
    }
}

static RULES: LazyLock<Vec<Rule>> = LazyLock::new(|| {
    vec![
        Rule::new("title", r"<title>(.*)</title>", |log, caps, _, _| {
            log.log_type = caps[1].trim().to_string();
        }),
        Rule::new(
            "version",
            r#"<body><a href=".*">(WIRES-X [^<]*)"#,
            |log, caps, _, _| {
                log.wires_version = caps[1].trim().to_string();
            },
        ),
        Rule::new(
            "node",
            r"NODE: <b>(.*) , (.*\([0-9]+\)) </b>",
            |log, caps, _, _| {
                log.id = format!("{}, {}", &caps[1], &caps[2]);
            },
        ),
        Rule::new(
            "room",
            r"ROOM: <b>(.*) , (.*\([0-9]+\)) </b>",
            |log, caps, _, _| {
                log.id = format!("{}, {}", &caps[1], &caps[2]);
            },
        ),
        Rule::new("connected", r"Connect to <b>(.*)</b>", |log, caps, _, _| {
            log.connected_to = Some(caps[1].trim().to_string());
        }),
        Rule::new(
            "message",
            r"([0-9]{4}/[0-9]{2}/[0-9]{2} [0-9]{2}:[0-9]{2}:[0-9]{2})[[:space:]]+(.*)",
            |log, caps, line, tz| {
                let Some(ts) = parse_timestamp(&caps[1], tz) else {
                    return;
                };
                log.events.push(Event {
                    raw: line.to_string(),
                    ts,
                    msg: trim_message(&caps[2]),
                });
            },
        ),
    ]
});

/// Parse a fetched log document into a [`Snapshot`].
///
/// Fails only when the document yields neither header fields nor events.
pub fn parse(document: &str, tz: Tz, source: &str) -> Result<Snapshot, FormatError> {
    let mut log = Snapshot {
        source: source.to_string(),
        ..Snapshot::default()
    };

    for line in LINE_BREAK.split(document) {
        if line.trim().is_empty() {
            continue;
        }
        for rule in RULES.iter() {
            if let Some(caps) = rule.pattern.captures(line) {
                (rule.handle)(&mut log, &caps, line, tz);
                tracing::trace!("[parser] line matched {} rule", rule.name);
                break;
            }
        }
    }

    if log.is_empty() {
        return Err(FormatError::EmptyLog {
            source_id: source.to_string(),
        });
    }
    Ok(log)
}

/// Interpret a log timestamp in the configured zone.
///
/// Ambiguous local times (DST fold) resolve to the earlier instant; local
/// times that do not exist are rejected.
pub fn parse_timestamp(value: &str, tz: Tz) -> Option<chrono::DateTime<FixedOffset>> {
    let naive = NaiveDateTime::parse_from_str(value, TIME_FORMAT).ok()?;
    tz.from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.fixed_offset())
}

fn trim_message(msg: &str) -> String {
    msg.trim().trim_matches(MSG_TRIM_SET).to_string()
}
