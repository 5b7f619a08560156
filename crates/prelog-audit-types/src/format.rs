//! Line formats for the per-process audit log.
//!
//! The default [`LineFormat::Pipe`] format writes one header line
//!
//! ```text
//! @<actor>|<pid>|<cmdline>
//! ```
//!
//! followed by one line per event:
//!
//! ```text
//! <timestamp>|<interpretation>[|<uri>|<text>|<origin>]...
//! ```
//!
//! Every subject block has the same shape whatever the subject count, and an
//! absent origin is written as an empty field. Backslashes, pipes and
//! newlines inside fields are escaped so that a record never spans lines.

use crate::{Event, Interpretation, Subject};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use strum::{Display, EnumString};

/// Field separator of the pipe format.
pub const SEPARATOR: char = '|';

/// Prefix marking the header line of the pipe format.
pub const HEADER_MARKER: char = '@';

/// Serialization format for log lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[derive(Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum LineFormat {
    /// Pipe-delimited text.
    #[default]
    Pipe,
    /// One JSON object per line.
    Json,
}

impl LineFormat {
    /// Render the header line identifying the writing process.
    pub fn header(&self, actor: &str, pid: i32, cmdline: &str) -> String {
        match self {
            Self::Pipe => format!(
                "{HEADER_MARKER}{}{SEPARATOR}{pid}{SEPARATOR}{}\n",
                escape_field(actor),
                escape_field(cmdline)
            ),
            Self::Json => {
                let header = JsonHeader { actor, pid, cmdline };
                match serde_json::to_string(&header) {
                    Ok(json) => json + "\n",
                    Err(_) => String::new(),
                }
            }
        }
    }

    /// Render one event, or `None` if the event has no interpretation.
    pub fn event(&self, event: &Event) -> Option<String> {
        let interpretation = event.interpretation?;
        match self {
            Self::Pipe => Some(pipe_event(event, interpretation)),
            Self::Json => {
                let line = JsonEvent {
                    timestamp: event.timestamp.timestamp(),
                    interpretation,
                    subjects: &event.subjects,
                };
                serde_json::to_string(&line).ok().map(|json| json + "\n")
            }
        }
    }
}

fn pipe_event(event: &Event, interpretation: Interpretation) -> String {
    let mut line = format!(
        "{}{SEPARATOR}{}",
        event.timestamp.timestamp(),
        interpretation.as_str()
    );

    for Subject { uri, origin, text } in &event.subjects {
        line.push(SEPARATOR);
        line.push_str(&escape_field(uri));
        line.push(SEPARATOR);
        line.push_str(&escape_field(text));
        line.push(SEPARATOR);
        if let Some(origin) = origin {
            line.push_str(&escape_field(origin));
        }
    }

    line.push('\n');
    line
}

/// Escape a field so it cannot break the pipe format.
pub fn escape_field(field: &str) -> Cow<'_, str> {
    if !field.contains(['\\', SEPARATOR, '\n', '\r']) {
        return Cow::Borrowed(field);
    }

    let mut escaped = String::with_capacity(field.len() + 8);
    for c in field.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            SEPARATOR => escaped.push_str("\\|"),
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            c => escaped.push(c),
        }
    }
    Cow::Owned(escaped)
}

#[derive(Serialize)]
struct JsonHeader<'a> {
    actor: &'a str,
    pid: i32,
    cmdline: &'a str,
}

#[derive(Serialize)]
struct JsonEvent<'a> {
    #[serde(rename = "ts")]
    timestamp: i64,
    interpretation: Interpretation,
    subjects: &'a [Subject],
}
