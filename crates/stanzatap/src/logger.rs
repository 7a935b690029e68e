//! Annotated stanza log lines.
//!
//! Each accepted stanza becomes one line carrying a direction marker, the
//! time since the previous logged stanza (or an absolute timestamp) and the
//! stanza itself, pretty-printed when it parses as XML.

use std::fmt;

use chrono::{SecondsFormat, Utc};
use quick_xml::events::Event;
use quick_xml::{Reader, Writer};
use tokio::time::Instant;
use tracing::trace;

use crate::filter::FilterPolicy;
use crate::logging::{log_at, LogLevel};
use crate::stanza::{Direction, Stanza};
use crate::time_format::format_delta;

/// Tag that opens every recognised stanza line.
pub const REALTIME_TAG: &str = "[realtime]";

/// Body of a log line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StanzaBody {
    /// A recognised stanza, indented when it parsed as XML.
    Stanza(String),
    /// Anything else, logged verbatim.
    Unknown(String),
}

/// One rendered log line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    /// Which way the stanza travelled.
    pub direction: Direction,
    /// Delta or absolute timestamp.
    pub time: String,
    /// The stanza.
    pub body: StanzaBody,
}

impl fmt::Display for LogRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.body {
            StanzaBody::Stanza(xml) => write!(
                f,
                "{REALTIME_TAG} {} {} {}",
                self.direction.marker(),
                self.time,
                xml
            ),
            StanzaBody::Unknown(text) => write!(f, "unknown stanza {text}"),
        }
    }
}

/// Re-indent XML text. Returns `None` if it does not parse.
#[must_use]
pub fn pretty_print_xml(xml: &str) -> Option<String> {
    let mut reader = Reader::from_str(xml.trim());
    reader.config_mut().trim_text(true);
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    let mut depth: usize = 0;

    loop {
        match reader.read_event() {
            Ok(Event::Eof) => break,
            Ok(event) => {
                match &event {
                    Event::Start(_) => depth += 1,
                    Event::End(_) => depth = depth.checked_sub(1)?,
                    _ => {}
                }
                writer.write_event(event).ok()?;
            }
            Err(e) => {
                trace!(error = %e, "Stanza is not well-formed XML");
                return None;
            }
        }
    }

    if depth != 0 {
        return None;
    }
    String::from_utf8(writer.into_inner()).ok()
}

/// Emits log lines and tracks the time of the last logged stanza.
#[derive(Debug, Clone, Default)]
pub struct StanzaLogger {
    last_stanza_time: Option<Instant>,
}

impl StanzaLogger {
    /// Create a logger that has not logged anything yet.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// When the last stanza was logged.
    #[must_use]
    pub fn last_stanza_time(&self) -> Option<Instant> {
        self.last_stanza_time
    }

    /// Decide and build the log line for a stanza without emitting it.
    ///
    /// Returns `None` when the log filter rejects the stanza. Otherwise the
    /// last-stanza time moves to now.
    pub fn render(
        &mut self,
        direction: Direction,
        stanza: &Stanza,
        policy: &FilterPolicy,
        absolute_time: bool,
    ) -> Option<LogRecord> {
        if !policy.should_log(stanza) {
            return None;
        }

        let now = Instant::now();
        let time = if absolute_time {
            Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
        } else {
            let delta = self
                .last_stanza_time
                .map_or(0, |last| now.duration_since(last).as_millis());
            format_delta(i64::try_from(delta).unwrap_or(i64::MAX))
        };

        let body = if stanza.is_recognized() {
            StanzaBody::Stanza(
                pretty_print_xml(stanza.text()).unwrap_or_else(|| stanza.text().to_string()),
            )
        } else {
            StanzaBody::Unknown(stanza.text().to_string())
        };

        self.last_stanza_time = Some(now);
        Some(LogRecord {
            direction,
            time,
            body,
        })
    }

    /// Log a stanza at `level` if the policy accepts it.
    pub fn log_stanza(
        &mut self,
        direction: Direction,
        stanza: &Stanza,
        policy: &FilterPolicy,
        level: LogLevel,
        absolute_time: bool,
    ) -> Option<LogRecord> {
        let record = self.render(direction, stanza, policy, absolute_time)?;
        log_at!(level, direction = %direction, "{record}");
        Some(record)
    }
}
