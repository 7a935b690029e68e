//! Logging configuration for stanzatap.
//!
//! Two knobs live here. [`Verbosity`] decides which `tracing` events the
//! subscriber lets through, and is driven by the CLI flags. [`LogLevel`] is the
//! level a tap emits its stanza lines at, chosen per configuration call.

use std::fmt;
use std::str::FromStr;

use nu_ansi_term::{Color, Style};
use serde::{Deserialize, Serialize};
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::{FormatTime, SystemTime};
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{fmt as fmt_layer, prelude::*, EnvFilter};

use crate::logger::REALTIME_TAG;
use crate::stanza::Direction;

/// Verbosity level for logging output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    /// Suppress all output except errors.
    Quiet,
    /// Normal output level (info and above).
    #[default]
    Normal,
    /// Verbose output (debug and above).
    Verbose,
    /// Very verbose output (trace level).
    Trace,
}

impl Verbosity {
    /// Convert verbosity to tracing level filter.
    #[must_use]
    pub fn to_level_filter(&self) -> Level {
        match self {
            Self::Quiet => Level::ERROR,
            Self::Normal => Level::INFO,
            Self::Verbose => Level::DEBUG,
            Self::Trace => Level::TRACE,
        }
    }
}

/// Level at which a tap writes its stanza and mangling lines.
///
/// `Log` is the default and sits next to `Info`; both map to
/// [`Level::INFO`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Error level.
    Error,
    /// Warning level.
    Warn,
    /// Info level.
    Info,
    /// Plain log level.
    #[default]
    Log,
    /// Debug level.
    Debug,
}

impl LogLevel {
    /// All level names accepted by [`LogLevel::from_str`].
    pub const NAMES: [&'static str; 5] = ["error", "warn", "info", "log", "debug"];

    /// The `tracing` level events are emitted at.
    #[must_use]
    pub fn to_tracing_level(self) -> Level {
        match self {
            Self::Error => Level::ERROR,
            Self::Warn => Level::WARN,
            Self::Info | Self::Log => Level::INFO,
            Self::Debug => Level::DEBUG,
        }
    }

    /// Parse `name`, keeping `current` when the name is not recognised.
    #[must_use]
    pub fn parse_or(name: &str, current: Self) -> Self {
        name.parse().unwrap_or(current)
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Log => "log",
            Self::Debug => "debug",
        };
        f.write_str(name)
    }
}

/// Error returned when parsing an unknown level name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownLevel(pub String);

impl fmt::Display for UnknownLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unknown level '{}', expected one of {}",
            self.0,
            LogLevel::NAMES.join(", ")
        )
    }
}

impl std::error::Error for UnknownLevel {}

impl FromStr for LogLevel {
    type Err = UnknownLevel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "error" => Ok(Self::Error),
            "warn" => Ok(Self::Warn),
            "info" => Ok(Self::Info),
            "log" => Ok(Self::Log),
            "debug" => Ok(Self::Debug),
            other => Err(UnknownLevel(other.to_string())),
        }
    }
}

/// Emit a `tracing` event at a runtime-selected [`LogLevel`].
macro_rules! log_at {
    ($level:expr, $($arg:tt)+) => {
        match $level {
            $crate::logging::LogLevel::Error => ::tracing::error!($($arg)+),
            $crate::logging::LogLevel::Warn => ::tracing::warn!($($arg)+),
            $crate::logging::LogLevel::Info | $crate::logging::LogLevel::Log => {
                ::tracing::info!($($arg)+)
            }
            $crate::logging::LogLevel::Debug => ::tracing::debug!($($arg)+),
        }
    };
}

pub(crate) use log_at;

/// Event format for stanzatap's output.
///
/// Lines read like the default `fmt` output: timestamp, level, optional
/// target, then the fields. When the writer accepts ANSI escapes the level is
/// colored, and the direction marker of a stanza line is painted with
/// [`Direction::color`]. The marker travels as plain text in the message, so
/// other subscribers still show it.
#[derive(Debug, Clone, Copy, Default)]
pub struct StanzaFormat {
    display_target: bool,
}

impl StanzaFormat {
    /// Format without the event target.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Show the event target after the level.
    #[must_use]
    pub fn with_target(self, display_target: bool) -> Self {
        Self { display_target }
    }
}

/// Picks the `direction` field out of an event.
#[derive(Debug, Default)]
struct DirectionField(Option<Direction>);

impl Visit for DirectionField {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "direction" {
            self.0 = Direction::from_name(value);
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "direction" {
            self.0 = Direction::from_name(&format!("{value:?}"));
        }
    }
}

fn level_color(level: Level) -> Color {
    match level {
        Level::ERROR => Color::Red,
        Level::WARN => Color::Yellow,
        Level::INFO => Color::Green,
        Level::DEBUG => Color::Blue,
        Level::TRACE => Color::Purple,
    }
}

impl<S, N> FormatEvent<S, N> for StanzaFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let ansi = writer.has_ansi_escapes();
        let meta = event.metadata();

        let mut timestamp = String::new();
        SystemTime.format_time(&mut Writer::new(&mut timestamp))?;
        let level = format!("{:>5}", meta.level().as_str());
        if ansi {
            write!(
                writer,
                "{} {} ",
                Style::new().dimmed().paint(timestamp),
                level_color(*meta.level()).paint(level)
            )?;
        } else {
            write!(writer, "{timestamp} {level} ")?;
        }

        if self.display_target {
            write!(writer, "{}: ", meta.target())?;
        }

        // Fields go through the field formatter first so message text stays
        // sanitized; only the marker this formatter adds carries escapes.
        let mut fields = String::new();
        ctx.field_format()
            .format_fields(Writer::new(&mut fields), event)?;

        let mut direction = DirectionField::default();
        event.record(&mut direction);
        if let (true, Some(direction)) = (ansi, direction.0) {
            let plain = format!("{REALTIME_TAG} {}", direction.marker());
            if let Some(rest) = fields.strip_prefix(&plain) {
                fields = format!(
                    "{REALTIME_TAG} {}{rest}",
                    direction.color().paint(direction.marker())
                );
            }
        }

        writeln!(writer, "{fields}")
    }
}

/// Initialize the logging system.
///
/// This should be called once at application startup. The logging level can be
/// controlled via:
/// 1. The `verbosity` parameter
/// 2. The `RUST_LOG` environment variable (takes precedence)
///
/// # Examples
///
/// ```no_run
/// use stanzatap::{init_logging, logging::Verbosity};
///
/// init_logging(Verbosity::Verbose);
/// ```
pub fn init_logging(verbosity: Verbosity) {
    let default_filter = format!("stanzatap={}", verbosity.to_level_filter());

    // Allow RUST_LOG to override
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&default_filter));

    let subscriber = tracing_subscriber::registry().with(env_filter).with(
        fmt_layer::layer()
            .event_format(StanzaFormat::new())
            .with_writer(std::io::stderr),
    );

    // Install the subscriber (ignore error if already set)
    let _ = subscriber.try_init();
}

/// Initialize logging for tests.
///
/// Only warnings and errors are shown by default to keep test output clean.
#[cfg(test)]
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("warn")
        .with_test_writer()
        .try_init();
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::sync::{Arc, Mutex, PoisonError};

    use super::*;

    #[derive(Debug, Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Captured {
        fn write(&mut self, data: &[u8]) -> io::Result<usize> {
            self.0
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .extend_from_slice(data);
            Ok(data.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn capture(ansi: bool, f: impl FnOnce()) -> String {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(Level::DEBUG)
            .with_ansi(ansi)
            .event_format(StanzaFormat::new())
            .with_writer(move || writer.clone())
            .finish();
        tracing::subscriber::with_default(subscriber, f);
        let buf = captured.0.lock().unwrap_or_else(PoisonError::into_inner);
        String::from_utf8_lossy(&buf).into_owned()
    }

    #[test]
    fn test_verbosity_to_level() {
        assert_eq!(Verbosity::Quiet.to_level_filter(), Level::ERROR);
        assert_eq!(Verbosity::Normal.to_level_filter(), Level::INFO);
        assert_eq!(Verbosity::Verbose.to_level_filter(), Level::DEBUG);
        assert_eq!(Verbosity::Trace.to_level_filter(), Level::TRACE);
    }

    #[test]
    fn test_verbosity_default() {
        assert_eq!(Verbosity::default(), Verbosity::Normal);
    }

    #[test]
    fn test_log_level_parse() {
        for name in LogLevel::NAMES {
            let level: LogLevel = name.parse().unwrap();
            assert_eq!(level.to_string(), name);
        }
        assert!("verbose".parse::<LogLevel>().is_err());
        assert!("LOG".parse::<LogLevel>().is_err());
    }

    #[test]
    fn test_log_level_parse_or_keeps_previous() {
        assert_eq!(LogLevel::parse_or("nonsense", LogLevel::Warn), LogLevel::Warn);
        assert_eq!(LogLevel::parse_or("debug", LogLevel::Warn), LogLevel::Debug);
    }

    #[test]
    fn test_log_level_default_is_log() {
        assert_eq!(LogLevel::default(), LogLevel::Log);
    }

    #[test]
    fn test_log_level_to_tracing() {
        assert_eq!(LogLevel::Error.to_tracing_level(), Level::ERROR);
        assert_eq!(LogLevel::Warn.to_tracing_level(), Level::WARN);
        assert_eq!(LogLevel::Info.to_tracing_level(), Level::INFO);
        assert_eq!(LogLevel::Log.to_tracing_level(), Level::INFO);
        assert_eq!(LogLevel::Debug.to_tracing_level(), Level::DEBUG);
    }

    #[test]
    fn test_unknown_level_display() {
        let err = "loud".parse::<LogLevel>().unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("loud"));
        assert!(msg.contains("debug"));
    }

    #[test]
    fn test_log_at_every_level() {
        let out = capture(false, || {
            for name in LogLevel::NAMES {
                let level: LogLevel = name.parse().unwrap();
                log_at!(level, "level {}", level);
            }
        });

        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 5);
        assert!(lines[0].contains("ERROR level error"));
        assert!(lines[1].contains(" WARN level warn"));
        assert!(lines[2].contains(" INFO level info"));
        assert!(lines[3].contains(" INFO level log"));
        assert!(lines[4].contains("DEBUG level debug"));
    }

    #[test]
    fn test_marker_painted_when_ansi() {
        let out = capture(true, || {
            tracing::error!(direction = %Direction::Outbound, "[realtime] ⬆ +0ms   <iq/>");
            tracing::info!(direction = %Direction::Inbound, "[realtime] ⬇ +5ms   <iq/>");
        });

        let red = Direction::Outbound.color().paint("⬆").to_string();
        let green = Direction::Inbound.color().paint("⬇").to_string();
        assert!(out.contains(&format!("[realtime] {red} +0ms")));
        assert!(out.contains(&format!("[realtime] {green} +5ms")));
        assert!(!out.contains("\\x1b"));
    }

    #[test]
    fn test_marker_plain_without_ansi() {
        let out = capture(false, || {
            tracing::warn!(direction = %Direction::Outbound, "[realtime] ⬆ +0ms   <iq/>");
        });

        assert!(out.contains(" WARN [realtime] ⬆ +0ms"));
        assert!(!out.contains('\u{1b}'));
    }

    #[test]
    fn test_message_escapes_stay_sanitized() {
        let out = capture(true, || {
            tracing::info!(direction = %Direction::Inbound, "unknown stanza \u{1b}[2J");
        });

        assert!(!out.contains("\u{1b}[2J"));
        assert!(out.contains("unknown stanza"));
    }

    #[test]
    fn test_target_shown_on_request() {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .event_format(StanzaFormat::new().with_target(true))
            .with_writer(move || writer.clone())
            .finish();
        tracing::subscriber::with_default(subscriber, || tracing::info!("hello"));

        let buf = captured.0.lock().unwrap_or_else(PoisonError::into_inner);
        let out = String::from_utf8_lossy(&buf);
        assert!(out.contains(" INFO stanzatap::logging::tests: hello"));
    }

    #[test]
    fn test_init_test_logging_does_not_panic() {
        init_test_logging();
        init_test_logging();
    }

    #[test]
    fn test_init_logging_does_not_panic() {
        init_logging(Verbosity::Normal);
        init_logging(Verbosity::Quiet);
    }
}
