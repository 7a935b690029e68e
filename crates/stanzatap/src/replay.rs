//! Replaying captured traffic through a tap.
//!
//! A capture file holds one stanza per line, prefixed with `>` for outbound
//! or `<` for inbound and separated from the XML by whitespace:
//!
//! ```text
//! # session start
//! > <iq type="get" id="1"><query/></iq>
//! < <iq type="result" id="1"/>
//! ```
//!
//! Blank lines and lines starting with `#` are skipped.

use std::path::Path;

use tracing::debug;

use crate::error::{Error, Result};
use crate::host::{ProtocolInstance, StanzaTransport};
use crate::intercept::TappedTransport;
use crate::loopback::{LoopbackInstance, LoopbackRegistry, LoopbackTransport};
use crate::stanza::{Direction, Stanza};
use crate::tap::Tap;

/// Id of the instance captured traffic is replayed through.
pub const REPLAY_INSTANCE_ID: &str = "replay";

/// One parsed line of a capture file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureLine {
    /// 1-based line number in the source.
    pub line: usize,
    /// Which way the stanza travelled.
    pub direction: Direction,
    /// The stanza itself.
    pub stanza: Stanza,
}

/// Parse a capture file.
///
/// # Errors
///
/// Returns [`Error::MalformedCapture`] for the first line without a direction
/// marker.
pub fn parse_capture(input: &str) -> Result<Vec<CaptureLine>> {
    input
        .lines()
        .enumerate()
        .filter_map(|(index, raw)| {
            let trimmed = raw.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                return None;
            }
            Some(parse_line(index + 1, trimmed))
        })
        .collect()
}

/// Read and parse a capture file from disk.
///
/// # Errors
///
/// Returns [`Error::Io`] if the file cannot be read, or
/// [`Error::MalformedCapture`] as [`parse_capture`] does.
pub fn read_capture(path: impl AsRef<Path>) -> Result<Vec<CaptureLine>> {
    let input = std::fs::read_to_string(path)?;
    parse_capture(&input)
}

fn parse_line(line: usize, trimmed: &str) -> Result<CaptureLine> {
    let malformed = || Error::MalformedCapture {
        line,
        content: trimmed.to_string(),
    };

    let mut chars = trimmed.chars();
    let direction = match chars.next() {
        Some('>') => Direction::Outbound,
        Some('<') => Direction::Inbound,
        _ => return Err(malformed()),
    };

    let rest = chars.as_str();
    if !rest.starts_with(char::is_whitespace) {
        return Err(malformed());
    }
    let text = rest.trim_start();
    if text.is_empty() {
        return Err(malformed());
    }

    Ok(CaptureLine {
        line,
        direction,
        stanza: Stanza::raw(text),
    })
}

/// Totals from a replay run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    /// Outbound stanzas as they reached the transport.
    pub forwarded: Vec<Stanza>,
    /// Outbound stanzas stopped by the send filter.
    pub dropped: usize,
    /// Inbound stanzas delivered.
    pub inbound: usize,
}

/// Drives captured stanzas through a tapped loopback instance.
#[derive(Debug)]
pub struct Replayer {
    tap: Tap,
    instance: LoopbackInstance,
    transport: TappedTransport<LoopbackTransport>,
}

impl Replayer {
    /// Register a loopback instance and tap it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DiscoveryFailed`] if the tap's locator has already
    /// given up.
    pub async fn start(tap: Tap) -> Result<Self> {
        let instance = LoopbackInstance::connected(REPLAY_INSTANCE_ID);
        let registry = LoopbackRegistry::with_instance(instance.clone());
        let transport = tap.run(&registry).await?;
        Ok(Self {
            tap,
            instance,
            transport,
        })
    }

    /// The tap stanzas flow through.
    #[must_use]
    pub fn tap(&self) -> &Tap {
        &self.tap
    }

    /// Feed a single line. Returns the stanza the transport received, if
    /// the line was outbound and not dropped.
    ///
    /// # Errors
    ///
    /// Returns any error from the underlying transport.
    pub fn feed(&self, line: &CaptureLine) -> Result<Option<Stanza>> {
        match line.direction {
            Direction::Inbound => {
                self.instance.deliver(&line.stanza);
                Ok(None)
            }
            Direction::Outbound => {
                self.transport.send(line.stanza.clone(), Vec::new())?;
                let forwarded = self.instance.take_sent().pop().map(|sent| sent.stanza);
                if forwarded.is_none() {
                    debug!(line = line.line, "Outbound stanza dropped");
                }
                Ok(forwarded)
            }
        }
    }

    /// Feed every line in order.
    ///
    /// # Errors
    ///
    /// Stops at the first transport error.
    pub fn run(&self, lines: &[CaptureLine]) -> Result<ReplaySummary> {
        let mut summary = ReplaySummary::default();
        for line in lines {
            match (line.direction, self.feed(line)?) {
                (Direction::Inbound, _) => summary.inbound += 1,
                (Direction::Outbound, Some(stanza)) => summary.forwarded.push(stanza),
                (Direction::Outbound, None) => summary.dropped += 1,
            }
        }
        debug!(
            id = %self.instance.id(),
            forwarded = summary.forwarded.len(),
            dropped = summary.dropped,
            inbound = summary.inbound,
            "Replay finished"
        );
        Ok(summary)
    }
}
