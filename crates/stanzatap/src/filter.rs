//! Log and send filters.
//!
//! The two filters have opposite polarity: the log filter selects what gets
//! logged and logs nothing when unset, the send filter selects what gets
//! dropped and lets everything through when unset.

use tracing::{debug, warn};

use crate::error::Result;
use crate::pattern::{Pattern, PatternSpec};
use crate::stanza::Stanza;

/// Per-stanza log and send decisions.
#[derive(Debug, Clone, Default)]
pub struct FilterPolicy {
    log_filter: Option<Pattern>,
    send_filter: Option<Pattern>,
}

impl FilterPolicy {
    /// Create a policy with no filters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the stanza should be logged.
    #[must_use]
    pub fn should_log(&self, stanza: &Stanza) -> bool {
        self.log_filter
            .as_ref()
            .is_some_and(|filter| filter.matches(stanza.text()))
    }

    /// Whether the stanza should be forwarded to the transport.
    #[must_use]
    pub fn should_send(&self, stanza: &Stanza) -> bool {
        self.send_filter
            .as_ref()
            .map_or(true, |filter| !filter.matches(stanza.text()))
    }

    /// The current log filter.
    #[must_use]
    pub fn log_filter(&self) -> Option<&Pattern> {
        self.log_filter.as_ref()
    }

    /// The current send filter.
    #[must_use]
    pub fn send_filter(&self) -> Option<&Pattern> {
        self.send_filter.as_ref()
    }

    /// Install a log filter.
    ///
    /// On error the previous filter is kept.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidPattern`] if a text spec does not compile.
    pub fn set_log_filter(&mut self, spec: PatternSpec) -> Result<&Pattern> {
        let pattern = spec.compile()?;
        debug!(filter = %pattern, "Log filter set");
        Ok(self.log_filter.insert(pattern))
    }

    /// Replace the send filter.
    ///
    /// A text spec that fails to compile clears the filter, so every stanza
    /// is sent.
    pub fn set_send_filter(&mut self, spec: Option<PatternSpec>) {
        self.send_filter = match spec.map(PatternSpec::compile) {
            None => None,
            Some(Ok(pattern)) => {
                debug!(filter = %pattern, "Send filter set");
                Some(pattern)
            }
            Some(Err(e)) => {
                warn!(error = %e, "Ignoring send filter");
                None
            }
        };
    }
}
