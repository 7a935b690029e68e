//! Applying tap settings to a [`TapContext`].
//!
//! [`Configurator::configure`] is the one place settings change at runtime.
//! It installs the log filter and persists it, replaces the send filter and
//! the mangle rules, and picks the stanza log level.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, warn};

use crate::context::{DiscoveryState, TapContext};
use crate::logging::LogLevel;
use crate::mangle::{thaw_ice_rules, MangleRule};
use crate::pattern::{Pattern, PatternSpec};
use crate::storage::FilterStore;

/// Settings that accompany the log filter and level.
#[derive(Debug, Clone, Default)]
pub struct TapOptions {
    /// Print wall-clock timestamps instead of deltas.
    pub absolute_time: bool,
    /// Outbound stanzas matching this are dropped.
    pub filter_realtime: Option<PatternSpec>,
    /// Rewrite rules for outbound stanzas.
    pub mangle_stanzas: Option<Vec<MangleRule>>,
    /// Install the built-in address and credential rules when no rules are given.
    pub thaw_ice: bool,
    /// How long rewriting stays active after the first rewrite.
    pub refreeze: Option<Duration>,
}

/// Result of a [`Configurator::configure`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigureOutcome {
    /// Settings applied to a tapped instance.
    Applied,
    /// Settings applied, but no instance is tapped yet.
    Pending,
    /// Discovery failed; nothing changed.
    Unavailable,
}

impl fmt::Display for ConfigureOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Applied => write!(f, "applied"),
            Self::Pending => write!(f, "pending"),
            Self::Unavailable => write!(f, "unavailable"),
        }
    }
}

/// Public entry point for changing tap settings.
pub struct Configurator {
    ctx: TapContext,
    store: Arc<dyn FilterStore>,
}

impl fmt::Debug for Configurator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Configurator")
            .field("ctx", &self.ctx)
            .finish_non_exhaustive()
    }
}

impl Configurator {
    /// Create a configurator and restore the persisted log filter.
    ///
    /// A stored value that cannot be read or parsed is logged and ignored.
    pub fn new(ctx: TapContext, store: Arc<dyn FilterStore>) -> Self {
        let configurator = Self { ctx, store };
        configurator.restore_log_filter();
        configurator
    }

    /// The shared state this configurator writes to.
    #[must_use]
    pub fn context(&self) -> &TapContext {
        &self.ctx
    }

    fn restore_log_filter(&self) {
        let stored = match self.store.load() {
            Ok(Some(stored)) => stored,
            Ok(None) => return,
            Err(e) => {
                warn!(error = %e, "Could not read persisted log filter");
                return;
            }
        };

        match Pattern::from_persisted(&stored) {
            Ok(pattern) => {
                debug!(filter = %pattern, "Restored log filter");
                let _ = self.ctx.lock().policy.set_log_filter(pattern.into());
            }
            Err(e) => warn!(stored = %stored, error = %e, "Ignoring persisted log filter"),
        }
    }

    /// Apply a new set of tap settings.
    ///
    /// An absent or invalid `filter` keeps the previous log filter, and an
    /// unknown `level` keeps the previous level. Nothing changes once
    /// discovery has failed.
    pub fn configure(
        &self,
        filter: Option<PatternSpec>,
        level: &str,
        options: TapOptions,
    ) -> ConfigureOutcome {
        let TapOptions {
            absolute_time,
            filter_realtime,
            mut mangle_stanzas,
            thaw_ice,
            refreeze,
        } = options;

        if thaw_ice && mangle_stanzas.is_none() {
            mangle_stanzas = Some(thaw_ice_rules());
        }

        let discovery = self.ctx.discovery();
        match discovery {
            DiscoveryState::Failed => {
                error!("Failed to locate protocol instance, cannot tap");
                return ConfigureOutcome::Unavailable;
            }
            DiscoveryState::Pending => warn!("Protocol instance is not loaded yet"),
            DiscoveryState::Ready => {}
        }

        let persisted = {
            let mut state = self.ctx.lock();

            let persisted = match filter {
                Some(spec) => match state.policy.set_log_filter(spec) {
                    Ok(pattern) => pattern.to_persisted(),
                    Err(e) => {
                        warn!(error = %e, "Invalid log filter, keeping the previous one");
                        None
                    }
                },
                None => {
                    warn!("No log filter given, keeping the previous one");
                    None
                }
            };

            state.absolute_time = absolute_time;
            state.policy.set_send_filter(filter_realtime);
            state
                .mangler
                .reconfigure(mangle_stanzas.unwrap_or_default(), refreeze);

            match level.parse::<LogLevel>() {
                Ok(parsed) => state.level = parsed,
                Err(e) => debug!(error = %e, level = %state.level, "Keeping log level"),
            }

            persisted
        };

        if let Some(text) = persisted {
            if let Err(e) = self.store.save(&text) {
                warn!(error = %e, "Could not persist log filter");
            }
        }

        match discovery {
            DiscoveryState::Ready => ConfigureOutcome::Applied,
            _ => ConfigureOutcome::Pending,
        }
    }
}
