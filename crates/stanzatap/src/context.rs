//! Shared tap state.
//!
//! One [`TapContext`] is shared by the configurator, the interception
//! controller and every tapped transport. The lock is held only for a single
//! synchronous decision, never across an `.await` or a transport call.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::filter::FilterPolicy;
use crate::logger::StanzaLogger;
use crate::logging::LogLevel;
use crate::mangle::StanzaMangler;

/// Progress of instance discovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DiscoveryState {
    /// Still looking for an instance.
    #[default]
    Pending,
    /// An instance has been tapped.
    Ready,
    /// Gave up; will never retry.
    Failed,
}

impl fmt::Display for DiscoveryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Ready => write!(f, "ready"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Everything the pipeline decides with.
#[derive(Debug, Default)]
pub struct TapState {
    /// Log and send filters.
    pub policy: FilterPolicy,
    /// Outbound rewriting.
    pub mangler: StanzaMangler,
    /// Log line emission and timing.
    pub logger: StanzaLogger,
    /// Level stanza lines are emitted at.
    pub level: LogLevel,
    /// Use absolute timestamps instead of deltas.
    pub absolute_time: bool,
    /// Discovery progress.
    pub discovery: DiscoveryState,
}

/// Cloneable handle to the shared [`TapState`].
#[derive(Debug, Clone, Default)]
pub struct TapContext {
    state: Arc<Mutex<TapState>>,
}

impl TapContext {
    /// Create a fresh context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock the state.
    ///
    /// A panic while the lock was held does not leave the state torn, so a
    /// poisoned lock is recovered.
    pub fn lock(&self) -> MutexGuard<'_, TapState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current discovery state.
    #[must_use]
    pub fn discovery(&self) -> DiscoveryState {
        self.lock().discovery
    }

    /// Record discovery progress.
    pub fn set_discovery(&self, discovery: DiscoveryState) {
        self.lock().discovery = discovery;
    }

    /// Whether an instance has been tapped.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.discovery() == DiscoveryState::Ready
    }
}
