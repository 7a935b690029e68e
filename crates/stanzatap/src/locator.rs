//! Discovery of the live protocol instance.
//!
//! The locator polls an [`InstanceRegistry`] until the first registered
//! instance has an initialised socket. Polling is bounded: once the attempt
//! budget is spent the locator fails for good and every later call fails
//! immediately.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, trace};

use crate::context::{DiscoveryState, TapContext};
use crate::error::{Error, Result};
use crate::host::{InstanceRegistry, ProtocolInstance};

/// Polling parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocatorConfig {
    /// Delay between polls.
    pub poll_interval: Duration,
    /// Polls before giving up.
    pub max_attempts: u32,
}

impl Default for LocatorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(500),
            max_attempts: 101,
        }
    }
}

/// Cloneable handle that can cancel an in-flight discovery.
#[derive(Debug, Clone, Default)]
pub struct LocatorHandle {
    cancelled: Arc<AtomicBool>,
}

impl LocatorHandle {
    /// Stop polling. The locator fails at its next poll.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Bounded, retrying instance discovery.
#[derive(Debug)]
pub struct InstanceLocator {
    config: LocatorConfig,
    ctx: TapContext,
    handle: LocatorHandle,
    failed: AtomicBool,
    attempts: AtomicU32,
}

impl InstanceLocator {
    /// Create a locator that records its progress in `ctx`.
    #[must_use]
    pub fn new(config: LocatorConfig, ctx: TapContext) -> Self {
        Self {
            config,
            ctx,
            handle: LocatorHandle::default(),
            failed: AtomicBool::new(false),
            attempts: AtomicU32::new(0),
        }
    }

    /// A handle for cancelling discovery.
    #[must_use]
    pub fn handle(&self) -> LocatorHandle {
        self.handle.clone()
    }

    /// Whether discovery has permanently failed.
    #[must_use]
    pub fn is_failed(&self) -> bool {
        self.failed.load(Ordering::SeqCst)
    }

    /// Polls performed so far.
    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Poll `registry` until an instance with a socket appears.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DiscoveryFailed`] once the attempt budget is spent,
    /// discovery was cancelled, or an earlier call already failed.
    pub async fn locate<R: InstanceRegistry>(&self, registry: &R) -> Result<R::Instance> {
        if self.is_failed() {
            return Err(Error::DiscoveryFailed {
                attempts: self.attempts(),
            });
        }

        debug!(
            interval_ms = self.config.poll_interval.as_millis(),
            max_attempts = self.config.max_attempts,
            "Locating protocol instance"
        );

        loop {
            if self.attempts() >= self.config.max_attempts || self.handle.is_cancelled() {
                return Err(self.fail());
            }

            let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
            if let Some(instance) = Self::find_ready(registry) {
                debug!(attempt, id = %instance.id(), "Got protocol instance");
                return Ok(instance);
            }
            trace!(attempt, "No protocol instance yet");

            tokio::time::sleep(self.config.poll_interval).await;
        }
    }

    fn find_ready<R: InstanceRegistry>(registry: &R) -> Option<R::Instance> {
        registry
            .instances()?
            .into_iter()
            .next()
            .filter(|instance| instance.has_socket())
    }

    fn fail(&self) -> Error {
        self.failed.store(true, Ordering::SeqCst);
        self.ctx.set_discovery(DiscoveryState::Failed);
        let attempts = self.attempts();
        debug!(attempts, "Failed to locate protocol instance");
        Error::DiscoveryFailed { attempts }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    use super::*;
    use crate::host::{StanzaHandler, StanzaTransport};
    use crate::stanza::Stanza;

    #[derive(Debug, Clone)]
    struct FakeTransport;

    impl StanzaTransport for FakeTransport {
        type Args = ();

        fn send(&self, _stanza: Stanza, _args: ()) -> Result<()> {
            Ok(())
        }
    }

    #[derive(Debug, Clone)]
    struct FakeInstance {
        id: &'static str,
        socket: bool,
    }

    impl ProtocolInstance for FakeInstance {
        type Transport = FakeTransport;

        fn id(&self) -> String {
            self.id.to_string()
        }

        fn has_socket(&self) -> bool {
            self.socket
        }

        fn on_stanza(&self, _handler: StanzaHandler) {}

        fn transport(&self) -> FakeTransport {
            FakeTransport
        }
    }

    /// Registry whose contents are scripted per poll.
    #[derive(Debug, Default)]
    struct ScriptedRegistry {
        polls: AtomicUsize,
        appears_at: Option<usize>,
        instances: Mutex<Vec<FakeInstance>>,
    }

    impl InstanceRegistry for ScriptedRegistry {
        type Instance = FakeInstance;

        fn instances(&self) -> Option<Vec<FakeInstance>> {
            let poll = self.polls.fetch_add(1, Ordering::SeqCst) + 1;
            match self.appears_at {
                Some(at) if poll >= at => Some(self.instances.lock().unwrap().clone()),
                _ => None,
            }
        }
    }

    fn registry(appears_at: Option<usize>, instances: Vec<FakeInstance>) -> ScriptedRegistry {
        ScriptedRegistry {
            polls: AtomicUsize::new(0),
            appears_at,
            instances: Mutex::new(instances),
        }
    }

    #[test]
    fn test_default_config() {
        let config = LocatorConfig::default();
        assert_eq!(config.poll_interval, Duration::from_millis(500));
        assert_eq!(config.max_attempts, 101);
    }

    #[tokio::test(start_paused = true)]
    async fn test_finds_instance_immediately() {
        let registry = registry(Some(1), vec![FakeInstance { id: "a", socket: true }]);
        let locator = InstanceLocator::new(LocatorConfig::default(), TapContext::new());

        let instance = locator.locate(&registry).await.unwrap();
        assert_eq!(instance.id, "a");
        assert_eq!(locator.attempts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_finds_instance_after_retries() {
        let registry = registry(Some(4), vec![FakeInstance { id: "a", socket: true }]);
        let locator = InstanceLocator::new(LocatorConfig::default(), TapContext::new());

        let start = tokio::time::Instant::now();
        let instance = locator.locate(&registry).await.unwrap();
        assert_eq!(instance.id, "a");
        assert_eq!(locator.attempts(), 4);
        assert!(start.elapsed() >= Duration::from_millis(1500));
        assert!(start.elapsed() < Duration::from_millis(2000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_only_first_instance_is_considered() {
        let registry = registry(
            Some(1),
            vec![
                FakeInstance { id: "a", socket: false },
                FakeInstance { id: "b", socket: true },
            ],
        );
        let config = LocatorConfig {
            poll_interval: Duration::from_millis(500),
            max_attempts: 3,
        };
        let locator = InstanceLocator::new(config, TapContext::new());

        let err = locator.locate(&registry).await.unwrap_err();
        assert!(err.is_discovery_failed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_registry_keeps_polling() {
        let registry = registry(Some(1), Vec::new());
        let config = LocatorConfig {
            poll_interval: Duration::from_millis(10),
            max_attempts: 5,
        };
        let locator = InstanceLocator::new(config, TapContext::new());

        assert!(locator.locate(&registry).await.is_err());
        assert_eq!(registry.polls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_101_polls() {
        let registry = registry(None, Vec::new());
        let ctx = TapContext::new();
        let locator = InstanceLocator::new(LocatorConfig::default(), ctx.clone());

        let start = tokio::time::Instant::now();
        let err = locator.locate(&registry).await.unwrap_err();

        assert!(matches!(err, Error::DiscoveryFailed { attempts: 101 }));
        assert_eq!(registry.polls.load(Ordering::SeqCst), 101);
        assert!(start.elapsed() >= Duration::from_secs(50));
        assert!(locator.is_failed());
        assert_eq!(ctx.discovery(), DiscoveryState::Failed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_locator_never_polls_again() {
        let registry = registry(None, Vec::new());
        let config = LocatorConfig {
            poll_interval: Duration::from_millis(10),
            max_attempts: 2,
        };
        let locator = InstanceLocator::new(config, TapContext::new());

        assert!(locator.locate(&registry).await.is_err());
        let polls = registry.polls.load(Ordering::SeqCst);

        assert!(locator.locate(&registry).await.is_err());
        assert_eq!(registry.polls.load(Ordering::SeqCst), polls);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_fails_permanently() {
        let registry = registry(None, Vec::new());
        let locator = InstanceLocator::new(LocatorConfig::default(), TapContext::new());
        locator.handle().cancel();

        assert!(locator.locate(&registry).await.is_err());
        assert_eq!(registry.polls.load(Ordering::SeqCst), 0);
        assert!(locator.is_failed());
    }
}
