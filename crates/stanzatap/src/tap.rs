//! One-stop handle for embedding the inspector.
//!
//! A [`Tap`] owns the shared context together with the configurator, the
//! locator and the interception controller that operate on it.

use std::sync::Arc;

use tracing::info;

use crate::configure::{ConfigureOutcome, Configurator, TapOptions};
use crate::context::TapContext;
use crate::error::Result;
use crate::host::{InstanceRegistry, ProtocolInstance};
use crate::intercept::{InterceptionController, TappedTransport};
use crate::locator::{InstanceLocator, LocatorConfig, LocatorHandle};
use crate::pattern::PatternSpec;
use crate::storage::FilterStore;

/// Configured inspector for a single protocol instance.
#[derive(Debug)]
pub struct Tap {
    ctx: TapContext,
    configurator: Configurator,
    locator: InstanceLocator,
    controller: InterceptionController,
}

impl Tap {
    /// Create a tap, restoring the log filter from `store`.
    pub fn new(store: Arc<dyn FilterStore>, locator: LocatorConfig) -> Self {
        let ctx = TapContext::new();
        Self {
            configurator: Configurator::new(ctx.clone(), store),
            locator: InstanceLocator::new(locator, ctx.clone()),
            controller: InterceptionController::new(ctx.clone()),
            ctx,
        }
    }

    /// The shared state.
    #[must_use]
    pub fn context(&self) -> &TapContext {
        &self.ctx
    }

    /// A handle that cancels discovery.
    #[must_use]
    pub fn locator_handle(&self) -> LocatorHandle {
        self.locator.handle()
    }

    /// Apply settings. See [`Configurator::configure`].
    pub fn configure(
        &self,
        filter: Option<PatternSpec>,
        level: &str,
        options: TapOptions,
    ) -> ConfigureOutcome {
        self.configurator.configure(filter, level, options)
    }

    /// Tap an instance that is already known.
    pub fn attach<I: ProtocolInstance>(&self, instance: &I) -> TappedTransport<I::Transport> {
        self.controller.attach(instance)
    }

    /// Locate the live instance in `registry` and tap it.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::DiscoveryFailed`] if no instance appears.
    pub async fn run<R: InstanceRegistry>(
        &self,
        registry: &R,
    ) -> Result<TappedTransport<<R::Instance as ProtocolInstance>::Transport>> {
        let instance = self.locator.locate(registry).await?;
        let transport = self.controller.attach(&instance);
        info!(id = %instance.id(), "Tap attached");
        Ok(transport)
    }
}
