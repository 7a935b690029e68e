//! Wiring the pipeline into a live instance.
//!
//! Inbound stanzas are observed through the instance's subscription hook and
//! only ever logged. Outbound stanzas go through a [`TappedTransport`], which
//! decorates the instance's own transport with the filter, mangle and log
//! steps before forwarding.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::debug;

use crate::context::{DiscoveryState, TapContext, TapState};
use crate::error::Result;
use crate::host::{ProtocolInstance, StanzaTransport};
use crate::logging::log_at;
use crate::stanza::{Direction, Stanza};

/// Taps instances into a shared [`TapContext`].
#[derive(Debug)]
pub struct InterceptionController {
    ctx: TapContext,
    attached: Mutex<HashSet<String>>,
}

impl InterceptionController {
    /// Create a controller over `ctx`.
    #[must_use]
    pub fn new(ctx: TapContext) -> Self {
        Self {
            ctx,
            attached: Mutex::new(HashSet::new()),
        }
    }

    /// Tap `instance` and return its decorated transport.
    ///
    /// The inbound subscription is made only on the first attach of a given
    /// instance id; later calls just hand out another wrapper.
    pub fn attach<I: ProtocolInstance>(&self, instance: &I) -> TappedTransport<I::Transport> {
        let id = instance.id();
        let first = self
            .attached
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.clone());

        if first {
            let ctx = self.ctx.clone();
            instance.on_stanza(Arc::new(move |stanza: &Stanza| {
                log_inbound(&ctx, stanza);
            }));
            debug!(id = %id, "Tapped protocol instance");
        }

        self.ctx.set_discovery(DiscoveryState::Ready);
        TappedTransport::new(instance.transport(), self.ctx.clone())
    }

    /// Whether an instance with this id has been tapped.
    #[must_use]
    pub fn is_attached(&self, id: &str) -> bool {
        self.attached
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(id)
    }
}

fn log_inbound(ctx: &TapContext, stanza: &Stanza) {
    let mut state = ctx.lock();
    let TapState {
        policy,
        logger,
        level,
        absolute_time,
        ..
    } = &mut *state;
    logger.log_stanza(Direction::Inbound, stanza, policy, *level, *absolute_time);
}

/// A transport decorated with the filter, mangle and log pipeline.
#[derive(Debug, Clone)]
pub struct TappedTransport<T> {
    inner: T,
    ctx: TapContext,
}

impl<T> TappedTransport<T> {
    /// Wrap `inner`.
    #[must_use]
    pub fn new(inner: T, ctx: TapContext) -> Self {
        Self { inner, ctx }
    }

    /// The undecorated transport.
    #[must_use]
    pub fn inner(&self) -> &T {
        &self.inner
    }

    /// Run the outbound pipeline. `None` means the stanza was dropped.
    fn process(&self, stanza: Stanza) -> Option<Stanza> {
        let mut state = self.ctx.lock();
        let TapState {
            policy,
            mangler,
            logger,
            level,
            absolute_time,
            ..
        } = &mut *state;

        if !policy.should_send(&stanza) {
            log_at!(*level, stanza = %stanza, "dropped");
            return None;
        }

        let stanza = mangler.mangle(stanza, *level);
        logger.log_stanza(Direction::Outbound, &stanza, policy, *level, *absolute_time);
        Some(stanza)
    }
}

impl<T: StanzaTransport> StanzaTransport for TappedTransport<T> {
    type Args = T::Args;

    fn send(&self, stanza: Stanza, args: T::Args) -> Result<()> {
        match self.process(stanza) {
            Some(stanza) => self.inner.send(stanza, args),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loopback::LoopbackInstance;
    use crate::mangle::thaw_ice_rules;

    fn controller() -> (TapContext, InterceptionController) {
        let ctx = TapContext::new();
        let controller = InterceptionController::new(ctx.clone());
        (ctx, controller)
    }

    #[test]
    fn test_attach_marks_ready() {
        let (ctx, controller) = controller();
        let instance = LoopbackInstance::connected("rt-1");

        assert!(!ctx.is_ready());
        let _transport = controller.attach(&instance);
        assert!(ctx.is_ready());
        assert!(controller.is_attached("rt-1"));
    }

    #[test]
    fn test_attach_subscribes_once_per_instance() {
        let (_ctx, controller) = controller();
        let instance = LoopbackInstance::connected("rt-1");

        let _ = controller.attach(&instance);
        let _ = controller.attach(&instance);
        assert_eq!(instance.subscriber_count(), 1);

        let other = LoopbackInstance::connected("rt-2");
        let _ = controller.attach(&other);
        assert_eq!(other.subscriber_count(), 1);
    }

    #[test]
    fn test_send_forwards_with_args() {
        let (_ctx, controller) = controller();
        let instance = LoopbackInstance::connected("rt-1");
        let transport = controller.attach(&instance);

        transport
            .send(Stanza::raw("<iq/>"), vec!["extra".to_string()])
            .unwrap();

        let sent = instance.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].stanza.text(), "<iq/>");
        assert_eq!(sent[0].args, vec!["extra".to_string()]);
    }

    #[test]
    fn test_inner_transport_error_propagates() {
        let (_ctx, controller) = controller();
        let instance = LoopbackInstance::new("rt-1");
        let transport = controller.attach(&instance);

        let err = transport
            .send(Stanza::raw("<iq/>"), Vec::new())
            .unwrap_err();

        assert!(matches!(err, crate::error::Error::Transport(_)));
        assert!(instance.sent().is_empty());
    }

    #[test]
    fn test_send_filter_drops_stanza() {
        let (ctx, controller) = controller();
        let instance = LoopbackInstance::connected("rt-1");
        let transport = controller.attach(&instance);
        {
            let mut state = ctx.lock();
            state.policy.set_log_filter("".into()).unwrap();
            state.policy.set_send_filter(Some("presence".into()));
        }

        transport.send(Stanza::raw("<presence/>"), Vec::new()).unwrap();

        assert!(instance.sent().is_empty());
        assert!(ctx.lock().logger.last_stanza_time().is_none());
    }

    #[test]
    fn test_send_forwards_mangled_stanza() {
        let (ctx, controller) = controller();
        let instance = LoopbackInstance::connected("rt-1");
        let transport = controller.attach(&instance);
        ctx.lock().mangler.reconfigure(thaw_ice_rules(), None);

        transport
            .send(
                Stanza::element("iq", r#"<iq><candidate ip="10.0.0.5"/></iq>"#),
                Vec::new(),
            )
            .unwrap();

        let sent = instance.sent();
        assert_eq!(
            sent[0].stanza.text(),
            r#"<iq><candidate ip="123.123.123.123"/></iq>"#
        );
    }

    #[test]
    fn test_inbound_is_logged_not_mangled() {
        let (ctx, controller) = controller();
        let instance = LoopbackInstance::connected("rt-1");
        let _transport = controller.attach(&instance);
        {
            let mut state = ctx.lock();
            state.policy.set_log_filter("<message".into()).unwrap();
            state.policy.set_send_filter(Some("message".into()));
        }

        instance.deliver(&Stanza::raw("<message><body>hi</body></message>"));

        assert!(ctx.lock().logger.last_stanza_time().is_some());
    }

    #[test]
    fn test_inbound_respects_log_filter() {
        let (ctx, controller) = controller();
        let instance = LoopbackInstance::connected("rt-1");
        let _transport = controller.attach(&instance);
        ctx.lock().policy.set_log_filter("<iq".into()).unwrap();

        instance.deliver(&Stanza::raw("<presence/>"));
        assert!(ctx.lock().logger.last_stanza_time().is_none());
    }
}
