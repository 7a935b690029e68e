//! In-process protocol instance.
//!
//! [`LoopbackInstance`] implements the host traits without a network: inbound
//! stanzas are injected with [`LoopbackInstance::deliver`] and outbound sends
//! are recorded until drained with [`LoopbackInstance::take_sent`]. The `replay` command drives captured traffic through it.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::error::{Error, Result};
use crate::host::{InstanceRegistry, ProtocolInstance, StanzaHandler, StanzaTransport};
use crate::stanza::Stanza;

/// A stanza that reached the loopback transport, with its extra arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentStanza {
    /// The stanza as forwarded.
    pub stanza: Stanza,
    /// Extra send arguments.
    pub args: Vec<String>,
}

struct Shared {
    id: String,
    socket: AtomicBool,
    handlers: Mutex<Vec<StanzaHandler>>,
    sent: Mutex<Vec<SentStanza>>,
}

impl fmt::Debug for Shared {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Shared")
            .field("id", &self.id)
            .field("socket", &self.socket.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

/// A protocol instance backed by memory.
#[derive(Debug, Clone)]
pub struct LoopbackInstance {
    shared: Arc<Shared>,
}

impl LoopbackInstance {
    /// Create an instance whose socket is not yet initialised.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            shared: Arc::new(Shared {
                id: id.into(),
                socket: AtomicBool::new(false),
                handlers: Mutex::new(Vec::new()),
                sent: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Create an instance with its socket already initialised.
    #[must_use]
    pub fn connected(id: impl Into<String>) -> Self {
        let instance = Self::new(id);
        instance.connect();
        instance
    }

    /// Mark the socket as initialised.
    pub fn connect(&self) {
        self.shared.socket.store(true, Ordering::SeqCst);
    }

    /// Feed an inbound stanza to every subscriber.
    pub fn deliver(&self, stanza: &Stanza) {
        let handlers = self
            .shared
            .handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for handler in handlers {
            handler(stanza);
        }
    }

    /// Number of inbound subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.shared
            .handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Everything the transport has been asked to send.
    #[must_use]
    pub fn sent(&self) -> Vec<SentStanza> {
        self.shared
            .sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Drain the send log, leaving it empty.
    pub fn take_sent(&self) -> Vec<SentStanza> {
        std::mem::take(
            &mut *self
                .shared
                .sent
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        )
    }
}

impl ProtocolInstance for LoopbackInstance {
    type Transport = LoopbackTransport;

    fn id(&self) -> String {
        self.shared.id.clone()
    }

    fn has_socket(&self) -> bool {
        self.shared.socket.load(Ordering::SeqCst)
    }

    fn on_stanza(&self, handler: StanzaHandler) {
        self.shared
            .handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(handler);
    }

    fn transport(&self) -> LoopbackTransport {
        LoopbackTransport {
            shared: Arc::clone(&self.shared),
        }
    }
}

/// Outbound side of a [`LoopbackInstance`].
#[derive(Debug, Clone)]
pub struct LoopbackTransport {
    shared: Arc<Shared>,
}

impl StanzaTransport for LoopbackTransport {
    type Args = Vec<String>;

    fn send(&self, stanza: Stanza, args: Vec<String>) -> Result<()> {
        if !self.shared.socket.load(Ordering::SeqCst) {
            return Err(Error::transport(format!(
                "socket of {} is not initialised",
                self.shared.id
            )));
        }
        self.shared
            .sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(SentStanza { stanza, args });
        Ok(())
    }
}

/// A registry that starts empty and is loaded later.
#[derive(Debug, Default)]
pub struct LoopbackRegistry {
    instances: Mutex<Option<Vec<LoopbackInstance>>>,
}

impl LoopbackRegistry {
    /// A registry for a library that has not loaded yet.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry already holding `instance`.
    #[must_use]
    pub fn with_instance(instance: LoopbackInstance) -> Self {
        let registry = Self::new();
        registry.register(instance);
        registry
    }

    /// Register an instance, loading the registry if needed.
    pub fn register(&self, instance: LoopbackInstance) {
        self.instances
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get_or_insert_with(Vec::new)
            .push(instance);
    }
}

impl InstanceRegistry for LoopbackRegistry {
    type Instance = LoopbackInstance;

    fn instances(&self) -> Option<Vec<LoopbackInstance>> {
        self.instances
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
