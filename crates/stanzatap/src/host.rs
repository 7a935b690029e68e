//! Host environment seams.
//!
//! The tap never owns the protocol client. The embedding application exposes
//! its live instances through these traits, and the tap wraps what it is given.

use std::sync::Arc;

use crate::error::Result;
use crate::stanza::Stanza;

/// Callback invoked for every inbound stanza.
pub type StanzaHandler = Arc<dyn Fn(&Stanza) + Send + Sync>;

/// Something that can put a stanza on the wire.
///
/// `Args` carries whatever extra arguments the transport's send takes; the
/// tap passes them through untouched.
pub trait StanzaTransport: Send + Sync {
    /// Extra send arguments.
    type Args;

    /// Send a stanza.
    ///
    /// # Errors
    ///
    /// Returns an error if the transport rejects the stanza.
    fn send(&self, stanza: Stanza, args: Self::Args) -> Result<()>;
}

/// A live protocol client.
pub trait ProtocolInstance: Send + Sync {
    /// The outbound transport type.
    type Transport: StanzaTransport;

    /// Stable identity of this instance, used to subscribe only once.
    fn id(&self) -> String;

    /// Whether the instance's socket has been initialised.
    fn has_socket(&self) -> bool;

    /// Subscribe to inbound stanzas.
    fn on_stanza(&self, handler: StanzaHandler);

    /// The instance's outbound transport.
    fn transport(&self) -> Self::Transport;
}

/// The host's registry of live instances.
pub trait InstanceRegistry {
    /// Instance type handed out by the registry.
    type Instance: ProtocolInstance + Clone;

    /// Live instances in creation order, or `None` when the protocol library
    /// has not been loaded yet.
    fn instances(&self) -> Option<Vec<Self::Instance>>;
}
