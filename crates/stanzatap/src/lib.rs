//! `stanzatap` - Runtime traffic inspector for live XML stanza channels
//!
//! This library taps a protocol instance's signalling channel: it logs
//! inbound and outbound stanzas with timing annotations, drops outbound
//! stanzas that match a send filter, and rewrites outbound stanzas with
//! configurable mangle rules, including built-in rules that break ICE
//! connectivity on purpose.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use stanzatap::locator::LocatorConfig;
//! use stanzatap::loopback::{LoopbackInstance, LoopbackRegistry};
//! use stanzatap::storage::MemoryFilterStore;
//! use stanzatap::{Tap, TapOptions};
//!
//! # async fn demo() -> stanzatap::Result<()> {
//! let tap = Tap::new(Arc::new(MemoryFilterStore::new()), LocatorConfig::default());
//! let registry = LoopbackRegistry::with_instance(LoopbackInstance::connected("rt-1"));
//! let transport = tap.run(&registry).await?;
//! tap.configure(Some("<iq".into()), "debug", TapOptions { thaw_ice: true, ..TapOptions::default() });
//! # drop(transport);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod cli;
pub mod config;
pub mod configure;
pub mod context;
pub mod error;
pub mod filter;
pub mod host;
pub mod intercept;
pub mod locator;
pub mod logger;
pub mod logging;
pub mod loopback;
pub mod mangle;
pub mod pattern;
pub mod replay;
pub mod stanza;
pub mod storage;
pub mod tap;
pub mod time_format;

pub use config::Config;
pub use configure::{ConfigureOutcome, Configurator, TapOptions};
pub use context::{DiscoveryState, TapContext};
pub use error::{Error, Result};
pub use filter::FilterPolicy;
pub use host::{InstanceRegistry, ProtocolInstance, StanzaHandler, StanzaTransport};
pub use intercept::{InterceptionController, TappedTransport};
pub use locator::{InstanceLocator, LocatorConfig};
pub use logging::{init_logging, LogLevel};
pub use mangle::{thaw_ice_rules, MangleRule, StanzaMangler};
pub use pattern::{Pattern, PatternSpec};
pub use stanza::{Direction, Stanza};
pub use storage::{FilterStore, MemoryFilterStore, Storage};
pub use tap::Tap;
pub use time_format::format_delta;
