//! Core stanza types.
//!
//! A [`Stanza`] is treated as an opaque unit of content. The tap only ever
//! looks at its text and, as a type hint, at the element name a structured
//! source may supply.

use std::fmt;

use nu_ansi_term::Color;
use serde::{Deserialize, Serialize};

/// Element names that mark a recognised protocol unit.
pub const STANZA_NAMES: [&str; 3] = ["presence", "iq", "message"];

/// Opening tags sniffed from raw text.
const STANZA_TAGS: [&str; 3] = ["<iq", "<message", "<presence"];

/// One message on the channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stanza {
    /// Element name, when the stanza came from a structured object.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Serialized form of the stanza.
    pub text: String,
}

impl Stanza {
    /// A stanza known only by its text.
    #[must_use]
    pub fn raw(text: impl Into<String>) -> Self {
        Self {
            name: None,
            text: text.into(),
        }
    }

    /// A stanza from a structured element.
    #[must_use]
    pub fn element(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            text: text.into(),
        }
    }

    /// The stanza's text.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Same stanza with its text replaced.
    #[must_use]
    pub fn with_text(self, text: impl Into<String>) -> Self {
        Self {
            name: self.name,
            text: text.into(),
        }
    }

    /// Whether this looks like a presence, iq or message stanza.
    ///
    /// Either a known element name or a matching opening tag in the text is
    /// enough.
    #[must_use]
    pub fn is_recognized(&self) -> bool {
        let by_name = self
            .name
            .as_deref()
            .is_some_and(|name| STANZA_NAMES.contains(&name));
        by_name || STANZA_TAGS.iter().any(|tag| self.text.contains(tag))
    }
}

impl fmt::Display for Stanza {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl From<&str> for Stanza {
    fn from(text: &str) -> Self {
        Self::raw(text)
    }
}

impl From<String> for Stanza {
    fn from(text: String) -> Self {
        Self::raw(text)
    }
}

/// Which way a stanza travelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Sent by the local client.
    Outbound,
    /// Received from the server.
    Inbound,
}

impl Direction {
    /// Arrow marker used in log lines.
    #[must_use]
    pub const fn marker(self) -> &'static str {
        match self {
            Self::Outbound => "⬆",
            Self::Inbound => "⬇",
        }
    }

    /// Terminal color of the marker: red going out, green coming in.
    #[must_use]
    pub const fn color(self) -> Color {
        match self {
            Self::Outbound => Color::Red,
            Self::Inbound => Color::Green,
        }
    }

    /// Parse the name [`Display`](fmt::Display) writes.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "outbound" => Some(Self::Outbound),
            "inbound" => Some(Self::Inbound),
            _ => None,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Outbound => write!(f, "outbound"),
            Self::Inbound => write!(f, "inbound"),
        }
    }
}
