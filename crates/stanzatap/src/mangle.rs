//! Rule-driven rewriting of outbound stanzas.
//!
//! A [`StanzaMangler`] holds an ordered list of [`MangleRule`]s. The first rule
//! whose pattern matches a stanza rewrites it; later rules are not consulted.
//!
//! With a refreeze window configured, every successful rewrite stamps a thaw
//! time. The first `mangle` call that finds the window expired clears all
//! rules, and mangling stays off until new rules are configured.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use regex::Regex;
use tokio::time::Instant;
use tracing::debug;

use crate::logging::{log_at, LogLevel};
use crate::pattern::Pattern;
use crate::stanza::Stanza;

/// Placeholder address written over candidate IPs.
pub const PLACEHOLDER_IP: &str = "123.123.123.123";

type Transform = dyn Fn(&str) -> String + Send + Sync;

/// A (pattern, transform) pair.
#[derive(Clone)]
pub struct MangleRule {
    name: String,
    pattern: Pattern,
    transform: Arc<Transform>,
}

impl MangleRule {
    /// Create a rule.
    pub fn new(
        name: impl Into<String>,
        pattern: Pattern,
        transform: impl Fn(&str) -> String + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            pattern,
            transform: Arc::new(transform),
        }
    }

    /// Rule name for logging.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The trigger pattern.
    #[must_use]
    pub fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    /// Check if the rule applies to this text.
    #[must_use]
    pub fn matches(&self, text: &str) -> bool {
        self.pattern.matches(text)
    }

    /// Apply the transform.
    #[must_use]
    pub fn apply(&self, text: &str) -> String {
        (self.transform)(text)
    }
}

impl fmt::Debug for MangleRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MangleRule")
            .field("name", &self.name)
            .field("pattern", &self.pattern)
            .finish_non_exhaustive()
    }
}

/// A regex substitution used by the built-in rules.
struct Substitution {
    regex: Regex,
    replacement: &'static str,
}

impl Substitution {
    /// # Panics
    ///
    /// Panics if the regex pattern is invalid.
    fn new(pattern: &str, replacement: &'static str) -> Self {
        Self {
            regex: Regex::new(pattern).expect("Invalid regex pattern"),
            replacement,
        }
    }
}

fn substitution_rule(name: &str, trigger: &str, steps: Vec<Substitution>) -> MangleRule {
    let trigger = Pattern::Regex(Regex::new(trigger).expect("Invalid regex pattern"));
    MangleRule::new(name, trigger, move |text| {
        steps.iter().fold(text.to_string(), |acc, step| {
            step.regex.replace_all(&acc, step.replacement).into_owned()
        })
    })
}

/// The two built-in "thaw-ice" rules.
///
/// - `ip`: rewrites `ip` and `rel-addr` attributes to [`PLACEHOLDER_IP`].
/// - `ice-credentials`: rewrites `ufrag`, prefixes `pwd` values and zeroes
///   the last fingerprint byte, so ICE checks against the real peer fail.
#[must_use]
pub fn thaw_ice_rules() -> Vec<MangleRule> {
    vec![
        substitution_rule(
            "ip",
            r#"ip=".*?""#,
            vec![
                Substitution::new(r#"ip=".*?""#, r#"ip="123.123.123.123""#),
                Substitution::new(r#"rel-addr=".*?""#, r#"rel-addr="123.123.123.123""#),
            ],
        ),
        substitution_rule(
            "ice-credentials",
            r#"ufrag=".*?""#,
            vec![
                Substitution::new(r#"ufrag=".*?""#, r#"ufrag="123a""#),
                Substitution::new(r#"pwd=""#, r#"pwd="asd"#),
                Substitution::new(r":..</finger", ":00</finger"),
            ],
        ),
    ]
}

/// Applies mangle rules to outbound stanzas.
#[derive(Debug, Clone, Default)]
pub struct StanzaMangler {
    rules: Vec<MangleRule>,
    refreeze: Option<Duration>,
    thaw_time: Option<Instant>,
}

impl StanzaMangler {
    /// Create a mangler with no rules.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace rules and refreeze window, clearing any thaw time.
    pub fn reconfigure(&mut self, rules: Vec<MangleRule>, refreeze: Option<Duration>) {
        self.rules = rules;
        self.refreeze = refreeze.filter(|window| !window.is_zero());
        self.thaw_time = None;
    }

    /// The active rules.
    #[must_use]
    pub fn rules(&self) -> &[MangleRule] {
        &self.rules
    }

    /// The refreeze window, if any.
    #[must_use]
    pub fn refreeze(&self) -> Option<Duration> {
        self.refreeze
    }

    /// When the current thaw window started.
    #[must_use]
    pub fn thaw_time(&self) -> Option<Instant> {
        self.thaw_time
    }

    /// Rewrite the stanza with the first matching rule.
    pub fn mangle(&mut self, stanza: Stanza, level: LogLevel) -> Stanza {
        if self.rules.is_empty() {
            return stanza;
        }

        if let (Some(window), Some(thawed)) = (self.refreeze, self.thaw_time) {
            if thawed.elapsed() > window {
                log_at!(level, "refreezing!");
                self.rules.clear();
                return stanza;
            }
        }

        let Some(rule) = self.rules.iter().find(|rule| rule.matches(stanza.text())) else {
            return stanza;
        };

        if self.refreeze.is_some() {
            debug!("Setting thaw time");
            self.thaw_time = Some(Instant::now());
        }

        let mangled = rule.apply(stanza.text());
        log_at!(
            level,
            rule = rule.name(),
            original = %stanza.text(),
            mangled = %mangled,
            "mangled"
        );
        stanza.with_text(mangled)
    }
}
