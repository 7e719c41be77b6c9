//! Unit and currency registration driven by sheet text.
//!
//! `EUR/USD = 1.1` defines `USD` as `1.1 EUR`; `price = 5 apples` turns
//! `apples` into a unit on first use. Multi-word names collapse into one
//! identifier (`USDincGST`) and their written form is kept in an expansion
//! table so printed results read the way the user wrote them.
//!
//! The expansion table is shared by clones of a registrar and lives as long
//! as the engine it registers into, not just one `calculate` call.

use dashmap::DashMap;
use regex::Regex;
use std::sync::{Arc, OnceLock};

use livesheet_engine::engine::{ExpressionEngine, Node, Scope, is_builtin_unit};

use super::normalize::{RESERVED_WORDS, merge_words};
use crate::error::LineError;

/// `BASE/QUOTE` where each side is one or more plain words.
fn ratio_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\s*(\p{Alphabetic}+(?:\s+\p{Alphabetic}+)*)\s*/\s*(\p{Alphabetic}+(?:\s+\p{Alphabetic}+)*)\s*$")
            .expect("ratio regex must compile")
    })
}

/// A leading number, radix literal or array literal, then the rest.
fn leading_literal_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^\s*-?\s*(?:0[bB][01]+|0[oO][0-7]+|0[xX][0-9a-fA-F]+|\d+(?:\.\d*)?(?:[eE][+-]?\d+)?|\.\d+(?:[eE][+-]?\d+)?|\[[^\]]*\])\s*(.*)$",
        )
        .expect("leading literal regex must compile")
    })
}

/// A parsed `BASE/QUOTE` pair, names already collapsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RatioPair {
    pub base: String,
    pub quote: String,
    base_display: String,
    quote_display: String,
}

impl RatioPair {
    /// Parse `text` as `BASE/QUOTE`. Reserved words are not names.
    pub fn parse(text: &str) -> Option<RatioPair> {
        let caps = ratio_re().captures(text)?;
        let base_words: Vec<&str> = caps[1].split_whitespace().collect();
        let quote_words: Vec<&str> = caps[2].split_whitespace().collect();
        if base_words
            .iter()
            .chain(quote_words.iter())
            .any(|w| RESERVED_WORDS.contains(w))
        {
            return None;
        }
        Some(RatioPair {
            base: base_words.concat(),
            quote: quote_words.concat(),
            base_display: base_words.join(" "),
            quote_display: quote_words.join(" "),
        })
    }
}

#[derive(Clone, Default)]
pub struct UnitRegistrar {
    expansions: Arc<DashMap<String, String>>,
}

impl UnitRegistrar {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, name: &str, display: &str) {
        if name != display {
            self.expansions.insert(name.to_string(), display.to_string());
        }
    }

    /// The written form recorded for `name`, if it differs.
    pub fn display_name(&self, name: &str) -> Option<String> {
        self.expansions.get(name).map(|e| e.value().clone())
    }

    /// Register `pair.quote` as `rate × pair.base`, creating the base unit
    /// if needed. Without a rate both names just become units. A rate that
    /// already carries a unit (`1.1 EUR`) is used as the definition as is.
    pub fn register_ratio<E: ExpressionEngine + ?Sized>(
        &self,
        engine: &E,
        pair: &RatioPair,
        rate: Option<&str>,
    ) -> Result<(), LineError> {
        if is_builtin_unit(&pair.quote) {
            tracing::warn!(unit = %pair.quote, "refusing to redefine built-in unit");
            return Err(LineError::Engine(format!(
                "Cannot redefine built-in unit {}",
                pair.quote
            )));
        }
        if !engine.is_known_unit(&pair.base) {
            engine.define_unit(&pair.base, None)?;
        }
        self.record(&pair.base, &pair.base_display);
        self.record(&pair.quote, &pair.quote_display);

        match rate.map(str::trim).filter(|r| !r.is_empty()) {
            None => {
                if !engine.is_known_unit(&pair.quote) {
                    engine.define_unit(&pair.quote, None)?;
                }
            }
            Some(rate) => {
                let definition = match engine.parse(rate) {
                    Ok(Node::Number(_)) => format!("{} {}", rate, pair.base),
                    _ => rate.to_string(),
                };
                tracing::debug!(quote = %pair.quote, %definition, "registering ratio");
                engine.define_unit(&pair.quote, Some(&definition))?;
            }
        }
        Ok(())
    }

    /// Declare the unit in an assignment value such as `5 apples` or
    /// `3 USD inc GST`. Only acts when a literal was stripped from the front
    /// and the remaining words are plain words, none of them a variable,
    /// reserved word or built-in, and not all already units. Returns the
    /// new unit's name.
    pub fn register_assignment_unit<E: ExpressionEngine + ?Sized>(
        &self,
        engine: &E,
        value_text: &str,
        scope: &Scope,
    ) -> Option<String> {
        let caps = leading_literal_re().captures(value_text)?;
        let rest = caps.get(1).map_or("", |m| m.as_str()).trim();
        let words: Vec<&str> = rest.split_whitespace().collect();
        if words.is_empty() || !words.iter().all(|w| w.chars().all(char::is_alphabetic)) {
            return None;
        }
        if words.iter().any(|w| {
            scope.contains(w) || RESERVED_WORDS.contains(w) || engine.is_builtin(w)
        }) {
            return None;
        }
        if words.iter().all(|w| engine.is_known_unit(w)) {
            return None;
        }

        let name = merge_words(&words, engine);
        if engine.is_known_unit(&name) || scope.contains(&name) {
            return None;
        }
        match engine.define_unit(&name, None) {
            Ok(()) => {
                self.record(&name, &words.join(" "));
                tracing::debug!(unit = %name, "declared unit from assignment");
                Some(name)
            }
            Err(err) => {
                tracing::warn!(unit = %name, error = %err, "unit declaration rejected");
                None
            }
        }
    }

    /// Replace collapsed names in a printed result with their written form.
    pub fn expand(&self, text: &str) -> String {
        if self.expansions.is_empty() {
            return text.to_string();
        }
        text.split(' ')
            .map(|token| {
                let (name, power) = match token.find('^') {
                    Some(idx) => token.split_at(idx),
                    None => (token, ""),
                };
                match self.expansions.get(name) {
                    Some(display) => format!("{}{}", display.value(), power),
                    None => token.to_string(),
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}
