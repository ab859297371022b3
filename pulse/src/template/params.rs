//! Parameter substitution (second compiler pass)

use crate::schema::{CURSOR, IS_SQL, RAW_PREFIX};
use regex::{Captures, Regex};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::OnceLock;
use tracing::debug;

fn placeholder_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\{\{\s*([A-Za-z0-9_.\-]+)\s*\}\}").expect("placeholder pattern is valid")
    })
}

/// Quote style for rendered literals
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuoteStyle {
    /// Document-query (JSON) targets
    Double,
    /// SQL-style targets
    Single,
}

impl QuoteStyle {
    /// Pick the quote style from the `isSql` parameter, defaulting to JSON.
    pub fn from_params(params: &HashMap<String, Value>) -> Self {
        match params.get(IS_SQL) {
            Some(Value::Bool(true)) => Self::Single,
            Some(Value::String(s)) if s.eq_ignore_ascii_case("true") => Self::Single,
            _ => Self::Double,
        }
    }

    pub fn quote_char(self) -> char {
        match self {
            Self::Double => '"',
            Self::Single => '\'',
        }
    }

    fn quote(self, text: &str) -> String {
        match self {
            // JSON string literal, control characters included
            Self::Double => Value::String(text.to_string()).to_string(),
            Self::Single => format!("'{}'", text.replace('\'', "''")),
        }
    }
}

/// True for parameters injected without quoting.
pub fn is_raw_param(name: &str) -> bool {
    name.starts_with(RAW_PREFIX) || name == CURSOR
}

/// Plain string form of a parameter value; null renders empty.
fn value_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Render one parameter the way it will appear on the wire.
///
/// Raw parameters and the pagination cursor are verbatim. Everything else,
/// numbers included, is wrapped in the active quote character.
pub fn render_value(name: &str, value: &Value, style: QuoteStyle) -> String {
    let text = value_text(value);
    if is_raw_param(name) {
        text
    } else {
        style.quote(&text)
    }
}

/// Collapse triple-quote raw text markers into single quote characters.
fn collapse_raw_text_markers(text: &str) -> String {
    text.replace("\"\"\"", "\"").replace("'''", "'")
}

/// Replace every `{{name}}` whose name is in `params` in one pass.
///
/// Triple-quote markers written by the template author are collapsed first,
/// so rendered values are never rewritten. Placeholders without a parameter
/// are left in place.
pub fn substitute(template: &str, params: &HashMap<String, Value>) -> String {
    let style = QuoteStyle::from_params(params);
    let rendered: HashMap<&str, String> = params
        .iter()
        .map(|(name, value)| (name.as_str(), render_value(name, value, style)))
        .collect();

    let template = collapse_raw_text_markers(template);
    let mut unresolved = Vec::new();
    let substituted = placeholder_regex().replace_all(&template, |caps: &Captures<'_>| {
        let name = &caps[1];
        match rendered.get(name) {
            Some(value) => value.clone(),
            None => {
                unresolved.push(name.to_string());
                caps[0].to_string()
            }
        }
    });

    if !unresolved.is_empty() {
        debug!("Placeholders without parameters: {:?}", unresolved);
    }

    substituted.into_owned()
}
