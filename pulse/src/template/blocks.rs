//! Dynamic block resolution (first compiler pass)
//!
//! A dynamic block is a named span delimited by `{{#name}}` and `{{/name}}`.
//! Blocks whose flag is true keep their content and lose their markers;
//! blocks whose flag is false, or whose name was never declared, are removed
//! with everything inside them. Placeholders are left untouched for the
//! substitution pass.

use crate::{Error, Result};
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token<'a> {
    Text(&'a str),
    Open(&'a str),
    Close(&'a str),
}

fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
}

/// Split a template into text runs and block markers.
fn tokenize(template: &str) -> Result<Vec<Token<'_>>> {
    let mut tokens = Vec::new();
    let mut text_start = 0;
    let mut pos = 0;

    while let Some(found) = template[pos..].find("{{") {
        let start = pos + found;
        let opening = match template.as_bytes().get(start + 2) {
            Some(b'#') => true,
            Some(b'/') => false,
            _ => {
                pos = start + 1;
                continue;
            }
        };

        let name_start = start + 3;
        let end = template[name_start..]
            .find("}}")
            .map(|i| name_start + i)
            .ok_or_else(|| {
                Error::Template(format!("unterminated block marker at byte {}", start))
            })?;
        let name = template[name_start..end].trim();
        if !is_valid_name(name) {
            return Err(Error::Template(format!(
                "malformed block marker at byte {}: '{}'",
                start,
                &template[start..(end + 2).min(start + 48)]
            )));
        }

        if text_start < start {
            tokens.push(Token::Text(&template[text_start..start]));
        }
        tokens.push(if opening {
            Token::Open(name)
        } else {
            Token::Close(name)
        });
        pos = end + 2;
        text_start = pos;
    }

    if text_start < template.len() {
        tokens.push(Token::Text(&template[text_start..]));
    }
    Ok(tokens)
}

/// Pair every close marker with the nearest open marker of the same name.
/// Opens left unclosed inside a matched pair stay unpaired.
fn pair_markers(tokens: &[Token<'_>]) -> Vec<Option<usize>> {
    let mut pairs = vec![None; tokens.len()];
    let mut open: Vec<usize> = Vec::new();

    for (i, token) in tokens.iter().enumerate() {
        match token {
            Token::Open(_) => open.push(i),
            Token::Close(name) => {
                let matching = open
                    .iter()
                    .rposition(|&j| matches!(tokens[j], Token::Open(n) if n == *name));
                if let Some(depth) = matching {
                    let j = open[depth];
                    open.truncate(depth);
                    pairs[j] = Some(i);
                    pairs[i] = Some(j);
                }
            }
            Token::Text(_) => {}
        }
    }
    pairs
}

/// Resolve every dynamic block in `template` against `flags`.
///
/// Unpaired markers are stripped and reported as a warning; the text around
/// them is kept. Truncated or malformed markers are an error.
pub fn resolve_blocks(template: &str, flags: &HashMap<String, bool>) -> Result<String> {
    let tokens = tokenize(template)?;
    let pairs = pair_markers(&tokens);

    let mut out = String::with_capacity(template.len());
    let mut undeclared = BTreeSet::new();
    let mut stray = Vec::new();

    let mut i = 0;
    while i < tokens.len() {
        match tokens[i] {
            Token::Text(text) => out.push_str(text),
            Token::Open(name) => match pairs[i] {
                Some(close) => {
                    let keep = match flags.get(name) {
                        Some(&keep) => keep,
                        None => {
                            undeclared.insert(name);
                            false
                        }
                    };
                    if !keep {
                        i = close;
                    }
                }
                None => stray.push(format!("{{{{#{}}}}}", name)),
            },
            Token::Close(name) => {
                if pairs[i].is_none() {
                    stray.push(format!("{{{{/{}}}}}", name));
                }
            }
        }
        i += 1;
    }

    if !undeclared.is_empty() {
        debug!("Removed undeclared dynamic blocks: {:?}", undeclared);
    }
    if !stray.is_empty() {
        let mut supplied: Vec<_> = flags.iter().collect();
        supplied.sort();
        warn!(
            "Unbalanced dynamic block markers {:?} stripped; flags supplied: {:?}",
            stray, supplied
        );
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flags(entries: &[(&str, bool)]) -> HashMap<String, bool> {
        entries.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn test_true_keeps_content() {
        let template = r#"{"bool":{"filter":[{{#app}}{"term":{"app":{{app}}}}{{/app}}]}}"#;
        let out = resolve_blocks(template, &flags(&[("app", true)])).unwrap();
        assert_eq!(out, r#"{"bool":{"filter":[{"term":{"app":{{app}}}}]}}"#);
    }

    #[test]
    fn test_false_removes_span() {
        let template = r#"{"bool":{"filter":[{{#app}}{"term":{"app":{{app}}}}{{/app}}]}}"#;
        let out = resolve_blocks(template, &flags(&[("app", false)])).unwrap();
        assert_eq!(out, r#"{"bool":{"filter":[]}}"#);
    }

    #[test]
    fn test_undeclared_block_removed() {
        let out = resolve_blocks("a{{#os}}b{{/os}}c", &HashMap::new()).unwrap();
        assert_eq!(out, "ac");
    }

    #[test]
    fn test_nested_blocks() {
        let template = "[{{#outer}}o{{#inner}}i{{/inner}}O{{/outer}}]";
        assert_eq!(
            resolve_blocks(template, &flags(&[("outer", true), ("inner", false)])).unwrap(),
            "[oO]"
        );
        assert_eq!(
            resolve_blocks(template, &flags(&[("outer", true), ("inner", true)])).unwrap(),
            "[oiO]"
        );
        assert_eq!(
            resolve_blocks(template, &flags(&[("outer", false), ("inner", true)])).unwrap(),
            "[]"
        );
    }

    #[test]
    fn test_repeated_block_name() {
        let template = "{{#f}}a{{/f}}-{{#f}}b{{/f}}";
        assert_eq!(resolve_blocks(template, &flags(&[("f", true)])).unwrap(), "a-b");
        assert_eq!(resolve_blocks(template, &flags(&[("f", false)])).unwrap(), "-");
    }

    #[test]
    fn test_stray_markers_stripped() {
        let out = resolve_blocks("x{{#dangling}}y{{/other}}z", &flags(&[("dangling", false)]))
            .unwrap();
        assert_eq!(out, "xyz");
    }

    #[test]
    fn test_marker_after_brace() {
        let template = r#"{"composite":{{{#after}}"after":{{after}},{{/after}}"size":10}}"#;
        assert_eq!(
            resolve_blocks(template, &flags(&[("after", false)])).unwrap(),
            r#"{"composite":{"size":10}}"#
        );
    }

    #[test]
    fn test_placeholders_untouched() {
        let out = resolve_blocks("{{a}} {{ b }}", &HashMap::new()).unwrap();
        assert_eq!(out, "{{a}} {{ b }}");
    }

    #[test]
    fn test_truncated_marker_is_error() {
        assert!(matches!(
            resolve_blocks("abc {{#open", &HashMap::new()),
            Err(Error::Template(_))
        ));
        assert!(matches!(
            resolve_blocks("abc {{#}} x", &HashMap::new()),
            Err(Error::Template(_))
        ));
        assert!(matches!(
            resolve_blocks(r#"{{#a "b": 1}}"#, &HashMap::new()),
            Err(Error::Template(_))
        ));
    }
}
