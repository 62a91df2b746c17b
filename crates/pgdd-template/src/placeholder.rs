//! Shell-style placeholder substitution
//!
//! Supported forms:
//! - `$name` and `${name}` expand to the variable value; use `${name}`
//!   when the value is directly followed by a `$`
//! - any other `$` (e.g. `$1`, or a `$$` / `$tag$` dollar quote) is left as-is
//!
//! Braces outside a `${...}` placeholder are plain text.

use regex::Regex;
use std::sync::OnceLock;

use crate::renderer::{TemplateError, UndefinedPolicy};
use pgdd_manifest::ManifestVariables;

fn placeholder_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        // Alternation order matters: a dollar-quote tag wins over a bare
        // name, and a closed `${...}` over the unterminated-brace catch-all.
        Regex::new(r"\$(?:(\$)|([A-Za-z_][A-Za-z0-9_]*\$)|\{([^}]*)\}|([A-Za-z_][A-Za-z0-9_]*)|(\{))")
            .expect("placeholder regex is valid")
    })
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c == '_' || c.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c == '_' || c.is_ascii_alphanumeric())
}

/// Substitute `$name` / `${name}` placeholders in `template`
pub fn substitute(
    template: &str,
    vars: &ManifestVariables,
    policy: UndefinedPolicy,
) -> Result<String, TemplateError> {
    let mut out = String::with_capacity(template.len());
    let mut last = 0;

    for caps in placeholder_regex().captures_iter(template) {
        let Some(whole) = caps.get(0) else { continue };
        out.push_str(&template[last..whole.start()]);
        last = whole.end();

        // `$$` and `$tag$` open or close a dollar-quoted literal
        if caps.get(1).is_some() || caps.get(2).is_some() {
            out.push_str(whole.as_str());
            continue;
        }

        if caps.get(5).is_some() {
            return Err(TemplateError::Syntax(format!(
                "unterminated placeholder at offset {}",
                whole.start()
            )));
        }

        let name = if let Some(braced) = caps.get(3) {
            let name = braced.as_str().trim();
            if !is_identifier(name) {
                return Err(TemplateError::Syntax(format!(
                    "invalid placeholder name '{}' at offset {}",
                    braced.as_str(),
                    whole.start()
                )));
            }
            name
        } else if let Some(bare) = caps.get(4) {
            bare.as_str()
        } else {
            continue;
        };

        match vars.get(name) {
            Some(value) => out.push_str(value),
            None => match policy {
                UndefinedPolicy::Lenient => {
                    tracing::warn!(variable = name, "undefined template variable rendered as empty string");
                }
                UndefinedPolicy::Strict => {
                    return Err(TemplateError::UndefinedVariable(name.to_string()));
                }
            },
        }
    }

    out.push_str(&template[last..]);
    Ok(out)
}
