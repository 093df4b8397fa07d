//! Placeholder resolution against recipient records.

use crate::recipient::Recipient;
use regex::{Captures, Regex};
use std::sync::OnceLock;

fn placeholder_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{\{\s*([^}]+?)\s*\}\}").expect("valid placeholder regex"))
}

/// Resolve `{{ key }}` placeholders in `text` against a recipient record.
///
/// Resolution order per token: exact key, lowercase key, uppercase key,
/// case-insensitive scan, then a normalized match that ignores `_`, `-`,
/// and spaces (so `{{first_name}}` matches a `firstname` column).
///
/// Unmatched tokens are left verbatim so a malformed template degrades
/// visibly in the delivered mail rather than silently dropping content.
/// Substituted values are never re-scanned for placeholders.
pub fn render(text: &str, recipient: &Recipient) -> String {
    placeholder_regex()
        .replace_all(text, |caps: &Captures| {
            let key = caps[1].trim();
            resolve_key(key, recipient)
                .map(str::to_string)
                .unwrap_or_else(|| {
                    tracing::debug!(placeholder = key, "placeholder not found in recipient");
                    caps[0].to_string()
                })
        })
        .into_owned()
}

fn resolve_key<'a>(key: &str, recipient: &'a Recipient) -> Option<&'a str> {
    if let Some(v) = recipient.get(key) {
        return Some(v);
    }
    if let Some(v) = recipient.get(&key.to_lowercase()) {
        return Some(v);
    }
    if let Some(v) = recipient.get(&key.to_uppercase()) {
        return Some(v);
    }
    if let Some(v) = recipient.get_ignore_case(key) {
        return Some(v);
    }
    recipient.get_normalized(key)
}
