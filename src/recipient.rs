//! Recipient records: ordered field→value data used for both addressing and
//! template personalization.

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Sentinel address used when a recipient record contains nothing that looks
/// like an email. The send attempt still happens so the recipient gets a
/// recorded outcome instead of silently vanishing from the batch.
pub const SENTINEL_ADDRESS: &str = "unknown@example.com";

/// Field names checked first when extracting a recipient's address.
const EMAIL_FIELDS: [&str; 5] = ["email", "Email", "EMAIL", "e-mail", "E-mail"];

/// One addressee's data: an ordered mapping from field name to value.
///
/// Field names keep their original case and order; duplicates across a batch
/// are allowed and sent independently.
///
/// ```
/// use mailblast::Recipient;
///
/// let r = Recipient::new()
///     .field("Name", "Ana")
///     .field("Email", "ana@example.com");
/// assert_eq!(r.email().as_deref(), Some("ana@example.com"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Recipient {
    fields: Vec<(String, String)>,
}

impl Recipient {
    /// Create an empty recipient record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a field (builder style).
    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push((name.into(), value.into()));
        self
    }

    /// Build from an iterator of (name, value) pairs.
    pub fn from_pairs<N, V>(pairs: impl IntoIterator<Item = (N, V)>) -> Self
    where
        N: Into<String>,
        V: Into<String>,
    {
        Self {
            fields: pairs
                .into_iter()
                .map(|(n, v)| (n.into(), v.into()))
                .collect(),
        }
    }

    /// Exact-key lookup.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Case-insensitive key lookup.
    pub fn get_ignore_case(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Lookup ignoring `_`, `-`, and spaces in both the query and the field
    /// name, so `first_name` finds a `firstname` or `First Name` field.
    pub fn get_normalized(&self, name: &str) -> Option<&str> {
        let wanted = normalize_key(name);
        self.fields
            .iter()
            .find(|(n, _)| normalize_key(n) == wanted)
            .map(|(_, v)| v.as_str())
    }

    /// Iterate fields in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Best-effort address extraction.
    ///
    /// Checks well-known email field names first, then falls back to any
    /// value containing an `@`. Values are trimmed. Returns `None` only when
    /// nothing in the record looks remotely like an address.
    pub fn email(&self) -> Option<String> {
        for field in EMAIL_FIELDS {
            if let Some(value) = self.get(field) {
                if value.contains('@') {
                    return Some(value.trim().to_string());
                }
            }
        }
        self.fields
            .iter()
            .find(|(_, v)| v.contains('@'))
            .map(|(_, v)| v.trim().to_string())
    }

    /// Address extraction with the [`SENTINEL_ADDRESS`] fallback.
    pub fn email_or_sentinel(&self) -> String {
        self.email().unwrap_or_else(|| SENTINEL_ADDRESS.to_string())
    }
}

fn normalize_key(key: &str) -> String {
    key.chars()
        .filter(|c| !matches!(c, '_' | '-' | ' '))
        .flat_map(|c| c.to_lowercase())
        .collect()
}

// Serialized as a JSON object so the HTTP layer's recipient rows pass
// through unchanged; order is preserved on both sides.
impl Serialize for Recipient {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (name, value) in &self.fields {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Recipient {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct RecipientVisitor;

        impl<'de> Visitor<'de> for RecipientVisitor {
            type Value = Recipient;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a map of recipient fields")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut fields = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((name, value)) = access.next_entry::<String, String>()? {
                    fields.push((name, value));
                }
                Ok(Recipient { fields })
            }
        }

        deserializer.deserialize_map(RecipientVisitor)
    }
}
