//! Email address type with optional display name.

use crate::error::SendError;
use email_address::EmailAddress;
use serde::{Deserialize, Serialize};
use std::fmt;

/// An email address with an optional display name.
///
/// ```
/// use mailblast::Address;
///
/// let addr = Address::with_name("Alice", "alice@example.com");
/// assert_eq!(addr.formatted(), "Alice <alice@example.com>");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    /// Optional display name (e.g., "Alice Smith")
    pub name: Option<String>,
    /// Email address (e.g., "alice@example.com")
    pub email: String,
}

impl Address {
    /// Create a new address with just an email.
    ///
    /// Performs a basic sanity check (non-empty, contains `@`) and logs a
    /// warning if the email looks invalid. For strict validation, use
    /// [`Address::parse`].
    pub fn new(email: impl Into<String>) -> Self {
        let email = email.into();
        if !Self::basic_sanity_check(&email) {
            tracing::warn!(
                email = %email,
                "Creating address with potentially invalid email. Use Address::parse() for strict validation."
            );
        }
        Self { name: None, email }
    }

    /// Create a new address with a name and email.
    pub fn with_name(name: impl Into<String>, email: impl Into<String>) -> Self {
        let email = email.into();
        if !Self::basic_sanity_check(&email) {
            tracing::warn!(
                email = %email,
                "Creating address with potentially invalid email. Use Address::parse() for strict validation."
            );
        }
        Self {
            name: Some(name.into()),
            email,
        }
    }

    fn basic_sanity_check(email: &str) -> bool {
        !email.is_empty() && email.contains('@')
    }

    /// Parse and validate an email address (RFC 5321/5322 rules).
    pub fn parse(email: &str) -> Result<Self, SendError> {
        if !EmailAddress::is_valid(email) {
            return Err(SendError::InvalidAddress(format!(
                "'{}' is not a valid email address",
                email
            )));
        }
        Ok(Self {
            name: None,
            email: email.to_string(),
        })
    }

    /// Format as "Name <email>" or just "email" if no name.
    pub fn formatted(&self) -> String {
        match &self.name {
            Some(name) if name.is_empty() => self.email.clone(),
            Some(name) => format!("{} <{}>", name, self.email),
            None => self.email.clone(),
        }
    }

    /// Format according to RFC 5322 with the display name quoted and escaped.
    ///
    /// This is the form used in raw message headers.
    pub fn formatted_rfc5322(&self) -> String {
        match &self.name {
            Some(name) if name.is_empty() => self.email.clone(),
            Some(name) => {
                // Escape backslashes first, then quotes
                let escaped = name.replace('\\', "\\\\").replace('"', "\\\"");
                format!("\"{}\" <{}>", escaped, self.email)
            }
            None => self.email.clone(),
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.formatted())
    }
}

impl From<&str> for Address {
    fn from(email: &str) -> Self {
        Self::new(email)
    }
}

impl From<String> for Address {
    fn from(email: String) -> Self {
        Self::new(email)
    }
}

impl From<(&str, &str)> for Address {
    fn from((name, email): (&str, &str)) -> Self {
        Self::with_name(name, email)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_formatted() {
        let addr = Address::new("test@example.com");
        assert_eq!(addr.formatted(), "test@example.com");

        let addr = Address::with_name("Alice", "alice@example.com");
        assert_eq!(addr.formatted(), "Alice <alice@example.com>");
    }

    #[test]
    fn test_formatted_rfc5322_escaping() {
        let addr = Address::with_name("Alice \"Ali\" Smith", "alice@example.com");
        assert_eq!(
            addr.formatted_rfc5322(),
            "\"Alice \\\"Ali\\\" Smith\" <alice@example.com>"
        );

        let addr = Address::with_name("", "alice@example.com");
        assert_eq!(addr.formatted_rfc5322(), "alice@example.com");
    }

    #[test]
    fn test_parse() {
        assert!(Address::parse("user@example.com").is_ok());
        assert!(Address::parse("user+tag@mail.example.com").is_ok());
        assert!(Address::parse("not-an-email").is_err());
        assert!(Address::parse("").is_err());
        assert!(Address::parse("user@@example.com").is_err());
    }
}
