//! Requester identities
//!
//! A requester is named either by a chat handle (`@alice`, `alice`) or by an
//! email address (`alice@example.com`). Both forms are normalized to lower case
//! before they reach storage, so lookups are case-insensitive.
//!
//! Classification follows a single rule: input that starts with `@`, or that
//! contains no `@` at all, is a handle. Anything else is an email.

use std::fmt;
use thiserror::Error;

/// Valid characters for a handle (Telegram username alphabet)
fn is_valid_handle_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentityError {
    #[error("identity cannot be empty")]
    Empty,

    #[error("invalid handle '{0}': must match [a-zA-Z0-9_]+")]
    InvalidHandle(String),

    #[error("invalid email address '{0}'")]
    InvalidEmail(String),
}

/// A normalized chat handle: no leading `@`, lower case
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Handle(String);

impl Handle {
    /// Parse and normalize a handle, e.g. `@Alice` -> `alice`
    pub fn parse(raw: &str) -> Result<Self, IdentityError> {
        let trimmed = raw.trim();
        let name = trimmed.strip_prefix('@').unwrap_or(trimmed);

        if name.is_empty() {
            return Err(IdentityError::Empty);
        }
        if !name.chars().all(is_valid_handle_char) {
            return Err(IdentityError::InvalidHandle(trimmed.to_string()));
        }

        Ok(Self(name.to_ascii_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A normalized (lower-cased) email address
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Email(String);

impl Email {
    pub fn parse(raw: &str) -> Result<Self, IdentityError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(IdentityError::Empty);
        }

        let invalid = || IdentityError::InvalidEmail(trimmed.to_string());

        if trimmed.chars().any(char::is_whitespace) {
            return Err(invalid());
        }

        let (local, domain) = trimmed.split_once('@').ok_or_else(invalid)?;
        if local.is_empty() || domain.is_empty() || domain.contains('@') {
            return Err(invalid());
        }

        Ok(Self(trimmed.to_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Email {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The key a token is claimed under
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RequesterKey {
    Handle(Handle),
    Email(Email),
}

impl RequesterKey {
    /// Classify and normalize free-form input
    pub fn parse(raw: &str) -> Result<Self, IdentityError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(IdentityError::Empty);
        }

        if trimmed.starts_with('@') || !trimmed.contains('@') {
            Handle::parse(trimmed).map(RequesterKey::Handle)
        } else {
            Email::parse(trimmed).map(RequesterKey::Email)
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            RequesterKey::Handle(h) => h.as_str(),
            RequesterKey::Email(e) => e.as_str(),
        }
    }

    pub fn is_handle(&self) -> bool {
        matches!(self, RequesterKey::Handle(_))
    }
}

impl From<Handle> for RequesterKey {
    fn from(handle: Handle) -> Self {
        RequesterKey::Handle(handle)
    }
}

impl From<Email> for RequesterKey {
    fn from(email: Email) -> Self {
        RequesterKey::Email(email)
    }
}

impl fmt::Display for RequesterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
