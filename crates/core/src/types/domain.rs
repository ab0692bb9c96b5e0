//! Canonical shop domain type.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`ShopDomain`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// The input is empty after stripping protocol and slashes.
    #[error("shop domain cannot be empty")]
    Empty,
    /// The input is too long.
    #[error("shop domain must be at most {max} characters")]
    TooLong {
        /// Maximum allowed length.
        max: usize,
    },
    /// The host contains a character that is not valid in a hostname.
    #[error("shop domain contains invalid character '{0}'")]
    InvalidCharacter(char),
    /// The host has no dot-separated label structure (e.g. `localhost`).
    #[error("shop domain must contain at least one '.'")]
    MissingDot,
    /// The host has an empty label (e.g. `shop..com` or `.shop.com`).
    #[error("shop domain contains an empty label")]
    EmptyLabel,
}

/// A storefront host name in canonical form.
///
/// Merchants paste domains in many shapes (`https://Shop.example.com/`,
/// `shop.example.com/cart`, ` shop.example.com `). Parsing strips the
/// protocol, any path, query or fragment, trailing dots and slashes, and
/// lowercases the host.
///
/// ## Examples
///
/// ```
/// use cartshield_core::ShopDomain;
///
/// let domain = ShopDomain::parse("https://My-Shop.myshopify.com/").unwrap();
/// assert_eq!(domain.as_str(), "my-shop.myshopify.com");
///
/// assert!(ShopDomain::parse("").is_err());
/// assert!(ShopDomain::parse("https://").is_err());
/// assert!(ShopDomain::parse("not a domain").is_err());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(try_from = "String", into = "String")]
pub struct ShopDomain(String);

impl ShopDomain {
    /// Maximum length of a host name (RFC 1035).
    pub const MAX_LENGTH: usize = 253;

    /// Parse and canonicalize a shop domain.
    ///
    /// # Errors
    ///
    /// Returns an error if nothing remains after stripping the protocol and
    /// path, if the host is too long, or if it is not a dotted host name.
    pub fn parse(input: &str) -> Result<Self, DomainError> {
        let trimmed = input.trim();

        let without_scheme = trimmed
            .split_once("://")
            .map_or(trimmed, |(_, rest)| rest);

        let host = without_scheme
            .split(['/', '?', '#'])
            .next()
            .unwrap_or_default()
            .trim_end_matches('.')
            .to_ascii_lowercase();

        if host.is_empty() {
            return Err(DomainError::Empty);
        }

        if host.len() > Self::MAX_LENGTH {
            return Err(DomainError::TooLong {
                max: Self::MAX_LENGTH,
            });
        }

        if let Some(c) = host
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || *c == '-' || *c == '.'))
        {
            return Err(DomainError::InvalidCharacter(c));
        }

        if !host.contains('.') {
            return Err(DomainError::MissingDot);
        }

        if host.split('.').any(str::is_empty) {
            return Err(DomainError::EmptyLabel);
        }

        Ok(Self(host))
    }

    /// Returns the domain as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the domain and returns the inner string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }

    /// Base URL for this shop (`https://{domain}`).
    #[must_use]
    pub fn https_url(&self) -> String {
        format!("https://{}", self.0)
    }
}

impl fmt::Display for ShopDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ShopDomain {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ShopDomain {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ShopDomain> for String {
    fn from(domain: ShopDomain) -> Self {
        domain.0
    }
}

impl core::str::FromStr for ShopDomain {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
