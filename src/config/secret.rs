//! Secure credential handling using the secrecy crate
//!
//! The database connection string carries a password, so it is held as a
//! [`SecretString`]: zeroed when dropped, redacted in `Debug` output, and only
//! readable through an explicit `expose_secret()` call.
//!
//! # Example
//!
//! ```rust
//! use shadowswap::config::secret_string;
//! use secrecy::ExposeSecret;
//!
//! let dsn = secret_string("postgresql://app:hunter2@db/records".to_string());
//! assert!(dsn.expose_secret().starts_with("postgresql://"));
//!
//! // Debug output is redacted
//! assert!(!format!("{dsn:?}").contains("hunter2"));
//! ```

use secrecy::{CloneableSecret, DebugSecret, Secret, SerializableSecret};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use zeroize::Zeroize;

/// Newtype wrapper for String that implements the required traits for Secret
#[derive(Clone, Debug, Zeroize)]
#[zeroize(drop)]
pub struct SecretValue(String);

impl CloneableSecret for SecretValue {}
impl DebugSecret for SecretValue {}
impl SerializableSecret for SecretValue {}

impl From<String> for SecretValue {
    fn from(s: String) -> Self {
        SecretValue(s)
    }
}

impl PartialEq<str> for SecretValue {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl AsRef<str> for SecretValue {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl SecretValue {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn starts_with(&self, prefix: &str) -> bool {
        self.0.starts_with(prefix)
    }

    /// Parse the secret value into another type (e.g. a driver config)
    pub fn parse<F: std::str::FromStr>(&self) -> Result<F, F::Err> {
        self.0.parse()
    }
}

impl Serialize for SecretValue {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for SecretValue {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        String::deserialize(deserializer).map(SecretValue)
    }
}

/// A string that is zeroed on drop and redacted in debug output
pub type SecretString = Secret<SecretValue>;

/// Wraps a plain string as a [`SecretString`]
#[inline]
pub fn secret_string(value: String) -> SecretString {
    Secret::new(SecretValue::from(value))
}

/// Renders a connection string with its credentials masked
///
/// Everything before the last `@` (scheme, user, password) is replaced.
pub fn redact_connection_string(secret: &SecretString) -> String {
    use secrecy::ExposeSecret;

    let text: &str = secret.expose_secret().as_ref();
    match text.rsplit_once('@') {
        Some((_, host)) => format!("postgresql://***@{host}"),
        None => "postgresql://***".to_string(),
    }
}
