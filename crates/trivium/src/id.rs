//! ID generation utilities for the Trivium application.
//!
//! This module provides type-safe ID generation using the `tiny_id` crate,
//! with specific ID types for different entities in the system.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;
use std::sync::Mutex;
use tiny_id::ShortCodeGenerator;

/// Type alias for a lazy-initialized short code generator with a mutex for thread safety.
/// This allows us to create a global generator that can be used across the application
/// without needing to pass it around explicitly.
type LazyShortCodeGenerator = LazyLock<Mutex<ShortCodeGenerator<char>>>;

// Session codes are what players type in to join, so the alphabet is the
// full uppercase base36 set and the length is kept short.
static SESSION_CODE_GENERATOR: LazyShortCodeGenerator = LazyLock::new(|| {
    let alphabet: Vec<char> = "ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789".chars().collect();
    Mutex::new(ShortCodeGenerator::with_alphabet(alphabet, 6))
});

/// A type-safe wrapper around string IDs.
///
/// This struct provides a consistent way to handle IDs throughout the
/// application while maintaining type safety and preventing ID mixing.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Id<T> {
    value: String,
    _phantom: std::marker::PhantomData<T>,
}

// Custom serde implementation to serialize as just a string
impl<T> Serialize for Id<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.value.serialize(serializer)
    }
}

impl<'de, T> Deserialize<'de> for Id<T> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        Ok(Self::from_string(value))
    }
}

impl<T> Id<T> {
    /// Creates a new ID with the given value.
    ///
    /// # Example
    /// ```
    /// use trivium::id::{Id, SessionMarker};
    ///
    /// let code = Id::<SessionMarker>::from_string("ABC123".to_string());
    /// assert_eq!(code.as_str(), "ABC123");
    /// ```
    pub fn from_string(value: String) -> Self {
        Self {
            value,
            _phantom: std::marker::PhantomData,
        }
    }

    /// Returns the string value of the ID.
    pub fn as_str(&self) -> &str {
        &self.value
    }

    /// Consumes the ID and returns the inner string value.
    pub fn into_string(self) -> String {
        self.value
    }
}

impl<T> fmt::Debug for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Id({})", self.value)
    }
}

impl<T> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}

impl<T> From<String> for Id<T> {
    fn from(value: String) -> Self {
        Self::from_string(value)
    }
}

impl<T> From<&str> for Id<T> {
    fn from(value: &str) -> Self {
        Self::from_string(value.to_string())
    }
}

impl<T> AsRef<str> for Id<T> {
    fn as_ref(&self) -> &str {
        &self.value
    }
}

// Type markers for different entity types
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionMarker;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UserMarker;

/// Type alias for session codes (the 6-character join code).
pub type SessionCode = Id<SessionMarker>;

/// Type alias for user IDs (opaque, supplied by clients).
pub type UserId = Id<UserMarker>;

impl SessionCode {
    /// Generates a new candidate session code (6 characters, A-Z and 0-9).
    ///
    /// Uniqueness within a single generator instance is guaranteed by
    /// `tiny_id`; uniqueness against the session store is the store's job
    /// (it re-draws on collision).
    ///
    /// # Example
    /// ```
    /// use trivium::id::SessionCode;
    ///
    /// let code = SessionCode::generate();
    /// assert_eq!(code.as_str().len(), 6);
    /// assert!(code.as_str().chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
    /// ```
    pub fn generate() -> Self {
        let mut generator = SESSION_CODE_GENERATOR.lock().unwrap();
        Self {
            value: generator.next_string(),
            _phantom: std::marker::PhantomData,
        }
    }
}
