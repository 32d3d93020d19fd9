//! Type-safe store identifier.
//!
//! [`StoreId`] is a newtype wrapper around `String` providing type safety
//! so that store identifiers cannot be confused with other strings. It is
//! the routing key for every fan-out decision in the gateway.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque identifier of a store.
///
/// Construction is checked: an empty string is not a valid `StoreId`.
/// Used as the dictionary key in [`super::StoreRegistry`] and as the
/// routing key extracted from incoming stream records.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StoreId(String);

impl StoreId {
    /// Creates a `StoreId` from a string, returning `None` if it is empty.
    #[must_use]
    pub fn new(id: &str) -> Option<Self> {
        if id.is_empty() {
            None
        } else {
            Some(Self(id.to_string()))
        }
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StoreId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
