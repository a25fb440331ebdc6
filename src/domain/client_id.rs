//! Opaque identity of one admitted connection.
//!
//! [`ClientId`] is a newtype wrapper around [`uuid::Uuid`] (v4) so that
//! client identities cannot be confused with any other UUID in the system.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Unique identifier for a client registration.
///
/// Generated once when a connection adapter starts and immutable
/// thereafter. Used as the key of the hub's client set and as the sender
/// tag carried by every [`super::Envelope`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(uuid::Uuid);

impl ClientId {
    /// Creates a new random `ClientId` (UUID v4).
    #[must_use]
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    /// Returns the inner [`uuid::Uuid`].
    #[must_use]
    pub const fn as_uuid(&self) -> &uuid::Uuid {
        &self.0
    }
}

impl Default for ClientId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<uuid::Uuid> for ClientId {
    fn from(uuid: uuid::Uuid) -> Self {
        Self(uuid)
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn new_generates_unique_ids() {
        assert_ne!(ClientId::new(), ClientId::new());
    }

    #[test]
    fn display_is_uuid_format() {
        let s = ClientId::new().to_string();
        assert_eq!(s.len(), 36);
        assert_eq!(s.matches('-').count(), 4);
    }

    #[test]
    fn from_uuid_keeps_value() {
        let uuid = uuid::Uuid::new_v4();
        let id = ClientId::from(uuid);
        assert_eq!(*id.as_uuid(), uuid);
    }

    #[test]
    fn serializes_as_bare_string() {
        let id = ClientId::new();
        let Ok(json) = serde_json::to_string(&id) else {
            panic!("serialization failed");
        };
        assert_eq!(json, format!("\"{id}\""));
    }
}
