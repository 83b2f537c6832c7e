//! Domain models for mirrored identity-provider users.
//!
//! The user store holds one record per provider-assigned id. Records are
//! created, patched, and removed by webhook deliveries; no other writer
//! exists for the synced fields.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Strongly-typed user identifier.
///
/// Wraps the identity provider's opaque id. Ids are assigned by the
/// provider only and are never generated locally; once a record exists its
/// id is immutable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(transparent)]
pub struct UserId(pub String);

impl UserId {
    /// Wraps a provider-assigned id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for UserId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for UserId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// A user record mirrored from the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    /// Provider-assigned id. Primary key.
    pub id: UserId,

    /// Primary email address at the time of the last sync.
    pub email: String,

    /// Display name, given name and family name joined by a space.
    pub name: String,

    /// Avatar URL.
    pub image: String,

    /// Application-owned field. Starts empty; the sync path never writes
    /// it after creation.
    pub resume: String,
}

/// Partial change set applied by a user update event.
///
/// Absent fields leave the stored value untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserUpdate {
    /// New primary email, if delivered.
    pub email: Option<String>,

    /// New display name, if delivered.
    pub name: Option<String>,

    /// New avatar URL, if delivered.
    pub image: Option<String>,
}

impl UserUpdate {
    /// Returns true when applying this change set would not modify any
    /// field.
    pub fn is_empty(&self) -> bool {
        self.email.is_none() && self.name.is_none() && self.image.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_id_display_matches_inner() {
        let id = UserId::from("user_2x9aBcD");
        assert_eq!(id.to_string(), "user_2x9aBcD");
        assert_eq!(id.as_str(), "user_2x9aBcD");
    }

    #[test]
    fn empty_update_detected() {
        assert!(UserUpdate::default().is_empty());

        let update = UserUpdate { email: Some("a@b.com".into()), ..Default::default() };
        assert!(!update.is_empty());
    }

    #[test]
    fn user_round_trips_through_json() {
        let user = User {
            id: UserId::from("u1"),
            email: "a@b.com".into(),
            name: "A B".into(),
            image: "http://x/img".into(),
            resume: String::new(),
        };

        let json = serde_json::to_value(&user).unwrap();
        assert_eq!(json["id"], "u1");
        assert_eq!(json["resume"], "");

        let back: User = serde_json::from_value(json).unwrap();
        assert_eq!(back, user);
    }
}
