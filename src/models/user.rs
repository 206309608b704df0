//! User model for storage and API.

use serde::{Deserialize, Serialize};

/// A user's OAuth tokens and display name, keyed by Strava athlete ID.
///
/// Only the token service writes the token fields. The record is created
/// on the first successful authorization and replaced by id afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    /// Strava athlete ID (also used as document ID)
    pub id: u64,
    /// Display name shown on the leaderboard
    pub username: String,
    /// Short-lived bearer token
    pub access_token: String,
    /// Long-lived token used to mint new access tokens (may be rotated)
    pub refresh_token: String,
    /// When the access token expires (Unix epoch seconds)
    pub expires_at: i64,
}

impl UserRecord {
    /// The access token is usable strictly before `expires_at`.
    pub fn is_access_token_valid(&self, now: i64) -> bool {
        now < self.expires_at
    }

    /// Copy of this record with a new token triple; the username is kept.
    pub fn with_tokens(&self, access_token: String, refresh_token: String, expires_at: i64) -> Self {
        Self {
            id: self.id,
            username: self.username.clone(),
            access_token,
            refresh_token,
            expires_at,
        }
    }
}

/// Id and display name, as enumerated for sync cycles and the leaderboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: u64,
    pub username: String,
}

impl From<&UserRecord> for UserSummary {
    fn from(user: &UserRecord) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
        }
    }
}
