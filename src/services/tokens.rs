// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Token lifecycle: keeps a usable Strava access token available per user.
//!
//! A token is usable while `now < expires_at`. Expired tokens are refreshed
//! under a per-user lock so concurrent callers (a sync worker and a request
//! handler, say) never spend the same refresh token twice.

use crate::db::SharedStore;
use crate::error::AppError;
use crate::models::UserRecord;
use crate::services::strava::SharedStravaApi;
use crate::time_utils::now_epoch_secs;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Shared refresh locks, keyed by athlete ID.
pub type RefreshLocks = Arc<DashMap<u64, Arc<Mutex<()>>>>;

/// Outcome of asking for a usable access token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenStatus {
    /// A token that is valid right now.
    Valid(String),
    /// No record for this user; callers skip them.
    UnknownUser,
    /// Strava would not refresh the token. The stored record is unchanged
    /// and the next sync cycle retries.
    RefreshFailed(String),
}

/// Result of handling the OAuth callback.
#[derive(Debug, Clone)]
pub struct OAuthResult {
    pub athlete_id: u64,
    pub username: String,
}

/// Owns every write to the token fields of [`UserRecord`].
#[derive(Clone)]
pub struct TokenService {
    api: SharedStravaApi,
    store: SharedStore,
    refresh_locks: RefreshLocks,
}

impl TokenService {
    pub fn new(api: SharedStravaApi, store: SharedStore) -> Self {
        Self::with_locks(api, store, Arc::new(DashMap::new()))
    }

    /// Create a service that shares `refresh_locks` with other instances.
    pub fn with_locks(api: SharedStravaApi, store: SharedStore, refresh_locks: RefreshLocks) -> Self {
        Self {
            api,
            store,
            refresh_locks,
        }
    }

    /// Return a currently valid access token for `athlete_id`, refreshing it
    /// if it has expired.
    ///
    /// Store failures are errors; a missing user or a rejected refresh is a
    /// [`TokenStatus`].
    pub async fn ensure_valid_access_token(&self, athlete_id: u64) -> Result<TokenStatus, AppError> {
        // Fast path: no lock, no network.
        let Some(user) = self.store.get_user(athlete_id).await? else {
            return Ok(TokenStatus::UnknownUser);
        };
        if user.is_access_token_valid(now_epoch_secs()) {
            return Ok(TokenStatus::Valid(user.access_token));
        }

        let lock = self
            .refresh_locks
            .entry(athlete_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _guard = lock.lock().await;

        // Another task may have refreshed while we were waiting.
        let Some(user) = self.store.get_user(athlete_id).await? else {
            return Ok(TokenStatus::UnknownUser);
        };
        if user.is_access_token_valid(now_epoch_secs()) {
            return Ok(TokenStatus::Valid(user.access_token));
        }

        tracing::info!(athlete_id, "Access token expired, refreshing");
        self.refresh(user).await
    }

    /// Exchange the stored refresh token and replace the full token triple.
    ///
    /// Nothing is written unless Strava returns a complete, unexpired grant.
    async fn refresh(&self, user: UserRecord) -> Result<TokenStatus, AppError> {
        let athlete_id = user.id;

        let grant = match self.api.refresh_token(&user.refresh_token).await {
            Ok(grant) => grant,
            Err(e) if e.is_strava_token_error() => {
                // Another instance may have rotated the refresh token already.
                if let Some(current) = self.store.get_user(athlete_id).await? {
                    if current.is_access_token_valid(now_epoch_secs()) {
                        tracing::info!(
                            athlete_id,
                            "Refresh token already rotated by another writer, using stored token"
                        );
                        return Ok(TokenStatus::Valid(current.access_token));
                    }
                }
                tracing::warn!(athlete_id, error = %e, "Strava rejected refresh token");
                return Ok(TokenStatus::RefreshFailed(e.to_string()));
            }
            Err(e) => {
                tracing::warn!(athlete_id, error = %e, "Token refresh failed");
                return Ok(TokenStatus::RefreshFailed(e.to_string()));
            }
        };

        let now = now_epoch_secs();
        if grant.expires_at <= now {
            tracing::warn!(
                athlete_id,
                expires_at = grant.expires_at,
                now,
                "Refreshed token is already expired, ignoring it"
            );
            return Ok(TokenStatus::RefreshFailed(format!(
                "refreshed token expired at {}",
                grant.expires_at
            )));
        }

        let updated = user.with_tokens(grant.access_token, grant.refresh_token, grant.expires_at);
        self.store.upsert_user(&updated).await?;

        // Read back what was stored rather than trusting the local copy.
        match self.store.get_user(athlete_id).await? {
            Some(stored) => {
                tracing::info!(athlete_id, expires_at = stored.expires_at, "Token refreshed");
                Ok(TokenStatus::Valid(stored.access_token))
            }
            None => Ok(TokenStatus::UnknownUser),
        }
    }

    /// Handle OAuth callback: exchange `code` for tokens and store the user.
    pub async fn handle_oauth_callback(&self, code: &str) -> Result<OAuthResult, AppError> {
        let response = self.api.exchange_code(code).await?;

        let user = UserRecord {
            id: response.athlete.id,
            username: response.athlete.display_name(),
            access_token: response.access_token,
            refresh_token: response.refresh_token,
            expires_at: response.expires_at,
        };

        self.store.upsert_user(&user).await?;

        tracing::info!(
            athlete_id = user.id,
            username = %user.username,
            "OAuth callback handled, tokens stored"
        );

        Ok(OAuthResult {
            athlete_id: user.id,
            username: user.username,
        })
    }
}
