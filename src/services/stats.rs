// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Stats fetcher.
//!
//! Handles one user's sync:
//! 1. Get a valid access token (skip the user if there is none)
//! 2. Fetch athlete stats from Strava
//! 3. Overwrite the ride, run and swim totals records

use crate::db::SharedStore;
use crate::error::{AppError, Result};
use crate::models::ActivityKind;
use crate::services::strava::SharedStravaApi;
use crate::services::tokens::{TokenService, TokenStatus};

/// Why a user was skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    UnknownUser,
    RefreshFailed(String),
}

/// Successful result of [`StatsFetcher::fetch_and_store`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// All three totals records were written.
    Stored,
    /// Nothing was fetched or written.
    Skipped(SkipReason),
}

/// Owns every write to the activity totals records.
#[derive(Clone)]
pub struct StatsFetcher {
    tokens: TokenService,
    api: SharedStravaApi,
    store: SharedStore,
}

impl StatsFetcher {
    pub fn new(tokens: TokenService, api: SharedStravaApi, store: SharedStore) -> Self {
        Self { tokens, api, store }
    }

    /// Fetch `athlete_id`'s totals from Strava and store them.
    ///
    /// On an upstream or parse error nothing is written, so the previous
    /// snapshot stays in place. The three writes are independent: if some
    /// fail the others are kept and [`AppError::StatsWrite`] names the
    /// failed kinds.
    pub async fn fetch_and_store(&self, athlete_id: u64) -> Result<FetchOutcome> {
        let access_token = match self.tokens.ensure_valid_access_token(athlete_id).await? {
            TokenStatus::Valid(token) => token,
            TokenStatus::UnknownUser => {
                return Ok(FetchOutcome::Skipped(SkipReason::UnknownUser));
            }
            TokenStatus::RefreshFailed(reason) => {
                return Ok(FetchOutcome::Skipped(SkipReason::RefreshFailed(reason)));
            }
        };

        let stats = self
            .api
            .get_athlete_stats(&access_token, athlete_id)
            .await?;

        let [ride, run, swim] = stats
            .into_totals(athlete_id)
            .map_err(|field| AppError::MalformedResponse(format!("missing field {}", field)))?;

        let (ride_result, run_result, swim_result) = tokio::join!(
            self.store.upsert_totals(&ride),
            self.store.upsert_totals(&run),
            self.store.upsert_totals(&swim),
        );

        let mut failed = Vec::new();
        let mut details = Vec::new();
        for (kind, result) in [
            (ActivityKind::Ride, ride_result),
            (ActivityKind::Run, run_result),
            (ActivityKind::Swim, swim_result),
        ] {
            if let Err(e) = result {
                tracing::warn!(athlete_id, %kind, error = %e, "Failed to store totals");
                failed.push(kind);
                details.push(format!("{}: {}", kind, e));
            }
        }

        if !failed.is_empty() {
            return Err(AppError::StatsWrite {
                failed,
                details: details.join("; "),
            });
        }

        tracing::debug!(athlete_id, "Stored ride/run/swim totals");
        Ok(FetchOutcome::Stored)
    }
}
