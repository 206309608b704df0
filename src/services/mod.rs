// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod leaderboard;
pub mod scheduler;
pub mod stats;
pub mod strava;
pub mod tokens;

pub use scheduler::{CycleSummary, SchedulerHandle, SchedulerSettings, SyncScheduler, SyncStatus};
pub use stats::{FetchOutcome, SkipReason, StatsFetcher};
pub use strava::{SharedStravaApi, StravaApi, StravaClient};
pub use tokens::{OAuthResult, RefreshLocks, TokenService, TokenStatus};
