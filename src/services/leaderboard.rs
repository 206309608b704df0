// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Leaderboard scoring.
//!
//! Score uses the recent ("month") window only:
//!
//! `run.dist + run.elev / 0.1 + ride.dist / 4 + ride.elev / 0.3 + swim.dist / 0.25`
//!
//! Users missing any of their three totals records are left off the board.

use crate::db::SharedStore;
use crate::error::Result;
use crate::models::{
    ActivityKind, ActivityTotals, ElevationTotals, LeaderboardEntry, SwimTotals, UserSummary,
};
use std::collections::HashMap;

/// Number of entries returned.
pub const LEADERBOARD_SIZE: usize = 10;

const RUN_ELEVATION_DIVISOR: f64 = 0.1;
const RIDE_DISTANCE_DIVISOR: f64 = 4.0;
const RIDE_ELEVATION_DIVISOR: f64 = 0.3;
const SWIM_DISTANCE_DIVISOR: f64 = 0.25;

/// One user's recent totals across all three kinds.
#[derive(Debug, Clone)]
pub struct ScoringInput<'a> {
    pub run: &'a ElevationTotals,
    pub ride: &'a ElevationTotals,
    pub swim: &'a SwimTotals,
}

/// Weighted activity score.
pub fn score(input: &ScoringInput<'_>) -> f64 {
    input.run.month_dist
        + input.run.month_elevation / RUN_ELEVATION_DIVISOR
        + input.ride.month_dist / RIDE_DISTANCE_DIVISOR
        + input.ride.month_elevation / RIDE_ELEVATION_DIVISOR
        + input.swim.month_dist / SWIM_DISTANCE_DIVISOR
}

/// Rank `users` by score, highest first, keeping at most [`LEADERBOARD_SIZE`].
///
/// Ties keep the order of `users`. Totals are looked up by id; users without
/// all three records are skipped.
pub fn compute(
    users: &[UserSummary],
    rides: &HashMap<u64, ElevationTotals>,
    runs: &HashMap<u64, ElevationTotals>,
    swims: &HashMap<u64, SwimTotals>,
) -> Vec<LeaderboardEntry> {
    let mut entries: Vec<LeaderboardEntry> = users
        .iter()
        .filter_map(|user| {
            let (Some(run), Some(ride), Some(swim)) =
                (runs.get(&user.id), rides.get(&user.id), swims.get(&user.id))
            else {
                tracing::debug!(athlete_id = user.id, "Incomplete totals, not ranked");
                return None;
            };

            Some(LeaderboardEntry {
                id: user.id,
                username: user.username.clone(),
                score: score(&ScoringInput { run, ride, swim }),
            })
        })
        .collect();

    // sort_by is stable, so equal scores stay in enumeration order.
    entries.sort_by(|a, b| b.score.total_cmp(&a.score));
    entries.truncate(LEADERBOARD_SIZE);
    entries
}

/// Load users and totals from the store and rank them.
pub async fn leaderboard(store: &SharedStore) -> Result<Vec<LeaderboardEntry>> {
    let users = store.list_users().await?;

    let mut rides = HashMap::new();
    let mut runs = HashMap::new();
    let mut swims = HashMap::new();

    for kind in ActivityKind::ALL {
        for totals in store.list_totals(kind).await? {
            match totals {
                ActivityTotals::Ride(t) => {
                    rides.insert(t.id, t);
                }
                ActivityTotals::Run(t) => {
                    runs.insert(t.id, t);
                }
                ActivityTotals::Swim(t) => {
                    swims.insert(t.id, t);
                }
            }
        }
    }

    Ok(compute(&users, &rides, &runs, &swims))
}
