// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod leaderboard;
pub mod stats;
pub mod user;

pub use leaderboard::{LeaderboardEntry, LeaderboardResponse};
pub use stats::{ActivityKind, ActivityTotals, AthleteStats, ElevationTotals, SwimTotals};
pub use user::{UserRecord, UserSummary};
