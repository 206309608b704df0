// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Leaderboard rows returned by the API.

use serde::{Deserialize, Serialize};

/// A ranked user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub id: u64,
    pub username: String,
    pub score: f64,
}

/// `GET /leaderboard` body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaderboardResponse {
    #[serde(rename = "LeaderBoard")]
    pub leaderboard: Vec<LeaderboardEntry>,
}
