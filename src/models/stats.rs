// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Activity totals snapshots and the Strava athlete stats payload they come from.
//!
//! Each sync overwrites a user's three records (ride, run, swim) wholesale;
//! no history is kept.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::db::collections;

/// The three activity groups Strava aggregates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityKind {
    Ride,
    Run,
    Swim,
}

impl ActivityKind {
    pub const ALL: [ActivityKind; 3] = [ActivityKind::Ride, ActivityKind::Run, ActivityKind::Swim];

    /// Collection/table that holds this kind's totals.
    pub fn collection(self) -> &'static str {
        match self {
            ActivityKind::Ride => collections::RIDES,
            ActivityKind::Run => collections::RUNS,
            ActivityKind::Swim => collections::SWIMS,
        }
    }
}

impl fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ActivityKind::Ride => "ride",
            ActivityKind::Run => "run",
            ActivityKind::Swim => "swim",
        };
        f.write_str(name)
    }
}

/// Ride or run totals: distance and elevation gain in meters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElevationTotals {
    /// Strava athlete ID (also used as document ID)
    pub id: u64,
    /// Rolling recent window (Strava's "recent" = last 4 weeks)
    pub month_dist: f64,
    pub month_elevation: f64,
    pub year_dist: f64,
    pub year_elevation: f64,
    pub all_dist: f64,
    pub all_elevation: f64,
}

/// Swim totals: distance only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwimTotals {
    pub id: u64,
    pub month_dist: f64,
    pub year_dist: f64,
    pub all_dist: f64,
}

/// One per-kind totals record.
#[derive(Debug, Clone, PartialEq)]
pub enum ActivityTotals {
    Ride(ElevationTotals),
    Run(ElevationTotals),
    Swim(SwimTotals),
}

impl ActivityTotals {
    pub fn kind(&self) -> ActivityKind {
        match self {
            ActivityTotals::Ride(_) => ActivityKind::Ride,
            ActivityTotals::Run(_) => ActivityKind::Run,
            ActivityTotals::Swim(_) => ActivityKind::Swim,
        }
    }

    pub fn id(&self) -> u64 {
        match self {
            ActivityTotals::Ride(t) | ActivityTotals::Run(t) => t.id,
            ActivityTotals::Swim(t) => t.id,
        }
    }

    /// Rebuild a typed record from its stored JSON form.
    pub fn from_value(kind: ActivityKind, value: serde_json::Value) -> serde_json::Result<Self> {
        Ok(match kind {
            ActivityKind::Ride => ActivityTotals::Ride(serde_json::from_value(value)?),
            ActivityKind::Run => ActivityTotals::Run(serde_json::from_value(value)?),
            ActivityKind::Swim => ActivityTotals::Swim(serde_json::from_value(value)?),
        })
    }
}

impl Serialize for ActivityTotals {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ActivityTotals::Ride(t) | ActivityTotals::Run(t) => t.serialize(serializer),
            ActivityTotals::Swim(t) => t.serialize(serializer),
        }
    }
}

// ─── Strava payload ──────────────────────────────────────────────

/// One `*_totals` object from `GET /athletes/{id}/stats`.
///
/// Strava sends more fields (count, moving_time, ...); only the ones we
/// store are required. `elevation_gain` is optional here so swim totals
/// parse, and is checked explicitly for ride and run.
#[derive(Debug, Clone, Deserialize)]
pub struct StravaTotals {
    pub distance: f64,
    #[serde(default)]
    pub elevation_gain: Option<f64>,
}

/// Athlete stats response from Strava. Every group is required.
#[derive(Debug, Clone, Deserialize)]
pub struct AthleteStats {
    pub recent_ride_totals: StravaTotals,
    pub ytd_ride_totals: StravaTotals,
    pub all_ride_totals: StravaTotals,
    pub recent_run_totals: StravaTotals,
    pub ytd_run_totals: StravaTotals,
    pub all_run_totals: StravaTotals,
    pub recent_swim_totals: StravaTotals,
    pub ytd_swim_totals: StravaTotals,
    pub all_swim_totals: StravaTotals,
}

impl AthleteStats {
    /// Split the payload into the three records stored for `athlete_id`.
    ///
    /// Returns the name of the first missing elevation field on failure.
    pub fn into_totals(self, athlete_id: u64) -> Result<[ActivityTotals; 3], String> {
        let ride = elevation_totals(
            athlete_id,
            "ride",
            &self.recent_ride_totals,
            &self.ytd_ride_totals,
            &self.all_ride_totals,
        )?;
        let run = elevation_totals(
            athlete_id,
            "run",
            &self.recent_run_totals,
            &self.ytd_run_totals,
            &self.all_run_totals,
        )?;
        let swim = SwimTotals {
            id: athlete_id,
            month_dist: self.recent_swim_totals.distance,
            year_dist: self.ytd_swim_totals.distance,
            all_dist: self.all_swim_totals.distance,
        };

        Ok([
            ActivityTotals::Ride(ride),
            ActivityTotals::Run(run),
            ActivityTotals::Swim(swim),
        ])
    }
}

fn elevation_totals(
    athlete_id: u64,
    group: &str,
    recent: &StravaTotals,
    ytd: &StravaTotals,
    all: &StravaTotals,
) -> Result<ElevationTotals, String> {
    let gain = |totals: &StravaTotals, window: &str| {
        totals
            .elevation_gain
            .ok_or_else(|| format!("{window}_{group}_totals.elevation_gain"))
    };

    Ok(ElevationTotals {
        id: athlete_id,
        month_dist: recent.distance,
        month_elevation: gain(recent, "recent")?,
        year_dist: ytd.distance,
        year_elevation: gain(ytd, "ytd")?,
        all_dist: all.distance,
        all_elevation: gain(all, "all")?,
    })
}
