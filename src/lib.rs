// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Strava leaderboard: sync Strava activity totals and rank athletes
//!
//! This crate provides the backend API that links Strava accounts via
//! OAuth, keeps each athlete's ride/run/swim totals up to date with a
//! daily background sync, and serves a weighted leaderboard.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use db::SharedStore;
use services::{SyncStatus, TokenService};

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub db: SharedStore,
    pub token_service: TokenService,
    /// Latest completed sync cycle
    pub sync_status: SyncStatus,
}
