// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Read-only API routes: leaderboard and the caller's own totals.

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::{ActivityKind, ActivityTotals, LeaderboardResponse};
use crate::services::leaderboard::leaderboard;
use crate::AppState;
use axum::{extract::State, routing::get, Extension, Json, Router};
use std::sync::Arc;

/// Routes anyone may call.
pub fn public_routes() -> Router<Arc<AppState>> {
    Router::new().route("/leaderboard", get(get_leaderboard))
}

/// Routes that need a session; the auth middleware is applied in routes/mod.rs.
pub fn protected_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/run", get(get_run))
        .route("/ride", get(get_ride))
        .route("/swim", get(get_swim))
}

/// Top athletes by weighted score.
async fn get_leaderboard(State(state): State<Arc<AppState>>) -> Result<Json<LeaderboardResponse>> {
    let entries = leaderboard(&state.db).await?;
    Ok(Json(LeaderboardResponse {
        leaderboard: entries,
    }))
}

async fn get_run(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<ActivityTotals>> {
    get_totals(&state, user, ActivityKind::Run).await
}

async fn get_ride(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<ActivityTotals>> {
    get_totals(&state, user, ActivityKind::Ride).await
}

async fn get_swim(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<ActivityTotals>> {
    get_totals(&state, user, ActivityKind::Swim).await
}

async fn get_totals(
    state: &AppState,
    user: AuthUser,
    kind: ActivityKind,
) -> Result<Json<ActivityTotals>> {
    state
        .db
        .get_totals(kind, user.athlete_id)
        .await?
        .map(Json)
        .ok_or_else(|| {
            AppError::NotFound(format!("No {} totals for athlete {}", kind, user.athlete_id))
        })
}
