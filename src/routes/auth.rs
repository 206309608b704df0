// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Strava OAuth authentication routes.

use axum::{
    extract::{Query, State},
    response::Redirect,
    routing::get,
    Json, Router,
};
use axum_extra::extract::cookie::CookieJar;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::{AppError, Result};
use crate::middleware::auth::{create_jwt, removal_cookie, session_cookie};
use crate::services::strava::authorize_url;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/login", get(login))
        .route("/exchange_token", get(exchange_token))
        .route("/logout", get(logout))
}

/// Start OAuth flow - redirect to Strava authorization.
async fn login(State(state): State<Arc<AppState>>) -> Redirect {
    let auth_url = authorize_url(
        &state.config.client_id,
        &state.config.redirect_uri,
        &state.config.scope,
    );

    tracing::info!(
        client_id = %state.config.client_id,
        "Starting OAuth flow, redirecting to Strava"
    );

    Redirect::temporary(&auth_url)
}

/// Query string Strava appends when redirecting back to us.
#[derive(Deserialize)]
pub struct ExchangeParams {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    scope: Option<String>,
    /// Set by Strava when the user denied access.
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ExchangeResponse {
    pub message: String,
    pub athlete_id: u64,
}

/// OAuth callback - exchange code for tokens, store them, start a session.
async fn exchange_token(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Query(params): Query<ExchangeParams>,
) -> Result<(CookieJar, Json<ExchangeResponse>)> {
    if let Some(error) = params.error {
        tracing::warn!(error = %error, "OAuth error from Strava");
        return Err(AppError::BadRequest(format!("authorization denied: {}", error)));
    }

    let code = params
        .code
        .filter(|c| !c.is_empty())
        .ok_or_else(|| AppError::BadRequest("missing code".to_string()))?;

    tracing::info!(scope = ?params.scope, "Exchanging authorization code for tokens");

    let oauth_result = state.token_service.handle_oauth_callback(&code).await?;

    let jwt = create_jwt(oauth_result.athlete_id, &state.config.session_key)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("JWT creation failed: {}", e)))?;

    let jar = jar.add(session_cookie(jwt, state.config.cookie_secure));

    Ok((
        jar,
        Json(ExchangeResponse {
            message: "success".to_string(),
            athlete_id: oauth_result.athlete_id,
        }),
    ))
}

/// Logout - clear the session cookie.
async fn logout(State(state): State<Arc<AppState>>, jar: CookieJar) -> (CookieJar, Redirect) {
    (
        jar.add(removal_cookie(state.config.cookie_secure)),
        Redirect::temporary("/"),
    )
}
