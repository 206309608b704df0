// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Strava API client.
//!
//! Handles:
//! - Authorization-code and refresh-token exchange
//! - Athlete stats fetching
//! - Rate limit and rejected-token detection

use crate::error::AppError;
use crate::models::AthleteStats;
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

const STRAVA_API_URL: &str = "https://www.strava.com/api/v3";
const STRAVA_OAUTH_URL: &str = "https://www.strava.com/oauth";

/// Shared provider handle.
pub type SharedStravaApi = Arc<dyn StravaApi>;

/// The calls this service makes to Strava.
#[async_trait]
pub trait StravaApi: Send + Sync {
    /// Exchange an authorization code for a token pair.
    async fn exchange_code(&self, code: &str) -> Result<TokenExchangeResponse, AppError>;

    /// Exchange a refresh token for a new token pair.
    async fn refresh_token(&self, refresh_token: &str) -> Result<TokenRefreshResponse, AppError>;

    /// Fetch aggregate totals for an athlete.
    async fn get_athlete_stats(
        &self,
        access_token: &str,
        athlete_id: u64,
    ) -> Result<AthleteStats, AppError>;
}

/// Strava API client.
#[derive(Clone)]
pub struct StravaClient {
    http: reqwest::Client,
    base_url: String,
    oauth_url: String,
    client_id: String,
    client_secret: String,
}

impl StravaClient {
    /// Create a new Strava client with OAuth credentials.
    ///
    /// `timeout` bounds every request so one slow call cannot hold a sync
    /// worker indefinitely.
    pub fn new(
        client_id: String,
        client_secret: String,
        timeout: Duration,
    ) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Internal(anyhow::anyhow!("HTTP client init failed: {}", e)))?;

        Ok(Self {
            http,
            base_url: STRAVA_API_URL.to_string(),
            oauth_url: STRAVA_OAUTH_URL.to_string(),
            client_id,
            client_secret,
        })
    }

    /// Point the client at other API/OAuth roots (used against mock servers).
    pub fn with_base_urls(mut self, api_url: &str, oauth_url: &str) -> Self {
        self.base_url = api_url.trim_end_matches('/').to_string();
        self.oauth_url = oauth_url.trim_end_matches('/').to_string();
        self
    }

    async fn post_token_form<T: for<'de> Deserialize<'de>>(
        &self,
        form: &[(&str, &str)],
        what: &str,
    ) -> Result<T, AppError> {
        let response = self
            .http
            .post(format!("{}/token", self.oauth_url))
            .form(form)
            .send()
            .await
            .map_err(|e| AppError::StravaApi(format!("{} request failed: {}", what, e)))?;

        self.check_response_json(response).await
    }

    /// Check response and parse JSON body.
    ///
    /// A non-success status is `StravaApi`; a 2xx body that does not have the
    /// expected shape is `MalformedResponse`.
    async fn check_response_json<T: for<'de> Deserialize<'de>>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, AppError> {
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();

            if status.as_u16() == 429 {
                tracing::warn!("Strava rate limit hit (429)");
                return Err(AppError::StravaApi(AppError::STRAVA_RATE_LIMIT.to_string()));
            }

            if status.as_u16() == 401 {
                return Err(AppError::StravaApi(
                    AppError::STRAVA_TOKEN_ERROR.to_string(),
                ));
            }

            return Err(AppError::StravaApi(format!("HTTP {}: {}", status, body)));
        }

        let body = response
            .text()
            .await
            .map_err(|e| AppError::StravaApi(format!("Failed to read response: {}", e)))?;

        serde_json::from_str(&body).map_err(|e| AppError::MalformedResponse(e.to_string()))
    }
}

#[async_trait]
impl StravaApi for StravaClient {
    async fn exchange_code(&self, code: &str) -> Result<TokenExchangeResponse, AppError> {
        self.post_token_form(
            &[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("code", code),
                ("grant_type", "authorization_code"),
            ],
            "Token exchange",
        )
        .await
    }

    async fn refresh_token(&self, refresh_token: &str) -> Result<TokenRefreshResponse, AppError> {
        self.post_token_form(
            &[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("refresh_token", refresh_token),
                ("grant_type", "refresh_token"),
            ],
            "Token refresh",
        )
        .await
    }

    async fn get_athlete_stats(
        &self,
        access_token: &str,
        athlete_id: u64,
    ) -> Result<AthleteStats, AppError> {
        let url = format!("{}/athletes/{}/stats", self.base_url, athlete_id);

        let response = self
            .http
            .get(&url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| AppError::StravaApi(e.to_string()))?;

        self.check_response_json(response).await
    }
}

/// Build the Strava authorization URL users are redirected to from `/login`.
pub fn authorize_url(client_id: &str, redirect_uri: &str, scope: &str) -> String {
    format!(
        "{}/authorize?\
         client_id={}&\
         redirect_uri={}&\
         response_type=code&\
         scope={}",
        STRAVA_OAUTH_URL,
        urlencoding::encode(client_id),
        urlencoding::encode(redirect_uri),
        scope
    )
}

/// Token refresh response from Strava.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenRefreshResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: i64,
}

/// Token exchange response from Strava OAuth (includes athlete info).
#[derive(Debug, Clone, Deserialize)]
pub struct TokenExchangeResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: i64,
    pub athlete: StravaAthlete,
}

/// Athlete info from OAuth token exchange.
#[derive(Debug, Clone, Deserialize)]
pub struct StravaAthlete {
    pub id: u64,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub firstname: Option<String>,
    #[serde(default)]
    pub lastname: Option<String>,
}

impl StravaAthlete {
    /// Leaderboard name: the Strava username, else "first last", else the id.
    pub fn display_name(&self) -> String {
        if let Some(username) = self.username.as_deref().filter(|u| !u.trim().is_empty()) {
            return username.to_string();
        }

        let full_name = [self.firstname.as_deref(), self.lastname.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" ");

        if full_name.is_empty() {
            self.id.to_string()
        } else {
            full_name
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn athlete(username: Option<&str>, first: Option<&str>, last: Option<&str>) -> StravaAthlete {
        StravaAthlete {
            id: 99,
            username: username.map(String::from),
            firstname: first.map(String::from),
            lastname: last.map(String::from),
        }
    }

    #[test]
    fn test_display_name_fallbacks() {
        assert_eq!(athlete(Some("climber"), Some("A"), None).display_name(), "climber");
        assert_eq!(athlete(None, Some("Ann"), Some("Lee")).display_name(), "Ann Lee");
        assert_eq!(athlete(Some("  "), Some("Ann"), None).display_name(), "Ann");
        assert_eq!(athlete(None, None, None).display_name(), "99");
    }

    #[test]
    fn test_authorize_url() {
        let url = authorize_url("123", "https://api.example.com/exchange_token", "read,activity:read_all");

        assert!(url.starts_with("https://www.strava.com/oauth/authorize?"));
        assert!(url.contains("client_id=123&"));
        assert!(url.contains("redirect_uri=https%3A%2F%2Fapi.example.com%2Fexchange_token&"));
        assert!(url.contains("response_type=code&"));
        assert!(url.ends_with("scope=read,activity:read_all"));
    }
}
