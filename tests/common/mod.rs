// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use strava_leaderboard::config::Config;
use strava_leaderboard::db::{FirestoreDb, MemoryStore, SharedStore, Store};
use strava_leaderboard::error::AppError;
use strava_leaderboard::models::{
    ActivityKind, ActivityTotals, AthleteStats, ElevationTotals, SwimTotals, UserRecord,
    UserSummary,
};
use strava_leaderboard::routes::create_router;
use strava_leaderboard::services::strava::{
    StravaAthlete, TokenExchangeResponse, TokenRefreshResponse,
};
use strava_leaderboard::services::{
    SharedStravaApi, StatsFetcher, StravaApi, TokenService,
};
use strava_leaderboard::time_utils::now_epoch_secs;
use strava_leaderboard::AppState;

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test database connection.
#[allow(dead_code)]
pub async fn test_db() -> FirestoreDb {
    FirestoreDb::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

// ─── Scripted Strava ─────────────────────────────────────────────

/// How [`FakeStrava::refresh_token`] answers.
#[allow(dead_code)]
#[derive(Debug, Clone, Copy)]
pub enum RefreshBehavior {
    /// New pair valid for `expires_in` seconds.
    Grant { expires_in: i64 },
    /// 401 from Strava.
    Reject,
    /// Success status, but the new token is already expired.
    ExpiredGrant,
}

/// In-process stand-in for Strava with call counters.
///
/// Refreshes hand out `access-N` / `refresh-N` where N counts refresh calls.
#[allow(dead_code)]
pub struct FakeStrava {
    pub exchange_calls: AtomicUsize,
    pub refresh_calls: AtomicUsize,
    pub stats_calls: AtomicUsize,
    refresh: Mutex<RefreshBehavior>,
    refresh_delay: Mutex<Duration>,
    failing_stats: Mutex<HashSet<u64>>,
    malformed_stats: Mutex<HashSet<u64>>,
    panicking_stats: Mutex<HashSet<u64>>,
    slow_stats: Mutex<HashMap<u64, Duration>>,
    stats_calls_by_athlete: Mutex<HashMap<u64, usize>>,
    /// Access tokens seen by the stats endpoint, in call order.
    pub seen_access_tokens: Mutex<Vec<String>>,
}

#[allow(dead_code)]
impl FakeStrava {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            exchange_calls: AtomicUsize::new(0),
            refresh_calls: AtomicUsize::new(0),
            stats_calls: AtomicUsize::new(0),
            refresh: Mutex::new(RefreshBehavior::Grant { expires_in: 21600 }),
            refresh_delay: Mutex::new(Duration::ZERO),
            failing_stats: Mutex::new(HashSet::new()),
            malformed_stats: Mutex::new(HashSet::new()),
            panicking_stats: Mutex::new(HashSet::new()),
            slow_stats: Mutex::new(HashMap::new()),
            stats_calls_by_athlete: Mutex::new(HashMap::new()),
            seen_access_tokens: Mutex::new(Vec::new()),
        })
    }

    pub fn set_refresh(&self, behavior: RefreshBehavior) {
        *self.refresh.lock().unwrap() = behavior;
    }

    pub fn set_refresh_delay(&self, delay: Duration) {
        *self.refresh_delay.lock().unwrap() = delay;
    }

    /// Stats for `athlete_id` answer HTTP 500.
    pub fn fail_stats_for(&self, athlete_id: u64) {
        self.failing_stats.lock().unwrap().insert(athlete_id);
    }

    /// Stats for `athlete_id` come back without `all_run_totals`.
    pub fn malformed_stats_for(&self, athlete_id: u64) {
        self.malformed_stats.lock().unwrap().insert(athlete_id);
    }

    /// Fetching stats for `athlete_id` panics.
    pub fn panic_stats_for(&self, athlete_id: u64) {
        self.panicking_stats.lock().unwrap().insert(athlete_id);
    }

    /// Stats for `athlete_id` take `delay` to come back.
    pub fn slow_stats_for(&self, athlete_id: u64, delay: Duration) {
        self.slow_stats.lock().unwrap().insert(athlete_id, delay);
    }

    /// Stats calls made for one athlete.
    pub fn stats_count_for(&self, athlete_id: u64) -> usize {
        self.stats_calls_by_athlete
            .lock()
            .unwrap()
            .get(&athlete_id)
            .copied()
            .unwrap_or_default()
    }

    pub fn refresh_count(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn stats_count(&self) -> usize {
        self.stats_calls.load(Ordering::SeqCst)
    }

    pub fn exchange_count(&self) -> usize {
        self.exchange_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StravaApi for FakeStrava {
    async fn exchange_code(&self, code: &str) -> Result<TokenExchangeResponse, AppError> {
        self.exchange_calls.fetch_add(1, Ordering::SeqCst);
        if code == "bad" {
            return Err(AppError::StravaApi(
                "HTTP 400 Bad Request: invalid code".to_string(),
            ));
        }

        Ok(TokenExchangeResponse {
            access_token: format!("exchanged-access-{}", code),
            refresh_token: format!("exchanged-refresh-{}", code),
            expires_at: now_epoch_secs() + 21600,
            athlete: StravaAthlete {
                id: 777,
                username: Some("tester".to_string()),
                firstname: Some("Test".to_string()),
                lastname: Some("Er".to_string()),
            },
        })
    }

    async fn refresh_token(&self, _refresh_token: &str) -> Result<TokenRefreshResponse, AppError> {
        let n = self.refresh_calls.fetch_add(1, Ordering::SeqCst) + 1;

        let delay = *self.refresh_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let behavior = *self.refresh.lock().unwrap();
        match behavior {
            RefreshBehavior::Grant { expires_in } => Ok(TokenRefreshResponse {
                access_token: format!("access-{}", n),
                refresh_token: format!("refresh-{}", n),
                expires_at: now_epoch_secs() + expires_in,
            }),
            RefreshBehavior::Reject => Err(AppError::StravaApi(
                AppError::STRAVA_TOKEN_ERROR.to_string(),
            )),
            RefreshBehavior::ExpiredGrant => Ok(TokenRefreshResponse {
                access_token: format!("access-{}", n),
                refresh_token: format!("refresh-{}", n),
                expires_at: now_epoch_secs() - 60,
            }),
        }
    }

    async fn get_athlete_stats(
        &self,
        access_token: &str,
        athlete_id: u64,
    ) -> Result<AthleteStats, AppError> {
        self.stats_calls.fetch_add(1, Ordering::SeqCst);
        self.seen_access_tokens
            .lock()
            .unwrap()
            .push(access_token.to_string());
        *self
            .stats_calls_by_athlete
            .lock()
            .unwrap()
            .entry(athlete_id)
            .or_default() += 1;

        let delay = self.slow_stats.lock().unwrap().get(&athlete_id).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.panicking_stats.lock().unwrap().contains(&athlete_id) {
            panic!("scripted panic for athlete {}", athlete_id);
        }
        if self.failing_stats.lock().unwrap().contains(&athlete_id) {
            return Err(AppError::StravaApi(
                "HTTP 500 Internal Server Error: boom".to_string(),
            ));
        }

        let mut payload = stats_payload(athlete_id as f64);
        if self.malformed_stats.lock().unwrap().contains(&athlete_id) {
            payload
                .as_object_mut()
                .unwrap()
                .remove("all_run_totals");
        }

        serde_json::from_value(payload).map_err(|e| AppError::MalformedResponse(e.to_string()))
    }
}

/// Strava-shaped stats body whose numbers are derived from `base`.
#[allow(dead_code)]
pub fn stats_payload(base: f64) -> serde_json::Value {
    let group = |scale: f64, elevation: bool| {
        let mut totals = serde_json::json!({
            "count": 3,
            "distance": base * scale,
            "moving_time": 3600,
            "elapsed_time": 4000,
        });
        if elevation {
            totals["elevation_gain"] = serde_json::json!(base * scale / 10.0);
        }
        totals
    };

    serde_json::json!({
        "biggest_ride_distance": 1000.0,
        "recent_ride_totals": group(1.0, true),
        "ytd_ride_totals": group(10.0, true),
        "all_ride_totals": group(100.0, true),
        "recent_run_totals": group(2.0, true),
        "ytd_run_totals": group(20.0, true),
        "all_run_totals": group(200.0, true),
        "recent_swim_totals": group(3.0, false),
        "ytd_swim_totals": group(30.0, false),
        "all_swim_totals": group(300.0, false),
    })
}

// ─── Store helpers ───────────────────────────────────────────────

/// Insert a user whose access token expires at `expires_at`.
#[allow(dead_code)]
pub async fn seed_user(store: &dyn Store, id: u64, username: &str, expires_at: i64) -> UserRecord {
    let user = UserRecord {
        id,
        username: username.to_string(),
        access_token: format!("stored-access-{}", id),
        refresh_token: format!("stored-refresh-{}", id),
        expires_at,
    };
    store.upsert_user(&user).await.unwrap();
    user
}

/// Insert all three totals records; every window gets the same distance
/// (meters) and elevation is zero.
#[allow(dead_code)]
pub async fn seed_totals(store: &dyn Store, id: u64, ride: f64, run: f64, swim: f64) {
    seed_month_totals(store, id, (run, 0.0), (ride, 0.0), swim).await;
}

/// Insert all three totals records from recent-window `(distance, elevation)`
/// pairs; the year and all-time windows repeat the recent distance.
#[allow(dead_code)]
pub async fn seed_month_totals(
    store: &dyn Store,
    id: u64,
    run: (f64, f64),
    ride: (f64, f64),
    swim: f64,
) {
    let elevation = |(dist, elev): (f64, f64)| ElevationTotals {
        id,
        month_dist: dist,
        month_elevation: elev,
        year_dist: dist,
        year_elevation: elev,
        all_dist: dist,
        all_elevation: elev,
    };

    store
        .upsert_totals(&ActivityTotals::Ride(elevation(ride)))
        .await
        .unwrap();
    store
        .upsert_totals(&ActivityTotals::Run(elevation(run)))
        .await
        .unwrap();
    store
        .upsert_totals(&ActivityTotals::Swim(SwimTotals {
            id,
            month_dist: swim,
            year_dist: swim,
            all_dist: swim,
        }))
        .await
        .unwrap();
}

/// Wraps a [`MemoryStore`] and fails selected operations.
#[allow(dead_code)]
pub struct FlakyStore {
    pub inner: MemoryStore,
    failing_kinds: Mutex<HashSet<ActivityKind>>,
    fail_list_users: Mutex<bool>,
    listing: Mutex<Option<Vec<u64>>>,
}

#[allow(dead_code)]
impl FlakyStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: MemoryStore::new(),
            failing_kinds: Mutex::new(HashSet::new()),
            fail_list_users: Mutex::new(false),
            listing: Mutex::new(None),
        })
    }

    pub fn fail_writes_for(&self, kind: ActivityKind) {
        self.failing_kinds.lock().unwrap().insert(kind);
    }

    pub fn set_fail_list_users(&self, fail: bool) {
        *self.fail_list_users.lock().unwrap() = fail;
    }

    /// Make `list_users` return exactly these ids, repeats included.
    pub fn set_listing(&self, ids: Vec<u64>) {
        *self.listing.lock().unwrap() = Some(ids);
    }
}

#[async_trait]
impl Store for FlakyStore {
    async fn get_user(&self, id: u64) -> Result<Option<UserRecord>, AppError> {
        self.inner.get_user(id).await
    }

    async fn upsert_user(&self, user: &UserRecord) -> Result<(), AppError> {
        self.inner.upsert_user(user).await
    }

    async fn list_users(&self) -> Result<Vec<UserSummary>, AppError> {
        if *self.fail_list_users.lock().unwrap() {
            return Err(AppError::Database("USERS unavailable".to_string()));
        }
        let listing = self.listing.lock().unwrap().clone();
        if let Some(ids) = listing {
            return Ok(ids
                .into_iter()
                .map(|id| UserSummary {
                    id,
                    username: format!("user{}", id),
                })
                .collect());
        }
        self.inner.list_users().await
    }

    async fn get_totals(
        &self,
        kind: ActivityKind,
        id: u64,
    ) -> Result<Option<ActivityTotals>, AppError> {
        self.inner.get_totals(kind, id).await
    }

    async fn upsert_totals(&self, totals: &ActivityTotals) -> Result<(), AppError> {
        if self.failing_kinds.lock().unwrap().contains(&totals.kind()) {
            return Err(AppError::Database(format!(
                "{} write rejected",
                totals.kind().collection()
            )));
        }
        self.inner.upsert_totals(totals).await
    }

    async fn list_totals(&self, kind: ActivityKind) -> Result<Vec<ActivityTotals>, AppError> {
        self.inner.list_totals(kind).await
    }
}

// ─── Wiring ──────────────────────────────────────────────────────

/// Token service and fetcher over `store`, sharing one set of refresh locks.
#[allow(dead_code)]
pub fn services(strava: Arc<FakeStrava>, store: SharedStore) -> (TokenService, StatsFetcher) {
    let api: SharedStravaApi = strava;
    let tokens = TokenService::new(api.clone(), store.clone());
    let fetcher = StatsFetcher::new(tokens.clone(), api, store);
    (tokens, fetcher)
}

/// Create a test app over an in-memory store and a scripted Strava.
/// Returns the router and the shared state.
#[allow(dead_code)]
pub fn create_test_app(strava: Arc<FakeStrava>) -> (axum::Router, Arc<AppState>) {
    let config = Config::test_default();
    let store: SharedStore = Arc::new(MemoryStore::new());
    let (token_service, _) = services(strava, store.clone());

    // No scheduler in these tests; /health reports no cycle yet.
    let (_status_tx, sync_status) = tokio::sync::watch::channel(None);

    let state = Arc::new(AppState {
        config,
        db: store,
        token_service,
        sync_status,
    });

    (create_router(state.clone()), state)
}
