// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Strava Leaderboard API Server
//!
//! Links Strava accounts, syncs their activity totals once a day, and
//! serves a leaderboard.

use std::sync::Arc;
use std::time::Duration;
use strava_leaderboard::{
    config::Config,
    db,
    services::{
        SchedulerSettings, SharedStravaApi, StatsFetcher, StravaClient, SyncScheduler,
        TokenService,
    },
    AppState,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging
    init_logging();

    // Load configuration from environment
    let config = Config::from_env().expect("Failed to load configuration");
    tracing::info!(port = config.port, "Starting Strava leaderboard API");

    let store = db::connect(&config)
        .await
        .expect("Failed to connect to store");

    let strava: SharedStravaApi = Arc::new(
        StravaClient::new(
            config.client_id.clone(),
            config.client_secret.clone(),
            Duration::from_secs(config.http_timeout_secs),
        )
        .expect("Failed to initialize Strava client"),
    );

    // One token service (and so one set of refresh locks) shared by the
    // request handlers and the sync workers.
    let token_service = TokenService::new(strava.clone(), store.clone());
    let fetcher = StatsFetcher::new(token_service.clone(), strava, store.clone());

    let scheduler = SyncScheduler::new(
        store.clone(),
        fetcher,
        SchedulerSettings::from_config(&config),
    )
    .start();

    // Build shared state
    let state = Arc::new(AppState {
        config: config.clone(),
        db: store,
        token_service,
        sync_status: scheduler.subscribe(),
    });

    // Build router
    let app = strava_leaderboard::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    scheduler.shutdown();
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

/// Initialize structured JSON logging.
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("strava_leaderboard=debug".parse().unwrap())
                .add_directive("info".parse().unwrap()),
        )
        .with(format)
        .init();
}
