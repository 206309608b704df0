// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore store tests. Require the emulator (FIRESTORE_EMULATOR_HOST).

use strava_leaderboard::db::{FirestoreDb, Store};
use strava_leaderboard::models::{ActivityKind, ActivityTotals, ElevationTotals, UserRecord};

mod common;
use common::test_db;

fn user(id: u64, access_token: &str) -> UserRecord {
    UserRecord {
        id,
        username: format!("athlete{}", id),
        access_token: access_token.to_string(),
        refresh_token: format!("refresh-{}", id),
        expires_at: 4_102_444_800,
    }
}

#[tokio::test]
async fn test_user_upsert_replaces_by_id() {
    require_emulator!();
    let db = test_db().await;
    let id = 910_000_001;

    db.upsert_user(&user(id, "first")).await.unwrap();
    db.upsert_user(&user(id, "second")).await.unwrap();

    let stored = db.get_user(id).await.unwrap().expect("user stored");
    assert_eq!(stored.access_token, "second");

    let matching = db
        .list_users()
        .await
        .unwrap()
        .into_iter()
        .filter(|u| u.id == id)
        .count();
    assert_eq!(matching, 1);
}

#[tokio::test]
async fn test_missing_user_is_none() {
    require_emulator!();
    let db = test_db().await;

    assert!(db.get_user(910_999_999).await.unwrap().is_none());
}

#[tokio::test]
async fn test_totals_are_keyed_by_kind() {
    require_emulator!();
    let db = test_db().await;
    let id = 910_000_002;

    let totals = ElevationTotals {
        id,
        month_dist: 1.0,
        month_elevation: 2.0,
        year_dist: 3.0,
        year_elevation: 4.0,
        all_dist: 5.0,
        all_elevation: 6.0,
    };
    db.upsert_totals(&ActivityTotals::Ride(totals.clone()))
        .await
        .unwrap();

    assert_eq!(
        db.get_totals(ActivityKind::Ride, id).await.unwrap(),
        Some(ActivityTotals::Ride(totals))
    );
    assert_eq!(db.get_totals(ActivityKind::Run, id).await.unwrap(), None);

    let rides = db.list_totals(ActivityKind::Ride).await.unwrap();
    assert!(rides.iter().any(|t| t.id() == id));
}

#[tokio::test]
async fn test_offline_client_reports_database_error() {
    let db = FirestoreDb::new_mock();

    assert!(matches!(
        db.get_user(1).await,
        Err(strava_leaderboard::error::AppError::Database(_))
    ));
}
