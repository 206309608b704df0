// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore client wrapper with typed operations.
//!
//! One collection per table, document ID = Strava athlete ID:
//! - `USERS` (token records)
//! - `RIDES`, `RUNS`, `SWIMS` (activity totals)

use crate::db::{collections, Store};
use crate::error::AppError;
use crate::models::{
    ActivityKind, ActivityTotals, ElevationTotals, SwimTotals, UserRecord, UserSummary,
};
use async_trait::async_trait;

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: Option<firestore::FirestoreDb>,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        // If the emulator environment variable is set, use unauthenticated connection
        // to avoid local credential warnings and leakage.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(project = project_id, "Connected to Firestore emulator");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create an offline client; every operation returns a database error.
    pub fn new_mock() -> Self {
        Self { client: None }
    }

    /// Helper to get the client or return an error if offline.
    fn get_client(&self) -> Result<&firestore::FirestoreDb, AppError> {
        self.client
            .as_ref()
            .ok_or_else(|| AppError::Database("Database not connected (offline mode)".to_string()))
    }

    async fn get_doc<T>(&self, collection: &str, id: u64) -> Result<Option<T>, AppError>
    where
        T: for<'de> serde::Deserialize<'de> + Send,
    {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collection)
            .obj()
            .one(&id.to_string())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn set_doc<T>(&self, collection: &str, id: u64, doc: &T) -> Result<(), AppError>
    where
        T: serde::Serialize + for<'de> serde::Deserialize<'de> + Send + Sync,
    {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collection)
            .document_id(id.to_string())
            .object(doc)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    async fn list_docs<T>(&self, collection: &str) -> Result<Vec<T>, AppError>
    where
        T: for<'de> serde::Deserialize<'de> + Send,
    {
        self.get_client()?
            .fluent()
            .select()
            .from(collection)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}

#[async_trait]
impl Store for FirestoreDb {
    // ─── User Operations ─────────────────────────────────────────

    async fn get_user(&self, id: u64) -> Result<Option<UserRecord>, AppError> {
        self.get_doc(collections::USERS, id).await
    }

    async fn upsert_user(&self, user: &UserRecord) -> Result<(), AppError> {
        self.set_doc(collections::USERS, user.id, user).await
    }

    async fn list_users(&self) -> Result<Vec<UserSummary>, AppError> {
        let users: Vec<UserRecord> = self.list_docs(collections::USERS).await?;
        Ok(users.iter().map(UserSummary::from).collect())
    }

    // ─── Totals Operations ───────────────────────────────────────

    async fn get_totals(
        &self,
        kind: ActivityKind,
        id: u64,
    ) -> Result<Option<ActivityTotals>, AppError> {
        let collection = kind.collection();
        Ok(match kind {
            ActivityKind::Ride => self
                .get_doc::<ElevationTotals>(collection, id)
                .await?
                .map(ActivityTotals::Ride),
            ActivityKind::Run => self
                .get_doc::<ElevationTotals>(collection, id)
                .await?
                .map(ActivityTotals::Run),
            ActivityKind::Swim => self
                .get_doc::<SwimTotals>(collection, id)
                .await?
                .map(ActivityTotals::Swim),
        })
    }

    async fn upsert_totals(&self, totals: &ActivityTotals) -> Result<(), AppError> {
        let collection = totals.kind().collection();
        match totals {
            ActivityTotals::Ride(t) | ActivityTotals::Run(t) => {
                self.set_doc(collection, t.id, t).await
            }
            ActivityTotals::Swim(t) => self.set_doc(collection, t.id, t).await,
        }
    }

    async fn list_totals(&self, kind: ActivityKind) -> Result<Vec<ActivityTotals>, AppError> {
        let collection = kind.collection();
        Ok(match kind {
            ActivityKind::Ride => self
                .list_docs::<ElevationTotals>(collection)
                .await?
                .into_iter()
                .map(ActivityTotals::Ride)
                .collect(),
            ActivityKind::Run => self
                .list_docs::<ElevationTotals>(collection)
                .await?
                .into_iter()
                .map(ActivityTotals::Run)
                .collect(),
            ActivityKind::Swim => self
                .list_docs::<SwimTotals>(collection)
                .await?
                .into_iter()
                .map(ActivityTotals::Swim)
                .collect(),
        })
    }
}
