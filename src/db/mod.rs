//! Database layer.
//!
//! Every backend exposes the same upsert-by-id [`Store`] so services can be
//! handed any of them (or a test double).

pub mod firestore;
pub mod memory;
pub mod rest;

pub use firestore::FirestoreDb;
pub use memory::MemoryStore;
pub use rest::RestStore;

use crate::config::{Config, ConfigError};
use crate::error::AppError;
use crate::models::{ActivityKind, ActivityTotals, UserRecord, UserSummary};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Collection names as constants.
pub mod collections {
    pub const USERS: &str = "USERS";
    pub const RIDES: &str = "RIDES";
    pub const RUNS: &str = "RUNS";
    pub const SWIMS: &str = "SWIMS";
}

/// Shared store handle.
pub type SharedStore = Arc<dyn Store>;

/// Record store with insert-or-replace-by-id writes.
#[async_trait]
pub trait Store: Send + Sync {
    /// Get a user's token record.
    async fn get_user(&self, id: u64) -> Result<Option<UserRecord>, AppError>;

    /// Insert or replace a user's token record.
    async fn upsert_user(&self, user: &UserRecord) -> Result<(), AppError>;

    /// Snapshot of all known users, in the store's enumeration order.
    async fn list_users(&self) -> Result<Vec<UserSummary>, AppError>;

    /// Get one user's totals of the given kind.
    async fn get_totals(
        &self,
        kind: ActivityKind,
        id: u64,
    ) -> Result<Option<ActivityTotals>, AppError>;

    /// Insert or replace a totals record (the kind is taken from the record).
    async fn upsert_totals(&self, totals: &ActivityTotals) -> Result<(), AppError>;

    /// All totals records of the given kind.
    async fn list_totals(&self, kind: ActivityKind) -> Result<Vec<ActivityTotals>, AppError>;
}

/// Open the store named by `config.store_url`.
///
/// - `memory://` keeps everything in process
/// - `firestore://<project>` uses Firestore (honours `FIRESTORE_EMULATOR_HOST`)
/// - `http://` / `https://` talks to a PostgREST endpoint using `store_key`
pub async fn connect(config: &Config) -> Result<SharedStore, AppError> {
    let url = config.store_url.as_str();

    if url.starts_with("memory://") {
        tracing::warn!("Using in-memory store; data is lost on restart");
        return Ok(Arc::new(MemoryStore::new()));
    }

    if let Some(project_id) = url.strip_prefix("firestore://") {
        let db = FirestoreDb::new(project_id.trim_end_matches('/')).await?;
        return Ok(Arc::new(db));
    }

    if url.starts_with("http://") || url.starts_with("https://") {
        let key = config
            .store_key
            .clone()
            .ok_or_else(|| AppError::Internal(ConfigError::Missing("STORE_KEY").into()))?;
        let store = RestStore::new(url, &key, Duration::from_secs(config.http_timeout_secs))?;
        return Ok(Arc::new(store));
    }

    Err(AppError::Internal(
        ConfigError::UnsupportedStore(url.to_string()).into(),
    ))
}
