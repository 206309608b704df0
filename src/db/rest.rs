// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! PostgREST (Supabase-style) row store.
//!
//! Tables are addressed as `{base}/rest/v1/{TABLE}`; upserts are a POST with
//! `on_conflict=id` and `Prefer: resolution=merge-duplicates`. Full-table
//! reads are ordered by `id` and paged with `limit`/`offset`, since PostgREST
//! caps each response at its `max-rows` setting (1000 on Supabase).

use crate::db::{collections, Store};
use crate::error::AppError;
use crate::models::{ActivityKind, ActivityTotals, UserRecord, UserSummary};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;

/// Rows requested per page on full-table reads. Must not exceed the server's
/// `max-rows`, or a capped page would look like the last one.
pub const DEFAULT_PAGE_SIZE: usize = 1000;

/// REST row store client.
#[derive(Clone)]
pub struct RestStore {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    page_size: usize,
}

impl RestStore {
    /// Create a client for the project at `base_url` (e.g. `https://xyz.supabase.co`).
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Database(format!("Failed to build HTTP client: {}", e)))?;

        tracing::info!(url = base_url, "Using REST store");

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
        })
    }

    /// Override the page size used by full-table reads.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn request(&self, method: reqwest::Method, table: &str) -> reqwest::RequestBuilder {
        self.http
            .request(method, self.table_url(table))
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }

    /// `SELECT {columns} FROM table WHERE id = ?`.
    async fn select<T: DeserializeOwned>(
        &self,
        table: &str,
        columns: &str,
        id: u64,
    ) -> Result<Vec<T>, AppError> {
        let query = [("select", columns.to_string()), ("id", format!("eq.{}", id))];
        self.fetch_rows(table, &query).await
    }

    /// Every row of `table`, in id order, one page at a time.
    async fn select_all<T: DeserializeOwned>(
        &self,
        table: &str,
        columns: &str,
    ) -> Result<Vec<T>, AppError> {
        let mut rows: Vec<T> = Vec::new();
        loop {
            let query = [
                ("select", columns.to_string()),
                ("order", "id".to_string()),
                ("limit", self.page_size.to_string()),
                ("offset", rows.len().to_string()),
            ];
            let page: Vec<T> = self.fetch_rows(table, &query).await?;
            let last = page.len() < self.page_size;
            rows.extend(page);
            if last {
                return Ok(rows);
            }
        }
    }

    async fn fetch_rows<T: DeserializeOwned>(
        &self,
        table: &str,
        query: &[(&str, String)],
    ) -> Result<Vec<T>, AppError> {
        let response = self
            .request(reqwest::Method::GET, table)
            .query(query)
            .send()
            .await
            .map_err(|e| AppError::Database(format!("{} select failed: {}", table, e)))?;

        let response = check_response(table, response).await?;
        response
            .json()
            .await
            .map_err(|e| AppError::Database(format!("{} returned invalid rows: {}", table, e)))
    }

    async fn upsert_row<T: Serialize>(&self, table: &str, row: &T) -> Result<(), AppError> {
        let response = self
            .request(reqwest::Method::POST, table)
            .query(&[("on_conflict", "id")])
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(&[row])
            .send()
            .await
            .map_err(|e| AppError::Database(format!("{} upsert failed: {}", table, e)))?;

        check_response(table, response).await?;
        Ok(())
    }
}

async fn check_response(
    table: &str,
    response: reqwest::Response,
) -> Result<reqwest::Response, AppError> {
    if response.status().is_success() {
        return Ok(response);
    }

    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    Err(AppError::Database(format!(
        "{} request failed with HTTP {}: {}",
        table, status, body
    )))
}

#[async_trait]
impl Store for RestStore {
    async fn get_user(&self, id: u64) -> Result<Option<UserRecord>, AppError> {
        let rows: Vec<UserRecord> = self.select(collections::USERS, "*", id).await?;
        Ok(rows.into_iter().next())
    }

    async fn upsert_user(&self, user: &UserRecord) -> Result<(), AppError> {
        self.upsert_row(collections::USERS, user).await
    }

    async fn list_users(&self) -> Result<Vec<UserSummary>, AppError> {
        self.select_all(collections::USERS, "id,username").await
    }

    async fn get_totals(
        &self,
        kind: ActivityKind,
        id: u64,
    ) -> Result<Option<ActivityTotals>, AppError> {
        let rows: Vec<serde_json::Value> = self.select(kind.collection(), "*", id).await?;
        rows.into_iter()
            .next()
            .map(|row| decode_totals(kind, row))
            .transpose()
    }

    async fn upsert_totals(&self, totals: &ActivityTotals) -> Result<(), AppError> {
        self.upsert_row(totals.kind().collection(), totals).await
    }

    async fn list_totals(&self, kind: ActivityKind) -> Result<Vec<ActivityTotals>, AppError> {
        let rows: Vec<serde_json::Value> = self.select_all(kind.collection(), "*").await?;
        rows.into_iter().map(|row| decode_totals(kind, row)).collect()
    }
}

fn decode_totals(kind: ActivityKind, row: serde_json::Value) -> Result<ActivityTotals, AppError> {
    ActivityTotals::from_value(kind, row).map_err(|e| {
        AppError::Database(format!("{} returned invalid row: {}", kind.collection(), e))
    })
}
