// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-process store for tests and local development.
//!
//! Records keep the position of their first insert, so enumeration order is
//! stable (first-seen) across upserts.

use crate::db::Store;
use crate::error::AppError;
use crate::models::{ActivityKind, ActivityTotals, UserRecord, UserSummary};
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};

struct Slot<T> {
    seq: u64,
    value: T,
}

/// `DashMap`-backed store.
#[derive(Default)]
pub struct MemoryStore {
    next_seq: AtomicU64,
    users: DashMap<u64, Slot<UserRecord>>,
    totals: DashMap<(ActivityKind, u64), Slot<ActivityTotals>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn upsert<K, T>(&self, map: &DashMap<K, Slot<T>>, key: K, value: T)
    where
        K: std::hash::Hash + Eq,
    {
        match map.entry(key) {
            Entry::Occupied(mut entry) => entry.get_mut().value = value,
            Entry::Vacant(entry) => {
                entry.insert(Slot {
                    seq: self.next_seq.fetch_add(1, Ordering::Relaxed),
                    value,
                });
            }
        }
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get_user(&self, id: u64) -> Result<Option<UserRecord>, AppError> {
        Ok(self.users.get(&id).map(|slot| slot.value.clone()))
    }

    async fn upsert_user(&self, user: &UserRecord) -> Result<(), AppError> {
        self.upsert(&self.users, user.id, user.clone());
        Ok(())
    }

    async fn list_users(&self) -> Result<Vec<UserSummary>, AppError> {
        let mut users: Vec<(u64, UserSummary)> = self
            .users
            .iter()
            .map(|slot| (slot.seq, UserSummary::from(&slot.value)))
            .collect();
        users.sort_by_key(|(seq, _)| *seq);
        Ok(users.into_iter().map(|(_, user)| user).collect())
    }

    async fn get_totals(
        &self,
        kind: ActivityKind,
        id: u64,
    ) -> Result<Option<ActivityTotals>, AppError> {
        Ok(self.totals.get(&(kind, id)).map(|slot| slot.value.clone()))
    }

    async fn upsert_totals(&self, totals: &ActivityTotals) -> Result<(), AppError> {
        self.upsert(&self.totals, (totals.kind(), totals.id()), totals.clone());
        Ok(())
    }

    async fn list_totals(&self, kind: ActivityKind) -> Result<Vec<ActivityTotals>, AppError> {
        let mut totals: Vec<(u64, ActivityTotals)> = self
            .totals
            .iter()
            .filter(|slot| slot.key().0 == kind)
            .map(|slot| (slot.seq, slot.value.clone()))
            .collect();
        totals.sort_by_key(|(seq, _)| *seq);
        Ok(totals.into_iter().map(|(_, t)| t).collect())
    }
}
