// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! In-memory [`EntityStore`] for tests and embedded deployments.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use keel_rbac_core::{AppId, Entity, EntityKind};
use tokio::sync::RwLock;

use crate::store::{EntityRecord, EntityStore, Page, PageRequest, StoreError};

#[derive(Debug, Default)]
pub struct InMemoryEntityStore {
	records: RwLock<Vec<EntityRecord>>,
	failures: Mutex<HashMap<EntityKind, StoreError>>,
	calls: AtomicUsize,
}

impl InMemoryEntityStore {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_records(records: Vec<EntityRecord>) -> Self {
		Self {
			records: RwLock::new(records),
			..Self::default()
		}
	}

	pub async fn insert(&self, app_id: impl Into<AppId>, entity: Entity) {
		self.records.write().await.push(EntityRecord::new(app_id, entity));
	}

	fn failures(&self) -> MutexGuard<'_, HashMap<EntityKind, StoreError>> {
		self.failures.lock().unwrap_or_else(PoisonError::into_inner)
	}

	/// Make every query for `kind` fail with `error` until cleared.
	pub fn fail_kind(&self, kind: EntityKind, error: StoreError) {
		self.failures().insert(kind, error);
	}

	pub fn clear_failures(&self) {
		self.failures().clear();
	}

	/// Number of page queries served, failed ones included.
	pub fn call_count(&self) -> usize {
		self.calls.load(Ordering::SeqCst)
	}
}

#[async_trait]
impl EntityStore for InMemoryEntityStore {
	async fn list_entities(
		&self,
		kind: EntityKind,
		app_ids: &BTreeSet<AppId>,
		page: PageRequest,
	) -> Result<Page, StoreError> {
		self.calls.fetch_add(1, Ordering::SeqCst);
		let injected = self.failures().get(&kind).cloned();
		if let Some(error) = injected {
			return Err(error);
		}

		let records = self.records.read().await;
		let matching: Vec<&EntityRecord> = records
			.iter()
			.filter(|r| r.entity.kind() == kind && app_ids.contains(&r.app_id))
			.collect();
		Ok(Page {
			total: matching.len(),
			items: matching
				.into_iter()
				.skip(page.offset)
				.take(page.limit)
				.cloned()
				.collect(),
		})
	}
}
