// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Per-user cache of computed permission structures.
//!
//! Entries are immutable [`PermissionInfo`] values behind an `Arc`, so readers
//! holding an old entry are unaffected by a refresh. A failed refresh leaves
//! the previous entry in place and [`PermissionCache::last_known`] keeps
//! serving it.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use keel_rbac_core::{AccountId, PermissionInfo, UserId};
use keel_server_config::RbacConfig;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
	account_id: AccountId,
	user_id: UserId,
}

impl CacheKey {
	fn new(account_id: &AccountId, user_id: &UserId) -> Self {
		Self {
			account_id: account_id.clone(),
			user_id: user_id.clone(),
		}
	}
}

#[derive(Debug, Clone)]
struct CachedPermissions {
	info: Arc<PermissionInfo>,
	computed_at: Instant,
}

#[derive(Debug)]
pub struct PermissionCache {
	ttl: Option<Duration>,
	entries: RwLock<HashMap<CacheKey, CachedPermissions>>,
}

impl PermissionCache {
	/// `ttl` of `None` keeps entries until invalidated.
	pub fn new(ttl: Option<Duration>) -> Self {
		Self {
			ttl,
			entries: RwLock::new(HashMap::new()),
		}
	}

	pub fn from_config(config: &RbacConfig) -> Self {
		Self::new(config.cache_ttl())
	}

	fn is_fresh(&self, entry: &CachedPermissions) -> bool {
		self.ttl.map_or(true, |ttl| entry.computed_at.elapsed() < ttl)
	}

	/// A fresh entry, if any.
	pub async fn get(&self, account_id: &AccountId, user_id: &UserId) -> Option<Arc<PermissionInfo>> {
		let entries = self.entries.read().await;
		entries
			.get(&CacheKey::new(account_id, user_id))
			.filter(|entry| self.is_fresh(entry))
			.map(|entry| Arc::clone(&entry.info))
	}

	/// The most recent entry regardless of age.
	pub async fn last_known(&self, account_id: &AccountId, user_id: &UserId) -> Option<Arc<PermissionInfo>> {
		let entries = self.entries.read().await;
		entries
			.get(&CacheKey::new(account_id, user_id))
			.map(|entry| Arc::clone(&entry.info))
	}

	pub async fn insert(&self, user_id: &UserId, info: PermissionInfo) -> Arc<PermissionInfo> {
		let key = CacheKey::new(&info.account_id, user_id);
		let info = Arc::new(info);
		let mut entries = self.entries.write().await;
		entries.insert(
			key,
			CachedPermissions {
				info: Arc::clone(&info),
				computed_at: Instant::now(),
			},
		);
		info
	}

	/// Run `compute` and replace the entry with its result. On error the
	/// previous entry is kept and the error returned.
	pub async fn refresh<Fut>(&self, account_id: &AccountId, user_id: &UserId, compute: Fut) -> Result<Arc<PermissionInfo>>
	where
		Fut: Future<Output = Result<PermissionInfo>>,
	{
		match compute.await {
			Ok(info) => {
				debug!(%account_id, %user_id, "refreshed cached permissions");
				Ok(self.insert(user_id, info).await)
			}
			Err(e) => {
				warn!(%account_id, %user_id, error = %e, "permission refresh failed, keeping previous entry");
				Err(e)
			}
		}
	}

	/// Serve a fresh entry, or compute and cache one.
	pub async fn get_or_compute<F, Fut>(
		&self,
		account_id: &AccountId,
		user_id: &UserId,
		compute: F,
	) -> Result<Arc<PermissionInfo>>
	where
		F: FnOnce() -> Fut,
		Fut: Future<Output = Result<PermissionInfo>>,
	{
		if let Some(info) = self.get(account_id, user_id).await {
			return Ok(info);
		}
		self.refresh(account_id, user_id, compute()).await
	}

	pub async fn invalidate_user(&self, account_id: &AccountId, user_id: &UserId) -> bool {
		let mut entries = self.entries.write().await;
		entries.remove(&CacheKey::new(account_id, user_id)).is_some()
	}

	/// Drop every entry of an account, e.g. after its groups or entities
	/// change. Returns the number of entries removed.
	pub async fn invalidate_account(&self, account_id: &AccountId) -> usize {
		let mut entries = self.entries.write().await;
		let before = entries.len();
		entries.retain(|key, _| &key.account_id != account_id);
		let removed = before - entries.len();
		debug!(%account_id, removed, "invalidated account permissions");
		removed
	}

	pub async fn len(&self) -> usize {
		self.entries.read().await.len()
	}

	pub async fn is_empty(&self) -> bool {
		self.entries.read().await.is_empty()
	}
}
