// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Per-account feature flag lookup deciding whether RBAC is enforced.

use std::collections::HashMap;

use async_trait::async_trait;
use keel_rbac_core::AccountId;

#[async_trait]
pub trait FeatureFlagSource: Send + Sync {
	/// The flag's value for `account_id`, or `None` when the source has no
	/// opinion.
	async fn is_feature_enabled(&self, flag: &str, account_id: &AccountId) -> Option<bool>;
}

/// Flags fixed at construction, per account or for every account.
#[derive(Debug, Clone, Default)]
pub struct StaticFeatureFlags {
	per_account: HashMap<(String, AccountId), bool>,
	global: HashMap<String, bool>,
}

impl StaticFeatureFlags {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_global(mut self, flag: impl Into<String>, enabled: bool) -> Self {
		self.global.insert(flag.into(), enabled);
		self
	}

	pub fn with_account(mut self, flag: impl Into<String>, account_id: impl Into<AccountId>, enabled: bool) -> Self {
		self.per_account.insert((flag.into(), account_id.into()), enabled);
		self
	}
}

#[async_trait]
impl FeatureFlagSource for StaticFeatureFlags {
	async fn is_feature_enabled(&self, flag: &str, account_id: &AccountId) -> Option<bool> {
		self.per_account
			.get(&(flag.to_string(), account_id.clone()))
			.or_else(|| self.global.get(flag))
			.copied()
	}
}
