// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The async entry point hosts call to compute a user's permissions.

use std::collections::BTreeSet;
use std::time::Instant;

use keel_rbac_core::{
	collect_account_permissions, collect_required_app_ids, AccountId, AppId, PermissionAssembler, PermissionInfo,
	RbacError, UserGroup,
};
use keel_server_config::RbacConfig;
use tracing::{debug, info, instrument};

use crate::error::Result;
use crate::fetch::fetch_snapshot;
use crate::flags::FeatureFlagSource;
use crate::store::EntityStore;

pub struct AuthHandler<S, F> {
	store: S,
	flags: F,
	config: RbacConfig,
}

impl<S, F> AuthHandler<S, F>
where
	S: EntityStore,
	F: FeatureFlagSource,
{
	pub fn new(store: S, flags: F, config: RbacConfig) -> Self {
		Self { store, flags, config }
	}

	pub fn store(&self) -> &S {
		&self.store
	}

	/// Whether RBAC is enforced for the account, falling back to the configured
	/// default when the flag source has no answer.
	pub async fn is_rbac_enabled(&self, account_id: &AccountId) -> bool {
		match self
			.flags
			.is_feature_enabled(&self.config.enabled_flag, account_id)
			.await
		{
			Some(enabled) => enabled,
			None => {
				debug!(%account_id, flag = %self.config.enabled_flag, "no flag value, using default");
				self.config.default_enabled
			}
		}
	}

	/// Compute the permission structure for a user holding `user_groups`.
	///
	/// Any invalid filter or permission type in the groups fails the whole
	/// computation; no partial structure is returned.
	#[instrument(
		skip(self, account_id, user_groups, all_app_ids),
		fields(account_id = %account_id, groups = user_groups.len(), apps = all_app_ids.len())
	)]
	pub async fn compute_permissions(
		&self,
		account_id: &AccountId,
		user_groups: &[UserGroup],
		all_app_ids: &BTreeSet<AppId>,
	) -> Result<PermissionInfo> {
		if let Some(foreign) = user_groups.iter().find(|g| &g.account_id != account_id) {
			return Err(RbacError::InvalidRequest(format!(
				"group {} belongs to account {}",
				foreign.name, foreign.account_id
			))
			.into());
		}

		let rbac_enabled = self.is_rbac_enabled(account_id).await;

		let started = Instant::now();
		let required = collect_required_app_ids(user_groups, all_app_ids)?;
		let collected = started.elapsed();

		let snapshot = fetch_snapshot(&self.store, &required, self.config.page_size).await?;
		let fetched = started.elapsed();

		let assembled = PermissionAssembler::new(&snapshot, all_app_ids).assemble(user_groups)?;
		let info = PermissionInfo::from_assembled(
			account_id.clone(),
			rbac_enabled,
			collect_account_permissions(user_groups),
			assembled,
			&snapshot,
			all_app_ids,
		);
		let total = started.elapsed();

		info!(
			rbac_enabled,
			collect_ms = collected.as_millis() as u64,
			fetch_ms = (fetched - collected).as_millis() as u64,
			assemble_ms = (total - fetched).as_millis() as u64,
			app_summaries = info.app_permissions.len(),
			has_all_app_access = info.has_all_app_access,
			"computed permissions"
		);
		Ok(info)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::error::RbacServerError;
	use crate::flags::StaticFeatureFlags;
	use crate::memory::InMemoryEntityStore;
	use keel_rbac_core::{Action, AppPermission, PermissionType};

	fn handler(flags: StaticFeatureFlags, default_enabled: bool) -> AuthHandler<InMemoryEntityStore, StaticFeatureFlags> {
		let config = RbacConfig {
			default_enabled,
			..RbacConfig::default()
		};
		AuthHandler::new(InMemoryEntityStore::new(), flags, config)
	}

	fn apps() -> BTreeSet<AppId> {
		[AppId::new("a1")].into_iter().collect()
	}

	#[tokio::test]
	async fn flag_value_wins_over_default() {
		let handler = handler(StaticFeatureFlags::new().with_account("RBAC_ENFORCED", "acct", false), true);
		assert!(!handler.is_rbac_enabled(&"acct".into()).await);
		assert!(handler.is_rbac_enabled(&"other".into()).await);
	}

	#[tokio::test]
	async fn default_used_without_flag() {
		let handler = handler(StaticFeatureFlags::new(), false);
		let info = handler.compute_permissions(&"acct".into(), &[], &apps()).await.unwrap();
		assert!(!info.rbac_enabled);
		assert!(info.app_permissions.is_empty());
	}

	#[tokio::test]
	async fn foreign_group_is_rejected() {
		let handler = handler(StaticFeatureFlags::new(), true);
		let group = UserGroup::new("someone-else", "g");
		let err = handler
			.compute_permissions(&"acct".into(), &[group], &apps())
			.await
			.unwrap_err();
		assert!(matches!(err, RbacServerError::Rbac(RbacError::InvalidRequest(_))));
	}

	#[tokio::test]
	async fn grants_without_actions_are_skipped() {
		let handler = handler(StaticFeatureFlags::new(), true);
		handler
			.store()
			.insert("a1", keel_rbac_core::Entity::Service(keel_rbac_core::Service { id: "s1".into() }))
			.await;
		let group = UserGroup::new("acct", "g")
			.with_app_permission(AppPermission::new(PermissionType::Service, &[Action::Read]))
			.with_app_permission(AppPermission::new(PermissionType::ManageSecrets, &[]))
			.with_app_permission(AppPermission::new(PermissionType::Workflow, &[]));

		let info = handler.compute_permissions(&"acct".into(), &[group], &apps()).await.unwrap();
		assert!(info.app(&"a1".into()).unwrap().services.read.contains("s1"));
		assert_eq!(handler.store().call_count(), 1);
	}

	#[tokio::test]
	async fn rule_errors_fail_the_computation() {
		let handler = handler(StaticFeatureFlags::new(), true);
		let group = UserGroup::new("acct", "g")
			.with_app_permission(AppPermission::new(PermissionType::TemplateManagement, &[Action::Read]));
		let err = handler
			.compute_permissions(&"acct".into(), &[group], &apps())
			.await
			.unwrap_err();
		assert!(matches!(
			err,
			RbacServerError::Rbac(RbacError::UnknownPermissionType(PermissionType::TemplateManagement))
		));
		assert!(!err.is_retryable());
	}
}
