// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The computed permission structure for one user in one account.

use std::collections::{BTreeSet, HashMap};

use serde::Serialize;

use crate::assembler::{AssembledPermissions, PermissionAssembler};
use crate::entity::EntitySnapshot;
use crate::error::Result;
use crate::group::UserGroup;
use crate::summary::{compact, AppPermissionSummary};
use crate::types::{AccountId, AppId, PermissionType};

/// Immutable once built; evaluated on every request the user makes until the
/// host recomputes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PermissionInfo {
	pub account_id: AccountId,
	pub rbac_enabled: bool,
	pub account_permissions: BTreeSet<PermissionType>,
	pub app_permissions: HashMap<AppId, AppPermissionSummary>,
	/// Every application of the account received at least one permission.
	pub has_all_app_access: bool,
}

impl PermissionInfo {
	/// Compact assembled permissions into the final structure.
	pub fn from_assembled(
		account_id: AccountId,
		rbac_enabled: bool,
		account_permissions: BTreeSet<PermissionType>,
		assembled: AssembledPermissions,
		snapshot: &EntitySnapshot,
		all_app_ids: &BTreeSet<AppId>,
	) -> Self {
		let has_all_app_access = all_app_ids.iter().all(|app_id| assembled.apps.contains_key(app_id));
		let app_permissions = assembled
			.apps
			.into_iter()
			.map(|(app_id, accumulator)| {
				let summary = compact(&app_id, accumulator, snapshot.app(&app_id));
				(app_id, summary)
			})
			.collect();

		Self {
			account_id,
			rbac_enabled,
			account_permissions,
			app_permissions,
			has_all_app_access,
		}
	}

	pub fn app(&self, app_id: &AppId) -> Option<&AppPermissionSummary> {
		self.app_permissions.get(app_id)
	}

	pub fn has_account_permission(&self, permission_type: PermissionType) -> bool {
		self.account_permissions.contains(&permission_type)
	}
}

/// Assemble and compact permissions for already-fetched entities.
///
/// This is the synchronous core of a permission computation; fetching the
/// snapshot is the caller's job.
pub fn build_permission_info(
	account_id: AccountId,
	rbac_enabled: bool,
	groups: &[UserGroup],
	all_app_ids: &BTreeSet<AppId>,
	snapshot: &EntitySnapshot,
) -> Result<PermissionInfo> {
	let assembled = PermissionAssembler::new(snapshot, all_app_ids).assemble(groups)?;
	Ok(PermissionInfo::from_assembled(
		account_id,
		rbac_enabled,
		crate::collector::collect_account_permissions(groups),
		assembled,
		snapshot,
		all_app_ids,
	))
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::filter::AppFilter;
	use crate::group::AppPermission;
	use crate::types::Action;

	fn apps(raw: &[&str]) -> BTreeSet<AppId> {
		raw.iter().map(|id| AppId::new(*id)).collect()
	}

	#[test]
	fn all_app_access_when_every_app_is_touched() {
		let group = UserGroup::new("acct", "g").with_app_permission(AppPermission::new(PermissionType::Service, &[Action::Read]));
		let info = build_permission_info("acct".into(), true, &[group], &apps(&["a1", "a2"]), &EntitySnapshot::new()).unwrap();
		assert!(info.has_all_app_access);
		assert_eq!(info.app_permissions.len(), 2);
	}

	#[test]
	fn partial_app_access() {
		let group = UserGroup::new("acct", "g").with_app_permission(
			AppPermission::new(PermissionType::Service, &[Action::Read]).with_app_filter(AppFilter::selected(["a1"])),
		);
		let info = build_permission_info("acct".into(), true, &[group], &apps(&["a1", "a2"]), &EntitySnapshot::new()).unwrap();
		assert!(!info.has_all_app_access);
		assert!(info.app(&"a2".into()).is_none());
	}

	#[test]
	fn account_permissions_are_carried() {
		let group = UserGroup::new("acct", "g").with_account_permission(PermissionType::ManageConnectors);
		let info = build_permission_info("acct".into(), false, &[group], &apps(&[]), &EntitySnapshot::new()).unwrap();
		assert!(info.has_account_permission(PermissionType::ManageConnectors));
		assert!(!info.rbac_enabled);
	}
}
