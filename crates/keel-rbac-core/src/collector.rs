// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! First pass over a user's groups: which applications need which entity
//! collections fetched.
//!
//! Some entity types are derived from others, so the sets are widened along
//! fixed dependency edges after the direct grants are gathered:
//!
//! ```text
//! DEPLOYMENT -> PIPELINE, WORKFLOW
//! PIPELINE   -> WORKFLOW
//! WORKFLOW   -> ENV
//! DEPLOYMENT -> ENV
//! ```

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use crate::entity::EntityKind;
use crate::error::Result;
use crate::filter::AppFilter;
use crate::group::UserGroup;
use crate::types::{AppId, EntityType, PermissionType};

/// Application IDs whose entities of each type are needed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequiredAppIds {
	by_type: BTreeMap<EntityType, BTreeSet<AppId>>,
}

impl RequiredAppIds {
	pub fn get(&self, entity_type: EntityType) -> &BTreeSet<AppId> {
		static EMPTY: BTreeSet<AppId> = BTreeSet::new();
		self.by_type.get(&entity_type).unwrap_or(&EMPTY)
	}

	/// Applications whose entities of a stored collection must be fetched.
	pub fn for_collection(&self, kind: EntityKind) -> &BTreeSet<AppId> {
		self.get(kind.entity_type())
	}

	pub fn is_empty(&self) -> bool {
		self.by_type.values().all(BTreeSet::is_empty)
	}

	fn extend(&mut self, entity_type: EntityType, app_ids: &BTreeSet<AppId>) {
		if app_ids.is_empty() {
			return;
		}
		self.by_type.entry(entity_type).or_default().extend(app_ids.iter().cloned());
	}

	fn widen(&mut self, target: EntityType, source: EntityType) {
		let source_ids = self.get(source).clone();
		self.extend(target, &source_ids);
	}
}

/// Gather the applications each entity type must be fetched for.
///
/// Grants with no actions are skipped, as the assembler skips them. Fails on
/// an unrecognized app filter or on an account-level permission type used as
/// an application permission.
pub fn collect_required_app_ids(groups: &[UserGroup], all_app_ids: &BTreeSet<AppId>) -> Result<RequiredAppIds> {
	let mut required = RequiredAppIds::default();

	for group in groups {
		for permission in &group.app_permissions {
			if permission.actions.is_empty() {
				continue;
			}
			let app_ids = AppFilter::resolve(permission.app_filter.as_ref(), all_app_ids)?;
			match permission.permission_type {
				PermissionType::AllAppEntities => {
					for entity_type in EntityType::ALL {
						required.extend(entity_type, &app_ids);
					}
				}
				other => {
					let entity_type = EntityType::try_from(other)?;
					required.extend(entity_type, &app_ids);
				}
			}
		}
	}

	required.widen(EntityType::Pipeline, EntityType::Deployment);
	required.widen(EntityType::Workflow, EntityType::Deployment);
	required.widen(EntityType::Workflow, EntityType::Pipeline);
	required.widen(EntityType::Env, EntityType::Workflow);
	required.widen(EntityType::Env, EntityType::Deployment);

	debug!(
		services = required.get(EntityType::Service).len(),
		provisioners = required.get(EntityType::Provisioner).len(),
		envs = required.get(EntityType::Env).len(),
		workflows = required.get(EntityType::Workflow).len(),
		pipelines = required.get(EntityType::Pipeline).len(),
		deployments = required.get(EntityType::Deployment).len(),
		"collected required app ids"
	);

	Ok(required)
}

/// Union of the account-level permissions of every group.
pub fn collect_account_permissions(groups: &[UserGroup]) -> BTreeSet<PermissionType> {
	groups
		.iter()
		.flat_map(|group| group.account_permissions.iter().copied())
		.collect()
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::error::RbacError;
	use crate::group::AppPermission;
	use crate::types::Action;
	use proptest::prelude::*;

	fn apps(raw: &[&str]) -> BTreeSet<AppId> {
		raw.iter().map(|id| AppId::new(*id)).collect()
	}

	fn group(permissions: Vec<AppPermission>) -> UserGroup {
		permissions
			.into_iter()
			.fold(UserGroup::new("acct", "g"), UserGroup::with_app_permission)
	}

	#[test]
	fn workflow_grant_pulls_in_environments() {
		let groups = vec![group(vec![
			AppPermission::new(PermissionType::Workflow, &[Action::Read]).with_app_filter(AppFilter::selected(["a1"])),
		])];
		let required = collect_required_app_ids(&groups, &apps(&["a1", "a2"])).unwrap();
		assert_eq!(required.get(EntityType::Workflow), &apps(&["a1"]));
		assert_eq!(required.get(EntityType::Env), &apps(&["a1"]));
		assert!(required.get(EntityType::Service).is_empty());
	}

	#[test]
	fn pipeline_grant_pulls_in_workflows_and_environments() {
		let groups = vec![group(vec![AppPermission::new(PermissionType::Pipeline, &[Action::Read])])];
		let required = collect_required_app_ids(&groups, &apps(&["a1"])).unwrap();
		assert_eq!(required.get(EntityType::Workflow), &apps(&["a1"]));
		assert_eq!(required.get(EntityType::Env), &apps(&["a1"]));
	}

	#[test]
	fn deployment_grant_pulls_in_pipelines() {
		let groups = vec![group(vec![AppPermission::new(PermissionType::Deployment, &[Action::Read])])];
		let required = collect_required_app_ids(&groups, &apps(&["a1"])).unwrap();
		assert_eq!(required.for_collection(EntityKind::Pipeline), &apps(&["a1"]));
		assert_eq!(required.for_collection(EntityKind::Workflow), &apps(&["a1"]));
		assert_eq!(required.for_collection(EntityKind::Environment), &apps(&["a1"]));
	}

	#[test]
	fn all_app_entities_covers_every_type() {
		let groups = vec![group(vec![AppPermission::new(PermissionType::AllAppEntities, &[Action::Read])])];
		let required = collect_required_app_ids(&groups, &apps(&["a1", "a2"])).unwrap();
		for entity_type in EntityType::ALL {
			assert_eq!(required.get(entity_type), &apps(&["a1", "a2"]));
		}
	}

	#[test]
	fn account_level_type_as_app_permission_fails() {
		let groups = vec![group(vec![AppPermission::new(PermissionType::ManageSecrets, &[Action::Read])])];
		let err = collect_required_app_ids(&groups, &apps(&["a1"])).unwrap_err();
		assert_eq!(err, RbacError::UnknownPermissionType(PermissionType::ManageSecrets));
	}

	#[test]
	fn grants_without_actions_are_ignored() {
		let groups = vec![group(vec![
			AppPermission::new(PermissionType::Service, &[Action::Read]).with_app_filter(AppFilter::selected(["a1"])),
			AppPermission::new(PermissionType::ManageSecrets, &[]),
			AppPermission::new(PermissionType::Workflow, &[]).with_app_filter(AppFilter::selected(["a2"])),
		])];
		let required = collect_required_app_ids(&groups, &apps(&["a1", "a2"])).unwrap();
		assert_eq!(required.get(EntityType::Service), &apps(&["a1"]));
		assert!(required.get(EntityType::Workflow).is_empty());
		assert!(required.get(EntityType::Env).is_empty());
	}

	#[test]
	fn no_groups_requires_nothing() {
		let required = collect_required_app_ids(&[], &apps(&["a1"])).unwrap();
		assert!(required.is_empty());
	}

	#[test]
	fn account_permissions_are_unioned() {
		let groups = vec![
			UserGroup::new("acct", "g1").with_account_permission(PermissionType::AuditViewer),
			UserGroup::new("acct", "g2")
				.with_account_permission(PermissionType::AuditViewer)
				.with_account_permission(PermissionType::ManageSecrets),
		];
		let permissions = collect_account_permissions(&groups);
		assert_eq!(permissions.len(), 2);
	}

	fn arb_permission_type() -> impl Strategy<Value = PermissionType> {
		prop_oneof![
			Just(PermissionType::AllAppEntities),
			Just(PermissionType::Service),
			Just(PermissionType::Provisioner),
			Just(PermissionType::Env),
			Just(PermissionType::Workflow),
			Just(PermissionType::Pipeline),
			Just(PermissionType::Deployment),
		]
	}

	proptest! {
		#[test]
		fn dependency_edges_always_hold(
			grants in prop::collection::vec((arb_permission_type(), prop::collection::btree_set("a[0-3]", 0..3)), 0..6),
		) {
			let all = apps(&["a0", "a1", "a2", "a3"]);
			let permissions = grants
				.into_iter()
				.map(|(pt, selected)| {
					AppPermission::new(pt, &[Action::Read]).with_app_filter(AppFilter::selected(selected))
				})
				.collect();
			let required = collect_required_app_ids(&[group(permissions)], &all).unwrap();

			let workflows = required.get(EntityType::Workflow);
			let envs = required.get(EntityType::Env);
			let pipelines = required.get(EntityType::Pipeline);
			let deployments = required.get(EntityType::Deployment);
			prop_assert!(pipelines.is_subset(workflows));
			prop_assert!(workflows.is_subset(envs));
			prop_assert!(deployments.is_subset(envs));
			prop_assert!(deployments.is_subset(pipelines));
			for entity_type in EntityType::ALL {
				prop_assert!(required.get(entity_type).is_subset(&all));
			}
		}
	}
}
