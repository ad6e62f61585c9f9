// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Request-time authorization against a computed [`PermissionInfo`].
//!
//! Every check is a pure read of the permission structure. When RBAC is
//! disabled for the account, entity checks always pass; visible-ID queries
//! still report what the structure grants so list endpoints behave the same
//! either way.

use std::collections::HashSet;

use serde::Serialize;
use tracing::{debug, instrument};

use crate::error::{RbacError, Result};
use crate::info::PermissionInfo;
use crate::summary::AppPermissionSummary;
use crate::types::{AppId, EntityId, EntityType, PermissionAttribute};

/// A query restriction a list endpoint can apply to its backing collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntityIdFilter {
	pub collection: String,
	pub field_name: String,
	pub entity_ids: HashSet<EntityId>,
}

const DEFAULT_ID_FIELD: &str = "_id";

fn required_entity_types(required: &[PermissionAttribute]) -> Result<Vec<EntityType>> {
	if required.is_empty() {
		return Err(RbacError::InvalidRequest(
			"no permission attributes supplied".to_string(),
		));
	}
	required
		.iter()
		.map(|attr| EntityType::try_from(attr.permission_type))
		.collect()
}

fn satisfies_all(
	summary: &AppPermissionSummary,
	required: &[PermissionAttribute],
	entity_types: &[EntityType],
	entity_id: &EntityId,
) -> bool {
	required
		.iter()
		.zip(entity_types)
		.all(|(attr, entity_type)| summary.allows(*entity_type, attr.action, entity_id.as_str()))
}

impl PermissionInfo {
	/// Whether the user holds every required (type, action) pair on `entity_id`
	/// within at least one of `app_ids`.
	#[instrument(
		level = "debug",
		skip(self, required, app_ids, entity_id),
		fields(account_id = %self.account_id, entity_id = %entity_id, apps = app_ids.len())
	)]
	pub fn is_authorized(&self, required: &[PermissionAttribute], app_ids: &[AppId], entity_id: &EntityId) -> Result<bool> {
		let entity_types = required_entity_types(required)?;
		if !self.rbac_enabled {
			debug!("rbac disabled for account, allowing");
			return Ok(true);
		}

		let allowed = app_ids.iter().any(|app_id| {
			self.app(app_id)
				.is_some_and(|summary| satisfies_all(summary, required, &entity_types, entity_id))
		});
		debug!(allowed, "evaluated entity access");
		Ok(allowed)
	}

	/// Like [`is_authorized`](Self::is_authorized), but a denial is an error.
	pub fn authorize(&self, required: &[PermissionAttribute], app_ids: &[AppId], entity_id: &EntityId) -> Result<()> {
		if self.is_authorized(required, app_ids, entity_id)? {
			Ok(())
		} else {
			Err(RbacError::AccessDenied {
				entity_id: entity_id.clone(),
			})
		}
	}

	/// Union over applications and attributes of the IDs holding the required
	/// action on the required type.
	#[instrument(level = "debug", skip(self, required, app_ids), fields(account_id = %self.account_id))]
	pub fn entity_ids_visible_for(&self, required: &[PermissionAttribute], app_ids: &[AppId]) -> Result<HashSet<EntityId>> {
		let entity_types = required_entity_types(required)?;
		let mut visible = HashSet::new();
		for summary in app_ids.iter().filter_map(|app_id| self.app(app_id)) {
			for (attr, entity_type) in required.iter().zip(&entity_types) {
				visible.extend(summary.entity_ids(*entity_type, attr.action).into_iter().cloned());
			}
		}
		debug!(visible = visible.len(), "computed visible entity ids");
		Ok(visible)
	}

	/// Visible IDs packaged as a query filter on the first attribute's
	/// collection.
	pub fn entity_id_filter(&self, required: &[PermissionAttribute], app_ids: &[AppId]) -> Result<EntityIdFilter> {
		let entity_ids = self.entity_ids_visible_for(required, app_ids)?;
		let first = &required[0];
		let entity_type = EntityType::try_from(first.permission_type)?;
		Ok(EntityIdFilter {
			collection: first
				.db_collection_name
				.clone()
				.unwrap_or_else(|| entity_type.collection_name().to_string()),
			field_name: first
				.db_field_name
				.clone()
				.unwrap_or_else(|| DEFAULT_ID_FIELD.to_string()),
			entity_ids,
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::entity::{Entity, EntitySnapshot, Environment, Service, Workflow};
	use crate::filter::{AppFilter, EnvFilter, EntityFilter, GenericEntityFilter};
	use crate::group::{AppPermission, UserGroup};
	use crate::info::build_permission_info;
	use crate::types::{Action, EnvironmentType, PermissionType};
	use std::collections::BTreeSet;

	fn snapshot() -> EntitySnapshot {
		EntitySnapshot::new()
			.with("a1", Entity::Service(Service { id: "s1".into() }))
			.with("a1", Entity::Service(Service { id: "s2".into() }))
			.with("a2", Entity::Service(Service { id: "s3".into() }))
			.with("a1", Entity::Environment(Environment::new("e1", EnvironmentType::Prod)))
			.with("a1", Entity::Workflow(Workflow::new("w1", Some("e1"))))
	}

	fn info_with(rbac_enabled: bool, permissions: Vec<AppPermission>) -> PermissionInfo {
		let group = permissions
			.into_iter()
			.fold(UserGroup::new("acct", "g"), UserGroup::with_app_permission);
		let all: BTreeSet<AppId> = ["a1", "a2"].into_iter().map(AppId::new).collect();
		build_permission_info("acct".into(), rbac_enabled, &[group], &all, &snapshot()).unwrap()
	}

	fn read(pt: PermissionType) -> PermissionAttribute {
		PermissionAttribute::new(pt, Action::Read)
	}

	mod authorize {
		use super::*;

		#[test]
		fn granted_entity_is_allowed() {
			let info = info_with(
				true,
				vec![AppPermission::new(PermissionType::Service, &[Action::Read])
					.with_entity_filter(EntityFilter::Generic(GenericEntityFilter::selected(["s1"])))],
			);
			assert!(info.authorize(&[read(PermissionType::Service)], &["a1".into()], &"s1".into()).is_ok());
			let err = info
				.authorize(&[read(PermissionType::Service)], &["a1".into()], &"s2".into())
				.unwrap_err();
			assert_eq!(err, RbacError::AccessDenied { entity_id: "s2".into() });
		}

		#[test]
		fn every_required_pair_must_hold() {
			let info = info_with(true, vec![AppPermission::new(PermissionType::Service, &[Action::Read])]);
			let required = [
				read(PermissionType::Service),
				PermissionAttribute::new(PermissionType::Service, Action::Update),
			];
			assert!(!info.is_authorized(&required, &["a1".into()], &"s1".into()).unwrap());
		}

		#[test]
		fn any_app_may_satisfy() {
			let info = info_with(
				true,
				vec![AppPermission::new(PermissionType::Service, &[Action::Read])
					.with_app_filter(AppFilter::selected(["a2"]))],
			);
			let apps: Vec<AppId> = vec!["a1".into(), "a2".into()];
			assert!(info.is_authorized(&[read(PermissionType::Service)], &apps, &"s3".into()).unwrap());
		}

		#[test]
		fn disabled_rbac_allows_everything() {
			let info = info_with(false, vec![]);
			assert!(info.is_authorized(&[read(PermissionType::Service)], &["a1".into()], &"s1".into()).unwrap());
		}

		#[test]
		fn create_uses_flags() {
			let info = info_with(true, vec![AppPermission::new(PermissionType::Service, &[Action::Create])]);
			let required = [PermissionAttribute::new(PermissionType::Service, Action::Create)];
			assert!(info.is_authorized(&required, &["a1".into()], &"new".into()).unwrap());
			let required = [PermissionAttribute::new(PermissionType::Workflow, Action::Create)];
			assert!(!info.is_authorized(&required, &["a1".into()], &"new".into()).unwrap());
		}

		#[test]
		fn empty_request_is_invalid() {
			let info = info_with(true, vec![]);
			let err = info.is_authorized(&[], &["a1".into()], &"s1".into()).unwrap_err();
			assert!(matches!(err, RbacError::InvalidRequest(_)));
		}

		#[test]
		fn account_level_attribute_is_rejected() {
			let info = info_with(true, vec![]);
			let err = info
				.is_authorized(&[read(PermissionType::AuditViewer)], &["a1".into()], &"s1".into())
				.unwrap_err();
			assert_eq!(err, RbacError::UnknownPermissionType(PermissionType::AuditViewer));
		}

		#[test]
		fn env_checks_use_typed_buckets() {
			let info = info_with(
				true,
				vec![AppPermission::new(PermissionType::Env, &[Action::Read])
					.with_entity_filter(EntityFilter::Env(EnvFilter::selected(["e1"])))],
			);
			assert!(info.is_authorized(&[read(PermissionType::Env)], &["a1".into()], &"e1".into()).unwrap());
		}
	}

	mod visibility {
		use super::*;

		#[test]
		fn unions_across_apps() {
			let info = info_with(true, vec![AppPermission::new(PermissionType::Service, &[Action::Read])]);
			let apps: Vec<AppId> = vec!["a1".into(), "a2".into()];
			let visible = info.entity_ids_visible_for(&[read(PermissionType::Service)], &apps).unwrap();
			let expected: HashSet<EntityId> = ["s1", "s2", "s3"].into_iter().map(EntityId::new).collect();
			assert_eq!(visible, expected);
		}

		#[test]
		fn computed_even_when_rbac_disabled() {
			let info = info_with(false, vec![AppPermission::new(PermissionType::Workflow, &[Action::Read])]);
			let visible = info
				.entity_ids_visible_for(&[read(PermissionType::Workflow)], &["a1".into()])
				.unwrap();
			assert!(visible.contains("w1"));
		}

		#[test]
		fn unknown_app_contributes_nothing() {
			let info = info_with(true, vec![AppPermission::new(PermissionType::Service, &[Action::Read])]);
			let visible = info
				.entity_ids_visible_for(&[read(PermissionType::Service)], &["nope".into()])
				.unwrap();
			assert!(visible.is_empty());
		}

		#[test]
		fn id_filter_defaults_to_collection_and_id_field() {
			let info = info_with(true, vec![AppPermission::new(PermissionType::Workflow, &[Action::Read])]);
			let filter = info
				.entity_id_filter(&[read(PermissionType::Workflow)], &["a1".into()])
				.unwrap();
			assert_eq!(filter.collection, "workflows");
			assert_eq!(filter.field_name, "_id");
			assert!(filter.entity_ids.contains("w1"));
		}

		#[test]
		fn id_filter_honours_overrides() {
			let info = info_with(true, vec![AppPermission::new(PermissionType::Workflow, &[Action::Read])]);
			let attr = read(PermissionType::Workflow)
				.with_db_field("workflowId")
				.with_db_collection("workflowExecutions");
			let filter = info.entity_id_filter(&[attr], &["a1".into()]).unwrap();
			assert_eq!(filter.collection, "workflowExecutions");
			assert_eq!(filter.field_name, "workflowId");
		}
	}
}
