// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! User groups and the permissions they grant.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::filter::{AppFilter, EntityFilter};
use crate::types::{AccountId, Action, PermissionType};

/// A single application-scoped grant inside a user group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppPermission {
	pub permission_type: PermissionType,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub app_filter: Option<AppFilter>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub entity_filter: Option<EntityFilter>,
	#[serde(default)]
	pub actions: BTreeSet<Action>,
}

impl AppPermission {
	pub fn new(permission_type: PermissionType, actions: &[Action]) -> Self {
		Self {
			permission_type,
			app_filter: None,
			entity_filter: None,
			actions: actions.iter().copied().collect(),
		}
	}

	pub fn with_app_filter(mut self, filter: AppFilter) -> Self {
		self.app_filter = Some(filter);
		self
	}

	pub fn with_entity_filter(mut self, filter: EntityFilter) -> Self {
		self.entity_filter = Some(filter);
		self
	}
}

/// A named set of permissions a user is a member of.
///
/// Application permissions are applied in declaration order, which matters
/// for the cross-permission pipeline rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserGroup {
	pub name: String,
	pub account_id: AccountId,
	#[serde(default)]
	pub account_permissions: BTreeSet<PermissionType>,
	#[serde(default)]
	pub app_permissions: Vec<AppPermission>,
}

impl UserGroup {
	pub fn new(account_id: impl Into<AccountId>, name: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			account_id: account_id.into(),
			account_permissions: BTreeSet::new(),
			app_permissions: Vec::new(),
		}
	}

	pub fn with_account_permission(mut self, permission_type: PermissionType) -> Self {
		self.account_permissions.insert(permission_type);
		self
	}

	pub fn with_app_permission(mut self, permission: AppPermission) -> Self {
		self.app_permissions.push(permission);
		self
	}
}
