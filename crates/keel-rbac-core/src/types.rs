// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Core identifier and vocabulary types shared across the RBAC engine.
//!
//! Identifiers are opaque strings wrapped in newtypes so that an application ID
//! can never be passed where an entity ID is expected. Every ID type borrows as
//! `str`, which lets hash and tree sets keyed by IDs be queried with the raw
//! identifiers found inside pipeline stage definitions.

use std::borrow::Borrow;
use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::RbacError;

// =============================================================================
// ID Types
// =============================================================================

macro_rules! define_id_type {
	($name:ident, $doc:expr) => {
		#[doc = $doc]
		#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
		#[serde(transparent)]
		pub struct $name(String);

		impl $name {
			/// Create a new ID from any string-like value.
			pub fn new(id: impl Into<String>) -> Self {
				Self(id.into())
			}

			/// Borrow the raw identifier.
			pub fn as_str(&self) -> &str {
				&self.0
			}

			/// Consume the ID and return the raw identifier.
			pub fn into_inner(self) -> String {
				self.0
			}
		}

		impl fmt::Display for $name {
			fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
				f.write_str(&self.0)
			}
		}

		impl Borrow<str> for $name {
			fn borrow(&self) -> &str {
				&self.0
			}
		}

		impl From<&str> for $name {
			fn from(id: &str) -> Self {
				Self(id.to_string())
			}
		}

		impl From<String> for $name {
			fn from(id: String) -> Self {
				Self(id)
			}
		}
	};
}

define_id_type!(AccountId, "Unique identifier for a tenant account.");
define_id_type!(AppId, "Unique identifier for an application within an account.");
define_id_type!(
	EntityId,
	"Unique identifier for an entity (service, environment, workflow, ...) within an application."
);
define_id_type!(UserId, "Unique identifier for a user.");

// =============================================================================
// Actions
// =============================================================================

/// An operation a permission grants.
///
/// `Create` is never granted on an individual entity; it only feeds the
/// per-application creation flags. The remaining four are the entity actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
	Create,
	Read,
	Update,
	Delete,
	Execute,
}

impl Action {
	/// The actions that can be held on an individual entity.
	pub const ENTITY_ACTIONS: [Action; 4] = [Action::Read, Action::Update, Action::Delete, Action::Execute];

	pub fn is_entity_action(self) -> bool {
		!matches!(self, Action::Create)
	}

	/// Restrict a granted action set to entity actions.
	pub fn entity_actions(actions: &BTreeSet<Action>) -> BTreeSet<Action> {
		actions.iter().copied().filter(|a| a.is_entity_action()).collect()
	}

	pub fn as_str(self) -> &'static str {
		match self {
			Action::Create => "CREATE",
			Action::Read => "READ",
			Action::Update => "UPDATE",
			Action::Delete => "DELETE",
			Action::Execute => "EXECUTE",
		}
	}
}

impl fmt::Display for Action {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

// =============================================================================
// Permission and Entity Types
// =============================================================================

/// The kind of thing a permission applies to.
///
/// The first six variants are application entity types. `AllAppEntities`
/// expands to every one of them. The remaining variants are account-level
/// permissions; they are carried into the account permission set and are never
/// valid on an application permission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PermissionType {
	AllAppEntities,
	Service,
	Provisioner,
	Env,
	Workflow,
	Pipeline,
	Deployment,
	AccountManagement,
	UserPermissionManagement,
	UserPermissionRead,
	ManageApplications,
	TemplateManagement,
	AuditViewer,
	ManageSecrets,
	ManageConnectors,
}

impl PermissionType {
	pub fn is_account_level(self) -> bool {
		matches!(
			self,
			PermissionType::AccountManagement
				| PermissionType::UserPermissionManagement
				| PermissionType::UserPermissionRead
				| PermissionType::ManageApplications
				| PermissionType::TemplateManagement
				| PermissionType::AuditViewer
				| PermissionType::ManageSecrets
				| PermissionType::ManageConnectors
		)
	}

	/// The entity type this permission targets, if it targets exactly one.
	pub fn entity_type(self) -> Option<EntityType> {
		match self {
			PermissionType::Service => Some(EntityType::Service),
			PermissionType::Provisioner => Some(EntityType::Provisioner),
			PermissionType::Env => Some(EntityType::Env),
			PermissionType::Workflow => Some(EntityType::Workflow),
			PermissionType::Pipeline => Some(EntityType::Pipeline),
			PermissionType::Deployment => Some(EntityType::Deployment),
			_ => None,
		}
	}

	pub fn as_str(self) -> &'static str {
		match self {
			PermissionType::AllAppEntities => "ALL_APP_ENTITIES",
			PermissionType::Service => "SERVICE",
			PermissionType::Provisioner => "PROVISIONER",
			PermissionType::Env => "ENV",
			PermissionType::Workflow => "WORKFLOW",
			PermissionType::Pipeline => "PIPELINE",
			PermissionType::Deployment => "DEPLOYMENT",
			PermissionType::AccountManagement => "ACCOUNT_MANAGEMENT",
			PermissionType::UserPermissionManagement => "USER_PERMISSION_MANAGEMENT",
			PermissionType::UserPermissionRead => "USER_PERMISSION_READ",
			PermissionType::ManageApplications => "MANAGE_APPLICATIONS",
			PermissionType::TemplateManagement => "TEMPLATE_MANAGEMENT",
			PermissionType::AuditViewer => "AUDIT_VIEWER",
			PermissionType::ManageSecrets => "MANAGE_SECRETS",
			PermissionType::ManageConnectors => "MANAGE_CONNECTORS",
		}
	}
}

impl fmt::Display for PermissionType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// One of the six application entity types permissions are computed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityType {
	Service,
	Provisioner,
	Env,
	Workflow,
	Pipeline,
	Deployment,
}

impl EntityType {
	pub const ALL: [EntityType; 6] = [
		EntityType::Service,
		EntityType::Provisioner,
		EntityType::Env,
		EntityType::Workflow,
		EntityType::Pipeline,
		EntityType::Deployment,
	];

	/// Name of the backing collection that query filters target.
	pub fn collection_name(self) -> &'static str {
		match self {
			EntityType::Service => "services",
			EntityType::Provisioner => "infrastructureProvisioners",
			EntityType::Env => "environments",
			EntityType::Workflow => "workflows",
			EntityType::Pipeline => "pipelines",
			EntityType::Deployment => "workflowExecutions",
		}
	}

	pub fn permission_type(self) -> PermissionType {
		match self {
			EntityType::Service => PermissionType::Service,
			EntityType::Provisioner => PermissionType::Provisioner,
			EntityType::Env => PermissionType::Env,
			EntityType::Workflow => PermissionType::Workflow,
			EntityType::Pipeline => PermissionType::Pipeline,
			EntityType::Deployment => PermissionType::Deployment,
		}
	}
}

impl TryFrom<PermissionType> for EntityType {
	type Error = RbacError;

	fn try_from(permission_type: PermissionType) -> Result<Self, Self::Error> {
		permission_type
			.entity_type()
			.ok_or(RbacError::UnknownPermissionType(permission_type))
	}
}

impl fmt::Display for EntityType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		self.permission_type().fmt(f)
	}
}

/// Classification of an environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EnvironmentType {
	Prod,
	NonProd,
}

// =============================================================================
// Authorization Requests
// =============================================================================

/// One (permission type, action) pair an authorization check requires.
///
/// The optional database names let list endpoints turn visible IDs into a
/// query filter; they default to the `_id` field of the entity type's
/// collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionAttribute {
	pub permission_type: PermissionType,
	pub action: Action,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub db_field_name: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub db_collection_name: Option<String>,
}

impl PermissionAttribute {
	pub fn new(permission_type: PermissionType, action: Action) -> Self {
		Self {
			permission_type,
			action,
			db_field_name: None,
			db_collection_name: None,
		}
	}

	pub fn with_db_field(mut self, field: impl Into<String>) -> Self {
		self.db_field_name = Some(field.into());
		self
	}

	pub fn with_db_collection(mut self, collection: impl Into<String>) -> Self {
		self.db_collection_name = Some(collection.into());
		self
	}
}
